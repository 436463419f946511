pub mod sensay;
pub mod supabase;

pub use sensay::SensayClient;
pub use supabase::SupabaseAuthClient;
