pub mod identity;

pub use identity::{ExternalIdentity, IdentityStore, PgIdentityStore};
