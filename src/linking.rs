use anyhow::Result;
use tracing::{info, warn};

use crate::clients::supabase::{AuthSession, AuthUser};
use crate::clients::{SensayClient, SupabaseAuthClient};
use crate::models::{ExternalIdentity, IdentityStore};
use crate::retry::RetryPolicy;

/// Signup flow: create the auth-provider user, create the matching Sensay
/// identity (requesting the new user's id as the Sensay id), persist the
/// mapping row, then sign the user in. The two linking steps retry under
/// `policy`; the auth-provider calls do not.
///
/// If linking exhausts its retries the signup fails and the already-created
/// auth-provider account is left behind without a mapping row. We log the
/// orphan so it can be reconciled by hand.
pub async fn link_signup(
    auth: &SupabaseAuthClient,
    sensay: &SensayClient,
    identities: &dyn IdentityStore,
    policy: RetryPolicy,
    email: &str,
    password: &str,
    full_name: &str,
) -> Result<(AuthUser, AuthSession)> {
    info!("Starting signup for {}", email);
    let user = auth
        .sign_up(email, password, full_name)
        .await
        .map_err(anyhow::Error::new)?;
    info!("Auth provider user created: {}", user.id);

    let sensay_user_id = policy
        .run("create Sensay user", || sensay.create_user(&user.id))
        .await
        .map_err(|e| {
            warn!(
                "Signup failed after retries; auth account {} is orphaned without a mapping",
                user.id
            );
            anyhow::Error::new(e)
        })?;

    let identity = ExternalIdentity::new(&user.id, &sensay_user_id, email, full_name);
    policy
        .run("store identity mapping", || identities.insert(&identity))
        .await
        .map_err(|e| {
            warn!(
                "Signup failed after retries; auth account {} is orphaned without a mapping",
                user.id
            );
            e
        })?;
    info!("Identity mapping stored: {} -> {}", user.id, sensay_user_id);

    let session = auth
        .sign_in(email, password)
        .await
        .map_err(anyhow::Error::new)?;
    Ok((user, session))
}
