use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use tracing::debug;

/// Row linking an auth-provider user to their Sensay identity. Written
/// exactly once per signup and never updated afterward; every chat operation
/// reads it to scope provider calls to the right end user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub id: String, // auth-provider user id
    pub sensay_user_id: String,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

impl ExternalIdentity {
    pub fn new(id: &str, sensay_user_id: &str, email: &str, full_name: &str) -> Self {
        ExternalIdentity {
            id: id.to_string(),
            sensay_user_id: sensay_user_id.to_string(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Persistence seam for identity mappings, so flows can be tested without a
/// live database.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn insert(&self, identity: &ExternalIdentity) -> anyhow::Result<()>;
    async fn find_by_user_id(&self, user_id: &str) -> anyhow::Result<Option<ExternalIdentity>>;
}

pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        PgIdentityStore { pool }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn insert(&self, identity: &ExternalIdentity) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sensay_users (id, sensay_user_id, email, full_name, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.sensay_user_id)
        .bind(&identity.email)
        .bind(&identity.full_name)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await?;

        debug!("Identity mapping stored for user {}", identity.id);
        Ok(())
    }

    async fn find_by_user_id(&self, user_id: &str) -> anyhow::Result<Option<ExternalIdentity>> {
        let identity = sqlx::query_as::<_, ExternalIdentity>(
            r#"
            SELECT id, sensay_user_id, email, full_name, created_at
            FROM sensay_users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }
}

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use anyhow::anyhow;

    use super::*;

    /// In-memory store double with failure injection for the persistence
    /// retry properties.
    #[derive(Default)]
    pub struct MemoryIdentityStore {
        rows: Mutex<Vec<ExternalIdentity>>,
        failing_inserts: AtomicU32,
    }

    impl MemoryIdentityStore {
        pub fn new() -> Self {
            MemoryIdentityStore::default()
        }

        /// Makes the next `n` inserts fail before the store behaves again.
        pub fn fail_next_inserts(&self, n: u32) {
            self.failing_inserts.store(n, Ordering::SeqCst);
        }

        pub fn rows(&self) -> Vec<ExternalIdentity> {
            self.rows.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdentityStore for MemoryIdentityStore {
        async fn insert(&self, identity: &ExternalIdentity) -> anyhow::Result<()> {
            let remaining = self.failing_inserts.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failing_inserts.store(remaining - 1, Ordering::SeqCst);
                return Err(anyhow!("injected insert failure"));
            }
            self.rows.lock().unwrap().push(identity.clone());
            Ok(())
        }

        async fn find_by_user_id(&self, user_id: &str) -> anyhow::Result<Option<ExternalIdentity>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|row| row.id == user_id)
                .cloned())
        }
    }
}
