use anyhow::{anyhow, Context};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub jwt_secret: String,
    pub sensay_api_url: String,
    pub sensay_organization_secret: String,
    pub sensay_api_version: String,
    pub sensay_replica_uuid: Uuid,
}

impl AppConfig {
    /// Reads the full configuration from the environment. Every variable is
    /// required; there are no fallback values.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let database_url = require("DATABASE_URL")?;
        let supabase_url = require("SUPABASE_URL")?;
        let supabase_anon_key = require("SUPABASE_ANON_KEY")?;
        let jwt_secret = require("JWT_SECRET")?;
        let sensay_api_url = require("SENSAY_API_URL")?;
        let sensay_organization_secret = require("SENSAY_ORGANIZATION_SECRET")?;
        let sensay_api_version = require("SENSAY_API_VERSION")?;
        let sensay_replica_uuid = Uuid::parse_str(&require("SENSAY_REPLICA_UUID")?)
            .context("SENSAY_REPLICA_UUID is not a valid UUID")?;

        Ok(AppConfig {
            database_url,
            supabase_url,
            supabase_anon_key,
            jwt_secret,
            sensay_api_url,
            sensay_organization_secret,
            sensay_api_version,
            sensay_replica_uuid,
        })
    }
}

fn require(name: &str) -> Result<String, anyhow::Error> {
    std::env::var(name).map_err(|_| anyhow!("{} not found", name))
}
