use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Runtime Settings
// ============================================================================
//
// Every option can come from the command line or the environment. Without
// DATABASE_URL the binary runs against the in-memory store.
//
// ============================================================================

#[derive(Debug, Clone, Parser)]
#[command(name = "campaign_hub", about = "Account registration and campaign lifecycle", version)]
pub struct Settings {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub database_max_connections: u32,

    /// Directory holding the SQL migrations
    #[arg(long, env = "MIGRATIONS_DIR", default_value = "migrations")]
    pub migrations_dir: PathBuf,

    /// HS256 key for signing tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    #[arg(long, env = "JWT_ISSUER", default_value = "campaign-hub")]
    pub jwt_issuer: String,

    /// Token lifetime in seconds
    #[arg(long, env = "JWT_EXPIRATION_SECS", default_value_t = 86_400)]
    pub jwt_expiration_secs: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("JWT secret must not be empty")]
    EmptySecret,

    #[error("JWT expiration must be greater than zero")]
    ZeroExpiration,

    #[error("database pool needs at least one connection")]
    EmptyPool,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::EmptySecret);
        }
        if self.jwt_expiration_secs == 0 {
            return Err(ConfigError::ZeroExpiration);
        }
        if self.database_max_connections == 0 {
            return Err(ConfigError::EmptyPool);
        }
        Ok(())
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }
}
