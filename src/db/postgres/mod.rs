// ============================================================================
// PostgreSQL Adapter (sqlx)
// ============================================================================
//
// - transactor - PgTransactor and the PgScope handle repositories run on
// - account    - accounts table
// - player     - players table, inserts guarded by a savepoint
// - campaign   - campaigns + campaigns_players tables
//
// ============================================================================

mod account;
mod campaign;
mod player;
mod transactor;

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::migrate::Migrator;
use std::path::Path;

use crate::db::PersistenceError;

pub use account::PgAccountRepository;
pub use campaign::PgCampaignRepository;
pub use player::PgPlayerRepository;
pub use transactor::{PgScope, PgTransactor, ScopeConn};

/// SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;

    tracing::info!(max_connections = max_connections, "Connected to PostgreSQL");
    Ok(pool)
}

/// Applies the SQL files under `migrations/`
pub async fn migrate(pool: &PgPool, directory: &Path) -> Result<(), sqlx::migrate::MigrateError> {
    let migrator = Migrator::new(directory).await?;
    migrator.run(pool).await?;
    tracing::info!(directory = %directory.display(), "Migrations applied");
    Ok(())
}

pub(crate) fn map_sqlx_error(error: sqlx::Error) -> PersistenceError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            PersistenceError::unique(db_error.constraint().unwrap_or("unknown"))
        }
        sqlx::Error::RowNotFound => PersistenceError::NotFound,
        _ => PersistenceError::database(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(map_sqlx_error(sqlx::Error::RowNotFound), PersistenceError::NotFound));
    }

    #[test]
    fn test_other_errors_are_opaque() {
        let error = map_sqlx_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(error, PersistenceError::Database(_)));
        assert!(!error.is_unique_violation());
    }
}
