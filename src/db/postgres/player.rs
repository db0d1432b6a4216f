use async_trait::async_trait;

use super::map_sqlx_error;
use super::transactor::PgScope;
use crate::db::PersistenceError;
use crate::domain::ids::{AccountId, PlayerId};
use crate::domain::player::{Player, PlayerName, PlayerRepository};

/// Only a clash on this constraint counts as a name conflict
const PLAYER_NAME_CONSTRAINT: &str = "players_player_name_key";

#[derive(Debug, sqlx::FromRow)]
struct PlayerRow {
    player_id: i64,
    player_name: String,
}

impl TryFrom<PlayerRow> for Player {
    type Error = PersistenceError;

    fn try_from(row: PlayerRow) -> Result<Self, Self::Error> {
        let name = PlayerName::parse(row.player_name)
            .map_err(|error| {
                PersistenceError::database(format!("stored player name rejected: {error}"))
            })?;
        Ok(Player {
            id: PlayerId(row.player_id),
            name,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PgPlayerRepository;

impl PgPlayerRepository {
    async fn find_one(
        &self,
        scope: &PgScope,
        filter: &str,
        value: i64,
    ) -> Result<Option<Player>, PersistenceError> {
        let mut conn = scope.conn().await?;

        let row: Option<PlayerRow> = sqlx::query_as(&format!(
            "SELECT player_id, player_name FROM players WHERE {filter} = $1"
        ))
        .bind(value)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

        row.map(Player::try_from).transpose()
    }
}

#[async_trait]
impl PlayerRepository<PgScope> for PgPlayerRepository {
    async fn save(
        &self,
        scope: &PgScope,
        name: &PlayerName,
        account_id: AccountId,
    ) -> Result<Player, PersistenceError> {
        let guarded = scope.in_transaction();
        let mut conn = scope.conn().await?;

        // A rejected INSERT aborts the whole transaction unless it ran
        // under a savepoint.
        if guarded {
            sqlx::query("SAVEPOINT insert_player")
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
        }

        let inserted: Result<PlayerRow, sqlx::Error> = sqlx::query_as(
            "INSERT INTO players (player_name, account_id)
             VALUES ($1, $2)
             RETURNING player_id, player_name",
        )
        .bind(name.as_str())
        .bind(account_id.get())
        .fetch_one(&mut *conn)
        .await;

        let row = match inserted {
            Ok(row) => {
                if guarded {
                    sqlx::query("RELEASE SAVEPOINT insert_player")
                        .execute(&mut *conn)
                        .await
                        .map_err(map_sqlx_error)?;
                }
                row
            }
            Err(error) => {
                if guarded {
                    sqlx::query("ROLLBACK TO SAVEPOINT insert_player")
                        .execute(&mut *conn)
                        .await
                        .map_err(map_sqlx_error)?;
                }
                return Err(match map_sqlx_error(error) {
                    PersistenceError::UniqueViolation { constraint }
                        if constraint != PLAYER_NAME_CONSTRAINT =>
                    {
                        PersistenceError::database(format!(
                            "unique constraint violated: {constraint}"
                        ))
                    }
                    other => other,
                });
            }
        };

        row.try_into()
    }

    async fn find_by_name(
        &self,
        scope: &PgScope,
        name: &str,
    ) -> Result<Option<Player>, PersistenceError> {
        let mut conn = scope.conn().await?;

        let row: Option<PlayerRow> =
            sqlx::query_as("SELECT player_id, player_name FROM players WHERE player_name = $1")
                .bind(name)
                .fetch_optional(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;

        row.map(Player::try_from).transpose()
    }

    async fn find_by_id(
        &self,
        scope: &PgScope,
        id: PlayerId,
    ) -> Result<Option<Player>, PersistenceError> {
        self.find_one(scope, "player_id", id.get()).await
    }

    async fn find_by_account_id(
        &self,
        scope: &PgScope,
        account_id: AccountId,
    ) -> Result<Option<Player>, PersistenceError> {
        self.find_one(scope, "account_id", account_id.get()).await
    }
}
