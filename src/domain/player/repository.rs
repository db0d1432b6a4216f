use async_trait::async_trait;

use super::player::{Player, PlayerName};
use crate::db::PersistenceError;
use crate::domain::ids::{AccountId, PlayerId};

#[async_trait]
pub trait PlayerRepository<S: Send + Sync>: Send + Sync {
    /// Reports `UniqueViolation` when the name is taken. A failed insert
    /// must leave the surrounding transaction usable.
    async fn save(
        &self,
        scope: &S,
        name: &PlayerName,
        account_id: AccountId,
    ) -> Result<Player, PersistenceError>;

    async fn find_by_name(&self, scope: &S, name: &str) -> Result<Option<Player>, PersistenceError>;

    async fn find_by_id(&self, scope: &S, id: PlayerId) -> Result<Option<Player>, PersistenceError>;

    async fn find_by_account_id(
        &self,
        scope: &S,
        account_id: AccountId,
    ) -> Result<Option<Player>, PersistenceError>;
}
