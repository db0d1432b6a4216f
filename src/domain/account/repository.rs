use async_trait::async_trait;

use super::account::{Account, NewAccount};
use crate::db::PersistenceError;
use crate::domain::ids::AccountId;

/// Account persistence. `S` is the scope handle of the active
/// [`Transactor`](crate::db::Transactor).
#[async_trait]
pub trait AccountRepository<S: Send + Sync>: Send + Sync {
    /// Reports `UniqueViolation` when the username is taken
    async fn save(&self, scope: &S, account: &NewAccount) -> Result<Account, PersistenceError>;

    async fn find_by_username(
        &self,
        scope: &S,
        username: &str,
    ) -> Result<Option<Account>, PersistenceError>;

    async fn find_by_id(
        &self,
        scope: &S,
        id: AccountId,
    ) -> Result<Option<Account>, PersistenceError>;

    /// `NotFound` when no row was touched
    async fn update_last_access(&self, scope: &S, id: AccountId) -> Result<(), PersistenceError>;

    /// Persists the mutable fields (email)
    async fn update(&self, scope: &S, account: &Account) -> Result<(), PersistenceError>;
}
