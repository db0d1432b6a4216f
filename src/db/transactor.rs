use async_trait::async_trait;
use std::future::Future;

// ============================================================================
// Transactor - Unit of Work
// ============================================================================
//
// `within_transaction` opens one atomic scope and hands `work` a scope
// handle. Repositories take that handle as their first argument, so every
// call made with it, however deeply nested, lands in the same transaction.
// Calls made with `autocommit()` run outside any transaction.
//
// Outcome rules:
// - `work` fails      -> rollback, the error is returned unchanged
// - `work` succeeds   -> commit
// - commit fails      -> rollback attempted, `TransactionError::CommitFailed`
// - future dropped    -> the open transaction is rolled back, never committed
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("failed to begin transaction")]
    BeginFailed(#[source] crate::db::PersistenceError),

    #[error("could not commit transaction")]
    CommitFailed(#[source] crate::db::PersistenceError),
}

#[async_trait]
pub trait Transactor: Send + Sync + 'static {
    /// Handle through which repositories reach the active connection
    type Scope: Clone + Send + Sync + 'static;

    /// Scope that runs each statement on its own, outside any transaction
    fn autocommit(&self) -> Self::Scope;

    async fn within_transaction<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<TransactionError> + Send + 'static,
        F: FnOnce(Self::Scope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static;
}
