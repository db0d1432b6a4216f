use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnection, PgPool, Postgres};
use sqlx::Transaction;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

use super::map_sqlx_error;
use crate::db::{PersistenceError, TransactionError, Transactor};
use crate::metrics::Metrics;

// ============================================================================
// PgScope - where a repository call runs
// ============================================================================
//
// Either the pool (each statement commits on its own) or a shared slot
// holding the open transaction. The slot is emptied when the transactor
// commits or rolls back; a scope used after that reports a database error.
//
// ============================================================================

type TxSlot = Arc<Mutex<Option<Transaction<'static, Postgres>>>>;

#[derive(Clone)]
pub struct PgScope {
    inner: ScopeInner,
}

#[derive(Clone)]
enum ScopeInner {
    Pool(PgPool),
    Transaction(TxSlot),
}

/// Connection borrowed from a scope for the duration of a repository call
pub enum ScopeConn<'a> {
    Pooled(PoolConnection<Postgres>),
    Transaction(MappedMutexGuard<'a, Transaction<'static, Postgres>>),
}

impl PgScope {
    fn pool(pool: PgPool) -> Self {
        Self {
            inner: ScopeInner::Pool(pool),
        }
    }

    pub fn in_transaction(&self) -> bool {
        matches!(self.inner, ScopeInner::Transaction(_))
    }

    pub async fn conn(&self) -> Result<ScopeConn<'_>, PersistenceError> {
        match &self.inner {
            ScopeInner::Pool(pool) => pool
                .acquire()
                .await
                .map(ScopeConn::Pooled)
                .map_err(map_sqlx_error),
            ScopeInner::Transaction(slot) => {
                let guard = slot.lock().await;
                MutexGuard::try_map(guard, |tx| tx.as_mut())
                    .map(ScopeConn::Transaction)
                    .map_err(|_| PersistenceError::database("transaction already closed"))
            }
        }
    }
}

impl Deref for ScopeConn<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        match self {
            Self::Pooled(conn) => &**conn,
            Self::Transaction(tx) => &***tx,
        }
    }
}

impl DerefMut for ScopeConn<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Self::Pooled(conn) => &mut **conn,
            Self::Transaction(tx) => &mut ***tx,
        }
    }
}

// ============================================================================
// PgTransactor
// ============================================================================

pub struct PgTransactor {
    pool: PgPool,
    metrics: Option<Arc<Metrics>>,
}

impl PgTransactor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool, metrics: None }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn record(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_transaction(outcome);
        }
    }
}

#[async_trait]
impl Transactor for PgTransactor {
    type Scope = PgScope;

    fn autocommit(&self) -> PgScope {
        PgScope::pool(self.pool.clone())
    }

    async fn within_transaction<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        T: Send + 'static,
        E: From<TransactionError> + Send + 'static,
        F: FnOnce(PgScope) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let tx = self.pool.begin().await.map_err(|error| {
            tracing::error!(error = %error, "Failed to begin transaction");
            TransactionError::BeginFailed(map_sqlx_error(error))
        })?;

        let slot: TxSlot = Arc::new(Mutex::new(Some(tx)));
        let result = work(PgScope {
            inner: ScopeInner::Transaction(slot.clone()),
        })
        .await;

        // Dropping an open Transaction rolls it back, which also covers
        // cancellation of this future.
        let Some(tx) = slot.lock().await.take() else {
            self.record("commit_failed");
            let closed = PersistenceError::database("transaction already closed");
            return Err(TransactionError::CommitFailed(closed).into());
        };

        match result {
            Ok(value) => match tx.commit().await {
                Ok(()) => {
                    self.record("committed");
                    Ok(value)
                }
                Err(error) => {
                    // A failed COMMIT ends the transaction server-side
                    tracing::error!(error = %error, "Failed to commit transaction");
                    self.record("commit_failed");
                    Err(TransactionError::CommitFailed(map_sqlx_error(error)).into())
                }
            },
            Err(err) => {
                if let Err(error) = tx.rollback().await {
                    tracing::warn!(error = %error, "Rollback failed");
                }
                self.record("rolled_back");
                Err(err)
            }
        }
    }
}
