// ============================================================================
// Storage Layer
// ============================================================================
//
// - errors     - PersistenceError, the adapter -> domain error contract
// - transactor - Transactor trait (unit of work)
// - postgres   - sqlx adapter
// - memory     - in-process adapter with the same transactional semantics
//
// ============================================================================

mod errors;
mod transactor;

pub mod memory;
pub mod postgres;

pub use errors::PersistenceError;
pub use transactor::{TransactionError, Transactor};
