// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each area has its own subdirectory with:
// - Value objects
// - Errors
// - Entity or aggregate
// - Repository contracts
// - Use cases
//
// Storage lives behind the repository traits; nothing here knows which
// adapter is in use.
//
// ============================================================================

pub mod account;
pub mod campaign;
pub mod error;
pub mod ids;
pub mod player;

pub use error::ErrorKind;
