// ============================================================================
// Player Domain
// ============================================================================
//
// - player     - PlayerName value object, Player entity
// - errors     - PlayerError
// - repository - PlayerRepository contract
// - allocator  - UniquePlayerAllocator (bounded rename-on-conflict)
//
// ============================================================================

pub mod allocator;
pub mod errors;
pub mod player;
pub mod repository;

pub use allocator::*;
pub use errors::*;
pub use player::*;
pub use repository::*;
