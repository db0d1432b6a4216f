// ============================================================================
// Campaign Domain
// ============================================================================
//
// - value_objects - CampaignStatus, AccessCode, limits
// - aggregate     - Campaign state machine and membership
// - errors        - CampaignError
// - repository    - CampaignRepository contract
// - use_case      - create / join / search / lifecycle transitions
//
// ============================================================================

pub mod aggregate;
pub mod errors;
pub mod repository;
pub mod use_case;
pub mod value_objects;

pub use aggregate::*;
pub use errors::*;
pub use repository::*;
pub use use_case::*;
pub use value_objects::*;
