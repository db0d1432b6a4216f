// ============================================================================
// Account Domain
// ============================================================================
//
// - value_objects - Username, Email, HashedPassword, password rules
// - account       - NewAccount / Account entities
// - errors        - AccountError
// - repository    - AccountRepository contract
// - registration  - account + player creation in one transaction
// - login         - credential check and token issuance
// - management    - email change
//
// ============================================================================

pub mod account;
pub mod errors;
pub mod login;
pub mod management;
pub mod registration;
pub mod repository;
pub mod value_objects;

pub use account::*;
pub use errors::*;
pub use login::*;
pub use management::*;
pub use registration::*;
pub use repository::*;
pub use value_objects::*;
