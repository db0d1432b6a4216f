use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Storage-assigned identifiers
// ============================================================================
//
// Every aggregate id is handed out by the store on first persist. The
// newtypes keep an account id from being passed where a player id is due.
//
// ============================================================================

macro_rules! storage_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }
    };
}

storage_id!(
    /// Account primary key
    AccountId
);
storage_id!(
    /// Player primary key
    PlayerId
);
storage_id!(
    /// Campaign primary key
    CampaignId
);
