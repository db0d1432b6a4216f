// ============================================================================
// Authentication Collaborators
// ============================================================================
//
// Contracts consumed by the use cases plus their implementations:
// - token    - HS256 JWTs carrying (account id, player id)
// - password - Argon2id hashes in PHC format
//
// ============================================================================

mod password;
mod token;

use serde::{Deserialize, Serialize};

use crate::domain::ids::{AccountId, PlayerId};
use crate::domain::account::HashedPassword;

pub use password::{Argon2PasswordHasher, HashingError};
pub use token::{JwtTokenService, TokenError};

/// Identity pair embedded in every issued token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub account_id: AccountId,
    pub player_id: PlayerId,
}

pub trait TokenIssuer: Send + Sync {
    fn issue(&self, claims: &Claims) -> Result<String, TokenError>;
}

pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Claims, TokenError>;
}

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, raw: &str) -> Result<HashedPassword, HashingError>;

    /// Never errors: a malformed stored hash simply does not verify
    fn verify(&self, hash: &HashedPassword, raw: &str) -> bool;
}
