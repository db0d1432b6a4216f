use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, PasswordVerifier, Version};

use super::PasswordHasher;
use crate::domain::account::HashedPassword;

#[derive(Debug, thiserror::Error)]
pub enum HashingError {
    #[error("hasher misconfigured: {0}")]
    Config(String),

    #[error("failed to hash password: {0}")]
    Hash(String),
}

/// Argon2id hashes stored in PHC string format (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`)
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl Argon2PasswordHasher {
    /// Custom memory (KiB) and iteration costs, single lane
    pub fn with_cost(memory_kib: u32, iterations: u32) -> Result<Self, HashingError> {
        let params = Params::new(memory_kib, iterations, 1, None)
            .map_err(|e| HashingError::Config(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, raw: &str) -> Result<HashedPassword, HashingError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(raw.as_bytes(), &salt)
            .map_err(|e| HashingError::Hash(e.to_string()))?;

        Ok(HashedPassword::new(hash.to_string()))
    }

    fn verify(&self, hash: &HashedPassword, raw: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash.as_str()) else {
            return false;
        };

        // Cost parameters come from the stored hash
        self.argon2
            .verify_password(raw.as_bytes(), &parsed)
            .is_ok()
    }
}
