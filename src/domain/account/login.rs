use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use super::errors::AccountError;
use super::repository::AccountRepository;
use super::value_objects::HashedPassword;
use crate::auth::{Claims, PasswordHasher, TokenIssuer};
use crate::db::Transactor;
use crate::domain::ids::{AccountId, PlayerId};
use crate::domain::player::PlayerRepository;

// ============================================================================
// Login - read path, runs on the autocommit scope
// ============================================================================
//
// Unknown username and wrong password produce the same InvalidCredentials
// after the same amount of hashing work.
// A failed last-access update fails the login with Database.
//
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub account_id: AccountId,
    pub player_id: PlayerId,
    pub token: String,
}

pub struct Login<T: Transactor> {
    transactor: Arc<T>,
    accounts: Arc<dyn AccountRepository<T::Scope>>,
    players: Arc<dyn PlayerRepository<T::Scope>>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
    /// Verified against when the username is unknown
    dummy_hash: Option<HashedPassword>,
}

impl<T: Transactor> Login<T> {
    pub fn new(
        transactor: Arc<T>,
        accounts: Arc<dyn AccountRepository<T::Scope>>,
        players: Arc<dyn PlayerRepository<T::Scope>>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        let dummy_hash = match hasher.hash(&Uuid::new_v4().to_string()) {
            Ok(hash) => Some(hash),
            Err(error) => {
                tracing::warn!(error = %error, "Failed to prepare dummy password hash");
                None
            }
        };

        Self {
            transactor,
            accounts,
            players,
            hasher,
            tokens,
            dummy_hash,
        }
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AccountError> {
        let span = tracing::info_span!("login", correlation_id = %Uuid::new_v4());
        self.login_inner(request).instrument(span).await
    }

    async fn login_inner(&self, request: LoginRequest) -> Result<LoginResponse, AccountError> {
        let scope = self.transactor.autocommit();

        let account = self
            .accounts
            .find_by_username(&scope, &request.username)
            .await
            .map_err(|error| {
                tracing::error!(error = %error, "Failed to look up account");
                AccountError::Database
            })?;

        let account = match account {
            Some(account) if self.hasher.verify(&account.password, &request.password) => account,
            Some(_) => {
                tracing::debug!("Rejected login attempt");
                return Err(AccountError::InvalidCredentials);
            }
            None => {
                if let Some(dummy) = &self.dummy_hash {
                    self.hasher.verify(dummy, &request.password);
                }
                tracing::debug!("Rejected login attempt");
                return Err(AccountError::InvalidCredentials);
            }
        };

        let player = self
            .players
            .find_by_account_id(&scope, account.id)
            .await
            .map_err(|error| {
                tracing::error!(
                    account_id = %account.id,
                    error = %error,
                    "Failed to look up player"
                );
                AccountError::Database
            })?
            .ok_or_else(|| {
                tracing::error!(account_id = %account.id, "Account has no player");
                AccountError::Database
            })?;

        self.accounts
            .update_last_access(&scope, account.id)
            .await
            .map_err(|error| {
                tracing::error!(
                    account_id = %account.id,
                    error = %error,
                    "Failed to update last access"
                );
                AccountError::Database
            })?;

        let claims = Claims {
            account_id: account.id,
            player_id: player.id,
        };
        let token = self.tokens.issue(&claims).map_err(|error| {
            tracing::error!(account_id = %account.id, error = %error, "Failed to issue token");
            AccountError::TokenIssueFailed
        })?;

        tracing::info!(account_id = %account.id, player_id = %player.id, "Login succeeded");

        Ok(LoginResponse {
            account_id: account.id,
            player_id: player.id,
            token,
        })
    }
}
