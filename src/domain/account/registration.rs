use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use super::account::{Account, NewAccount};
use super::errors::AccountError;
use super::repository::AccountRepository;
use super::value_objects::{validate_raw_password, Email, Username};
use crate::auth::{Claims, PasswordHasher, TokenIssuer};
use crate::db::Transactor;
use crate::domain::error::ErrorKind;
use crate::domain::ids::{AccountId, PlayerId};
use crate::domain::player::{Player, PlayerName, PlayerRepository, UniquePlayerAllocator};
use crate::metrics::Metrics;

// ============================================================================
// Account Registration
// ============================================================================
//
// Orchestrates: validate -> hash -> [save account -> allocate player] -> token
//
// The bracketed part is one transaction. A failure anywhere inside it,
// player name exhaustion included, leaves neither row behind. Account names
// are never retried; only the player name is.
//
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummary {
    pub player_id: PlayerId,
    pub name: PlayerName,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResponse {
    pub account_id: AccountId,
    pub username: Username,
    pub email: Option<Email>,
    pub created_at: DateTime<Utc>,
    pub player: PlayerSummary,
}

impl RegistrationResponse {
    fn new(account: Account, player: Player) -> Self {
        Self {
            account_id: account.id,
            username: account.username,
            email: account.email,
            created_at: account.created_at,
            player: PlayerSummary {
                player_id: player.id,
                name: player.name,
            },
        }
    }
}

/// Successful registration: what the caller shows plus the bearer token
#[derive(Debug, Clone)]
pub struct Registered {
    pub response: RegistrationResponse,
    pub token: String,
}

pub struct AccountRegistration<T: Transactor> {
    transactor: Arc<T>,
    accounts: Arc<dyn AccountRepository<T::Scope>>,
    players: Arc<dyn PlayerRepository<T::Scope>>,
    allocator: Arc<UniquePlayerAllocator<T::Scope>>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
    metrics: Option<Arc<Metrics>>,
}

impl<T: Transactor> AccountRegistration<T> {
    pub fn new(
        transactor: Arc<T>,
        accounts: Arc<dyn AccountRepository<T::Scope>>,
        players: Arc<dyn PlayerRepository<T::Scope>>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
    ) -> Self {
        let allocator = Arc::new(UniquePlayerAllocator::new(players.clone()));
        Self {
            transactor,
            accounts,
            players,
            allocator,
            hasher,
            tokens,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.allocator = Arc::new(
            UniquePlayerAllocator::new(self.players.clone()).with_metrics(metrics.clone()),
        );
        self.metrics = Some(metrics);
        self
    }

    pub async fn register(&self, request: RegistrationRequest) -> Result<Registered, AccountError> {
        let correlation_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "register_account",
            correlation_id = %correlation_id,
            username = %request.username,
        );

        let result = self.register_inner(request).instrument(span).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_registration(outcome_label(&result));
        }
        result
    }

    async fn register_inner(
        &self,
        request: RegistrationRequest,
    ) -> Result<Registered, AccountError> {
        // Validation: no I/O past this block except hashing
        let username = Username::parse(request.username)?;
        validate_raw_password(&request.password)?;
        // Only an empty string means "no email"; whitespace is validated
        let email = match request.email.as_deref() {
            Some("") | None => None,
            Some(raw) => Some(Email::parse(raw)?),
        };
        let player_name = PlayerName::parse(username.as_str())?;

        let password = self.hasher.hash(&request.password).map_err(|error| {
            tracing::error!(error = %error, "Failed to hash password");
            AccountError::HashingFailed
        })?;

        let mut new_account = NewAccount::new(username, password);
        if let Some(email) = email {
            new_account = new_account.with_email(email);
        }

        let accounts = self.accounts.clone();
        let allocator = self.allocator.clone();

        let (account, player) = self
            .transactor
            .within_transaction(move |scope| async move {
                let account = accounts.save(&scope, &new_account).await.map_err(|error| {
                    if error.is_unique_violation() {
                        tracing::info!(
                            username = %new_account.username,
                            "Account name already taken"
                        );
                        AccountError::AccountNameAlreadyTaken
                    } else {
                        tracing::error!(error = %error, "Failed to save new account");
                        AccountError::Database
                    }
                })?;

                let player = allocator.allocate(&scope, &player_name, account.id).await?;

                Ok::<_, AccountError>((account, player))
            })
            .await?;

        tracing::info!(
            account_id = %account.id,
            player_id = %player.id,
            player_name = %player.name,
            "Account registered"
        );

        let claims = Claims {
            account_id: account.id,
            player_id: player.id,
        };
        let token = self.tokens.issue(&claims).map_err(|error| {
            tracing::error!(account_id = %account.id, error = %error, "Failed to issue token");
            AccountError::TokenIssueFailed
        })?;

        Ok(Registered {
            response: RegistrationResponse::new(account, player),
            token,
        })
    }
}

fn outcome_label(result: &Result<Registered, AccountError>) -> &'static str {
    match result {
        Ok(_) => "registered",
        Err(error) => match error.kind() {
            ErrorKind::Validation => "rejected",
            ErrorKind::Conflict => "conflict",
            _ => "failed",
        },
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{Argon2PasswordHasher, JwtTokenService, TokenVerifier};
    use crate::db::memory::MemoryStore;
    use std::time::Duration;

    fn tokens() -> Arc<JwtTokenService> {
        Arc::new(JwtTokenService::new("test-secret", "campaign-hub", Duration::from_secs(60)))
    }

    fn registration(
        store: &Arc<MemoryStore>,
        tokens: Arc<JwtTokenService>,
    ) -> AccountRegistration<MemoryStore> {
        AccountRegistration::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(Argon2PasswordHasher::with_cost(8, 1).unwrap()),
            tokens,
        )
    }

    fn request(username: &str, email: Option<&str>) -> RegistrationRequest {
        RegistrationRequest {
            username: username.to_string(),
            password: "correct horse".to_string(),
            email: email.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_register_creates_account_and_player() {
        let store = Arc::new(MemoryStore::new());
        let tokens = tokens();
        let registration = registration(&store, tokens.clone());

        let registered = registration
            .register(request("aragorn", Some(" Strider@Gondor.org ")))
            .await
            .unwrap();

        let response = &registered.response;
        assert_eq!(response.username.as_str(), "aragorn");
        assert_eq!(response.email.as_ref().unwrap().as_str(), "strider@gondor.org");
        assert_eq!(response.player.name.as_str(), "aragorn");

        let claims = tokens.verify(&registered.token).unwrap();
        assert_eq!(claims.account_id, response.account_id);
        assert_eq!(claims.player_id, response.player.player_id);

        assert_eq!(store.account_count(), 1);
        assert_eq!(store.player_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_email_is_absent_but_whitespace_is_invalid() {
        let store = Arc::new(MemoryStore::new());
        let registration = registration(&store, tokens());

        let blank = registration.register(request("aragorn", Some("   "))).await;
        assert!(matches!(blank, Err(AccountError::InvalidEmail)));
        assert_eq!(store.account_count(), 0);

        let registered = registration.register(request("aragorn", Some(""))).await.unwrap();
        assert!(registered.response.email.is_none());
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_write() {
        let store = Arc::new(MemoryStore::new());
        let registration = registration(&store, tokens());

        let short_name = registration.register(request("bob", None)).await;
        assert!(matches!(short_name, Err(AccountError::InvalidUsername { .. })));

        let bad_email = registration.register(request("aragorn", Some("not-a-mail"))).await;
        assert!(matches!(bad_email, Err(AccountError::InvalidEmail)));

        let mut weak = request("aragorn", None);
        weak.password = "short".to_string();
        let weak_password = registration.register(weak).await;
        assert!(matches!(weak_password, Err(AccountError::InvalidPassword { .. })));

        assert_eq!(store.account_count(), 0);
        assert_eq!(store.player_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_not_retried() {
        let store = Arc::new(MemoryStore::new());
        let registration = registration(&store, tokens());

        registration.register(request("aragorn", None)).await.unwrap();
        let second = registration.register(request("aragorn", None)).await;

        assert!(matches!(second, Err(AccountError::AccountNameAlreadyTaken)));
        assert_eq!(store.account_count(), 1);
        assert_eq!(store.player_count(), 1);
    }

    #[tokio::test]
    async fn test_outcomes_are_counted() {
        let store = Arc::new(MemoryStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let registration = registration(&store, tokens()).with_metrics(metrics.clone());

        registration.register(request("aragorn", None)).await.unwrap();
        let _ = registration.register(request("aragorn", None)).await;
        let _ = registration.register(request("bob", None)).await;

        let by_outcome =
            |label: &str| metrics.registrations_total.with_label_values(&[label]).get();
        assert_eq!(by_outcome("registered"), 1);
        assert_eq!(by_outcome("conflict"), 1);
        assert_eq!(by_outcome("rejected"), 1);
    }
}
