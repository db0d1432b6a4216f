use std::sync::Arc;

use super::errors::PlayerError;
use super::player::{Player, PlayerName};
use super::repository::PlayerRepository;
use crate::domain::ids::AccountId;
use crate::metrics::Metrics;
use crate::utils::{retry_bounded, RetryPolicy, RetryResult};

// ============================================================================
// Unique Player Allocator
// ============================================================================
//
// Persists a player under `base`, and on a uniqueness conflict retries with
// `base_1`, `base_2`, ... up to MAX_NAME_ATTEMPTS attempts in total. Each
// attempt builds a fresh candidate from (base, attempt); nothing is mutated
// between attempts. Any other storage failure aborts on the spot.
//
// Runs inside the caller's transaction and relies on the repository keeping
// that transaction usable after a rejected insert.
//
// ============================================================================

pub const MAX_NAME_ATTEMPTS: u32 = 3;

pub struct UniquePlayerAllocator<S: Send + Sync> {
    players: Arc<dyn PlayerRepository<S>>,
    policy: RetryPolicy,
    metrics: Option<Arc<Metrics>>,
}

impl<S: Send + Sync> UniquePlayerAllocator<S> {
    pub fn new(players: Arc<dyn PlayerRepository<S>>) -> Self {
        Self {
            players,
            policy: RetryPolicy::with_max_attempts(MAX_NAME_ATTEMPTS),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn allocate(
        &self,
        scope: &S,
        base: &PlayerName,
        account_id: AccountId,
    ) -> Result<Player, PlayerError> {
        let players = &self.players;
        let metrics = self.metrics.as_deref();

        let outcome = retry_bounded(self.policy, move |attempt| {
            let candidate = PlayerName::candidate(base, attempt - 1);

            if attempt > 1 {
                tracing::info!(
                    base_name = %base,
                    player_name = %candidate,
                    attempt = attempt,
                    max_attempts = MAX_NAME_ATTEMPTS,
                    "Player name already taken, retrying"
                );
                if let Some(metrics) = metrics {
                    metrics.record_player_name_retry();
                }
            }

            async move { players.save(scope, &candidate, account_id).await }
        })
        .await;

        match outcome {
            RetryResult::Success { value, attempts } => {
                tracing::debug!(
                    player_id = %value.id,
                    player_name = %value.name,
                    attempts = attempts,
                    "Player persisted"
                );
                Ok(value)
            }
            RetryResult::Exhausted(_) => {
                tracing::warn!(
                    base_name = %base,
                    account_id = %account_id,
                    max_attempts = MAX_NAME_ATTEMPTS,
                    "No free player name after all attempts"
                );
                Err(PlayerError::NameExhausted {
                    base: base.to_string(),
                    attempts: MAX_NAME_ATTEMPTS,
                })
            }
            RetryResult::PermanentFailure(error) => {
                tracing::error!(
                    base_name = %base,
                    account_id = %account_id,
                    error = %error,
                    "Failed to save new player"
                );
                Err(PlayerError::Database)
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
