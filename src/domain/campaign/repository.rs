use async_trait::async_trait;

use super::aggregate::Campaign;
use super::value_objects::AccessCode;
use crate::db::PersistenceError;
use crate::domain::ids::CampaignId;

/// Campaign persistence. Membership is stored with the campaign.
#[async_trait]
pub trait CampaignRepository<S: Send + Sync>: Send + Sync {
    /// Stores campaign, members and access code; returns the new id
    async fn save(
        &self,
        scope: &S,
        campaign: &Campaign,
        code: &AccessCode,
    ) -> Result<CampaignId, PersistenceError>;

    async fn find_by_id(
        &self,
        scope: &S,
        id: CampaignId,
    ) -> Result<Option<Campaign>, PersistenceError>;

    /// `NotFound` for an unknown campaign
    async fn find_access_code(
        &self,
        scope: &S,
        id: CampaignId,
    ) -> Result<AccessCode, PersistenceError>;

    /// Persists status, timestamps and any new members
    async fn update(&self, scope: &S, campaign: &Campaign) -> Result<(), PersistenceError>;

    /// Every campaign, ordered by id
    async fn find_all(&self, scope: &S) -> Result<Vec<Campaign>, PersistenceError>;
}
