use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

use super::aggregate::Campaign;
use super::errors::CampaignError;
use super::repository::CampaignRepository;
use super::value_objects::{AccessCode, CampaignStatus};
use crate::db::{PersistenceError, Transactor};
use crate::domain::ids::{CampaignId, PlayerId};
use crate::metrics::Metrics;

// ============================================================================
// Campaign Use Case
// ============================================================================
//
// Every write loads the aggregate, lets it enforce the rules, and persists
// the result inside one transaction. The access code leaves the store only
// once, in the creation response.
//
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinCampaignRequest {
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignCreated {
    pub id: CampaignId,
    pub name: String,
    pub description: String,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub master_id: PlayerId,
    pub access_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignJoined {
    pub id: CampaignId,
    pub name: String,
    pub description: String,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignSummary {
    pub id: CampaignId,
    pub name: String,
    pub description: String,
    pub status: CampaignStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub number_players: usize,
    pub can_be_joined: bool,
}

impl CampaignSummary {
    fn new(id: CampaignId, campaign: &Campaign) -> Self {
        Self {
            id,
            name: campaign.name().to_string(),
            description: campaign.description().to_string(),
            status: campaign.status(),
            created_at: campaign.created_at(),
            started_at: campaign.started_at(),
            number_players: campaign.number_players(),
            can_be_joined: campaign.can_be_joined(),
        }
    }
}

/// Lifecycle transitions only the master may trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Finish,
    Cancel,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Cancel => "cancel",
        }
    }

    fn apply(&self, campaign: &mut Campaign) -> Result<(), CampaignError> {
        match self {
            Self::Start => campaign.start(),
            Self::Finish => campaign.finish(),
            Self::Cancel => campaign.cancel(),
        }
    }
}

pub struct CampaignUseCase<T: Transactor> {
    transactor: Arc<T>,
    campaigns: Arc<dyn CampaignRepository<T::Scope>>,
    metrics: Option<Arc<Metrics>>,
}

impl<T: Transactor> CampaignUseCase<T> {
    pub fn new(transactor: Arc<T>, campaigns: Arc<dyn CampaignRepository<T::Scope>>) -> Self {
        Self {
            transactor,
            campaigns,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The creator becomes master. Its existence is not checked: the id
    /// comes from an authenticated token.
    pub async fn create_campaign(
        &self,
        request: CreateCampaignRequest,
        master: PlayerId,
    ) -> Result<CampaignCreated, CampaignError> {
        let span = tracing::info_span!(
            "create_campaign",
            correlation_id = %Uuid::new_v4(),
            master_id = %master,
        );

        async move {
            let mut campaign = Campaign::new(request.name, request.description, master)
                .map_err(|error| {
                    tracing::debug!(error = %error, "Rejected campaign");
                    error
                })?;
            let code = AccessCode::generate();

            let campaigns = self.campaigns.clone();
            let stored = campaign.clone();
            let stored_code = code.clone();
            let id = self
                .transactor
                .within_transaction(move |scope| async move {
                    campaigns
                        .save(&scope, &stored, &stored_code)
                        .await
                        .map_err(database("Failed to save new campaign"))
                })
                .await?;
            campaign.assign_id(id);

            tracing::info!(campaign_id = %id, "Campaign created");

            Ok(CampaignCreated {
                id,
                name: campaign.name().to_string(),
                description: campaign.description().to_string(),
                status: campaign.status(),
                created_at: campaign.created_at(),
                master_id: campaign.master(),
                access_code: code.as_str().to_string(),
            })
        }
        .instrument(span)
        .await
    }

    pub async fn join_campaign(
        &self,
        campaign_id: CampaignId,
        player: PlayerId,
        request: JoinCampaignRequest,
    ) -> Result<CampaignJoined, CampaignError> {
        let span = tracing::info_span!(
            "join_campaign",
            correlation_id = %Uuid::new_v4(),
            campaign_id = %campaign_id,
            player_id = %player,
        );
        let campaigns = self.campaigns.clone();

        self.transactor
            .within_transaction(move |scope| {
                async move {
                    let mut campaign = load(&*campaigns, &scope, campaign_id).await?;

                    let code = campaigns
                        .find_access_code(&scope, campaign_id)
                        .await
                        .map_err(database("Failed to load access code"))?;
                    if !code.matches(&request.code) {
                        tracing::debug!("Wrong access code");
                        return Err(CampaignError::WrongAccessCode);
                    }

                    campaign.add_player(player)?;
                    campaigns
                        .update(&scope, &campaign)
                        .await
                        .map_err(database("Failed to update campaign"))?;

                    tracing::info!(members = campaign.members().len(), "Player joined campaign");

                    Ok(CampaignJoined {
                        id: campaign_id,
                        name: campaign.name().to_string(),
                        description: campaign.description().to_string(),
                        status: campaign.status(),
                        created_at: campaign.created_at(),
                    })
                }
                .instrument(span)
            })
            .await
    }

    /// All campaigns, unfiltered
    pub async fn search_campaigns(&self) -> Result<Vec<CampaignSummary>, CampaignError> {
        let scope = self.transactor.autocommit();
        let campaigns = self
            .campaigns
            .find_all(&scope)
            .await
            .map_err(database("Failed to list campaigns"))?;

        campaigns
            .iter()
            .map(|campaign| Ok(CampaignSummary::new(stored_id(campaign)?, campaign)))
            .collect()
    }

    pub async fn start_campaign(
        &self,
        campaign_id: CampaignId,
        requester: PlayerId,
    ) -> Result<CampaignSummary, CampaignError> {
        self.transition(campaign_id, requester, Transition::Start).await
    }

    pub async fn finish_campaign(
        &self,
        campaign_id: CampaignId,
        requester: PlayerId,
    ) -> Result<CampaignSummary, CampaignError> {
        self.transition(campaign_id, requester, Transition::Finish).await
    }

    pub async fn cancel_campaign(
        &self,
        campaign_id: CampaignId,
        requester: PlayerId,
    ) -> Result<CampaignSummary, CampaignError> {
        self.transition(campaign_id, requester, Transition::Cancel).await
    }

    async fn transition(
        &self,
        campaign_id: CampaignId,
        requester: PlayerId,
        transition: Transition,
    ) -> Result<CampaignSummary, CampaignError> {
        let span = tracing::info_span!(
            "campaign_transition",
            correlation_id = %Uuid::new_v4(),
            campaign_id = %campaign_id,
            transition = transition.as_str(),
        );
        let campaigns = self.campaigns.clone();
        let metrics = self.metrics.clone();

        self.transactor
            .within_transaction(move |scope| {
                async move {
                    let mut campaign = load(&*campaigns, &scope, campaign_id).await?;

                    if campaign.master() != requester {
                        tracing::debug!(requester = %requester, "Transition refused to non-master");
                        return Err(CampaignError::NotCampaignMaster);
                    }

                    let before = campaign.status();
                    transition.apply(&mut campaign)?;

                    if campaign.status() != before {
                        campaigns
                            .update(&scope, &campaign)
                            .await
                            .map_err(database("Failed to update campaign"))?;
                        if let Some(metrics) = &metrics {
                            metrics.record_campaign_transition(transition.as_str());
                        }
                        tracing::info!(
                            from = %before,
                            to = %campaign.status(),
                            "Campaign transitioned"
                        );
                    }

                    Ok(CampaignSummary::new(campaign_id, &campaign))
                }
                .instrument(span)
            })
            .await
    }
}

async fn load<S: Send + Sync>(
    campaigns: &dyn CampaignRepository<S>,
    scope: &S,
    campaign_id: CampaignId,
) -> Result<Campaign, CampaignError> {
    match campaigns.find_by_id(scope, campaign_id).await {
        Ok(Some(campaign)) => Ok(campaign),
        Ok(None) => {
            tracing::debug!(campaign_id = %campaign_id, "No campaign found");
            Err(CampaignError::CampaignNotFound)
        }
        Err(error) => {
            tracing::error!(campaign_id = %campaign_id, error = %error, "Failed to load campaign");
            Err(CampaignError::Database)
        }
    }
}

fn stored_id(campaign: &Campaign) -> Result<CampaignId, CampaignError> {
    campaign.id().ok_or_else(|| {
        tracing::error!(name = %campaign.name(), "Stored campaign without id");
        CampaignError::Database
    })
}

fn database(message: &'static str) -> impl Fn(PersistenceError) -> CampaignError {
    move |error| {
        tracing::error!(error = %error, "{}", message);
        CampaignError::Database
    }
}
