use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use super::map_sqlx_error;
use super::transactor::PgScope;
use crate::db::PersistenceError;
use crate::domain::campaign::{
    AccessCode, Campaign, CampaignRecord, CampaignRepository, CampaignStatus,
};
use crate::domain::ids::{CampaignId, PlayerId};

#[derive(Debug, sqlx::FromRow)]
struct CampaignRow {
    campaign_id: i64,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    status: String,
    master_id: i64,
}

impl CampaignRow {
    fn into_campaign(self, members: BTreeSet<PlayerId>) -> Result<Campaign, PersistenceError> {
        let status: CampaignStatus = self
            .status
            .parse()
            .map_err(|error| {
                PersistenceError::database(format!("campaign {}: {error}", self.campaign_id))
            })?;

        Ok(Campaign::restore(CampaignRecord {
            id: CampaignId(self.campaign_id),
            name: self.name,
            description: self.description,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            status,
            master: PlayerId(self.master_id),
            members,
        }))
    }
}

const SELECT_CAMPAIGN: &str = "
    SELECT campaign_id, name, description, created_at, started_at, finished_at, status, master_id
    FROM campaigns
";

/// Transactional loads lock the row so concurrent lifecycle transitions
/// serialize on it until commit
fn select_by_id(lock_row: bool) -> String {
    if lock_row {
        format!("{SELECT_CAMPAIGN} WHERE campaign_id = $1 FOR UPDATE")
    } else {
        format!("{SELECT_CAMPAIGN} WHERE campaign_id = $1")
    }
}

const INSERT_MEMBER: &str = "
    INSERT INTO campaigns_players (campaign_id, player_id, is_master)
    VALUES ($1, $2, $3)
    ON CONFLICT (campaign_id, player_id) DO NOTHING
";

#[derive(Debug, Default, Clone, Copy)]
pub struct PgCampaignRepository;

#[async_trait]
impl CampaignRepository<PgScope> for PgCampaignRepository {
    async fn save(
        &self,
        scope: &PgScope,
        campaign: &Campaign,
        code: &AccessCode,
    ) -> Result<CampaignId, PersistenceError> {
        let mut conn = scope.conn().await?;

        let (campaign_id,): (i64,) = sqlx::query_as(
            "INSERT INTO campaigns (name, description, created_at, started_at,
                                    finished_at, status, master_id, access_code)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING campaign_id",
        )
        .bind(campaign.name())
        .bind(campaign.description())
        .bind(campaign.created_at())
        .bind(campaign.started_at())
        .bind(campaign.finished_at())
        .bind(campaign.status().as_str())
        .bind(campaign.master().get())
        .bind(code.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

        for member in campaign.members() {
            sqlx::query(INSERT_MEMBER)
                .bind(campaign_id)
                .bind(member.get())
                .bind(*member == campaign.master())
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
        }

        Ok(CampaignId(campaign_id))
    }

    async fn find_by_id(
        &self,
        scope: &PgScope,
        id: CampaignId,
    ) -> Result<Option<Campaign>, PersistenceError> {
        let mut conn = scope.conn().await?;

        let row: Option<CampaignRow> = sqlx::query_as(&select_by_id(scope.in_transaction()))
            .bind(id.get())
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let members: Vec<(i64,)> =
            sqlx::query_as("SELECT player_id FROM campaigns_players WHERE campaign_id = $1")
                .bind(id.get())
                .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        let members = members.into_iter().map(|(player_id,)| PlayerId(player_id)).collect();
        row.into_campaign(members).map(Some)
    }

    async fn find_access_code(
        &self,
        scope: &PgScope,
        id: CampaignId,
    ) -> Result<AccessCode, PersistenceError> {
        let mut conn = scope.conn().await?;

        let code: Option<(String,)> =
            sqlx::query_as("SELECT access_code FROM campaigns WHERE campaign_id = $1")
                .bind(id.get())
                .fetch_optional(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        code.map(|(code,)| AccessCode::from_stored(code))
            .ok_or(PersistenceError::NotFound)
    }

    async fn update(&self, scope: &PgScope, campaign: &Campaign) -> Result<(), PersistenceError> {
        let id = campaign.id().ok_or(PersistenceError::NotFound)?;
        let mut conn = scope.conn().await?;

        let result = sqlx::query(
            "UPDATE campaigns
             SET name = $1, description = $2, started_at = $3, finished_at = $4, status = $5
             WHERE campaign_id = $6",
        )
        .bind(campaign.name())
        .bind(campaign.description())
        .bind(campaign.started_at())
        .bind(campaign.finished_at())
        .bind(campaign.status().as_str())
        .bind(id.get())
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(PersistenceError::NotFound);
        }

        for member in campaign.members() {
            sqlx::query(INSERT_MEMBER)
                .bind(id.get())
                .bind(member.get())
                .bind(*member == campaign.master())
                .execute(&mut *conn)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    async fn find_all(&self, scope: &PgScope) -> Result<Vec<Campaign>, PersistenceError> {
        let mut conn = scope.conn().await?;

        let rows: Vec<CampaignRow> =
            sqlx::query_as(&format!("{SELECT_CAMPAIGN} ORDER BY campaign_id"))
                .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        let memberships: Vec<(i64, i64)> =
            sqlx::query_as("SELECT campaign_id, player_id FROM campaigns_players")
                .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        let mut members: BTreeMap<i64, BTreeSet<PlayerId>> = BTreeMap::new();
        for (campaign_id, player_id) in memberships {
            members.entry(campaign_id).or_default().insert(PlayerId(player_id));
        }

        rows.into_iter()
            .map(|row| {
                let roster = members.remove(&row.campaign_id).unwrap_or_default();
                row.into_campaign(roster)
            })
            .collect()
    }
}
