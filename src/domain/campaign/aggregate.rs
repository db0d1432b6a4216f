use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::errors::CampaignError;
use super::value_objects::{
    CampaignStatus, MAX_DESCRIPTION_CHARACTERS, MAX_NAME_CHARACTERS, MAX_PLAYERS, MIN_PLAYERS,
};
use crate::domain::ids::{CampaignId, PlayerId};

// ============================================================================
// Campaign Aggregate - Lifecycle and Membership
// ============================================================================
//
//   Created --start--> Started --finish--> Finished
//      |
//      +---cancel----> Cancelled
//
// Start on a Started campaign is a no-op. The master is a member from
// construction on and can never leave.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct Campaign {
    id: Option<CampaignId>,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    status: CampaignStatus,
    master: PlayerId,
    members: BTreeSet<PlayerId>,
}

/// Stored state of a campaign, as adapters read it back
#[derive(Debug, Clone)]
pub struct CampaignRecord {
    pub id: CampaignId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    pub master: PlayerId,
    pub members: BTreeSet<PlayerId>,
}

impl Campaign {
    /// Fresh campaign in `Created`, with `master` as sole member
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        master: PlayerId,
    ) -> Result<Self, CampaignError> {
        let name = name.into();
        let description = description.into();

        if name.chars().count() > MAX_NAME_CHARACTERS {
            return Err(CampaignError::InvalidName {
                max: MAX_NAME_CHARACTERS,
            });
        }
        if description.chars().count() > MAX_DESCRIPTION_CHARACTERS {
            return Err(CampaignError::InvalidDescription {
                max: MAX_DESCRIPTION_CHARACTERS,
            });
        }

        Ok(Self {
            id: None,
            name,
            description,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            status: CampaignStatus::Created,
            master,
            members: BTreeSet::from([master]),
        })
    }

    pub fn restore(record: CampaignRecord) -> Self {
        let mut members = record.members;
        members.insert(record.master);

        Self {
            id: Some(record.id),
            name: record.name,
            description: record.description,
            created_at: record.created_at,
            started_at: record.started_at,
            finished_at: record.finished_at,
            status: record.status,
            master: record.master,
            members,
        }
    }

    /// Called once the store has assigned an id
    pub fn assign_id(&mut self, id: CampaignId) {
        self.id = Some(id);
    }

    pub fn id(&self) -> Option<CampaignId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn status(&self) -> CampaignStatus {
        self.status
    }

    pub fn master(&self) -> PlayerId {
        self.master
    }

    pub fn members(&self) -> &BTreeSet<PlayerId> {
        &self.members
    }

    pub fn is_member(&self, player: PlayerId) -> bool {
        self.members.contains(&player)
    }

    /// Members other than the master
    pub fn number_players(&self) -> usize {
        self.members.len().saturating_sub(1)
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    pub fn start(&mut self) -> Result<(), CampaignError> {
        match self.status {
            CampaignStatus::Started => return Ok(()),
            CampaignStatus::Finished => return Err(CampaignError::CampaignFinished),
            CampaignStatus::Cancelled => return Err(CampaignError::CampaignCancelled),
            CampaignStatus::Created => {}
        }

        if self.members.len() < MIN_PLAYERS {
            return Err(CampaignError::NotEnoughPlayers);
        }

        self.status = CampaignStatus::Started;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn finish(&mut self) -> Result<(), CampaignError> {
        match self.status {
            CampaignStatus::Finished => Err(CampaignError::CampaignFinished),
            CampaignStatus::Cancelled => Err(CampaignError::CampaignCancelled),
            CampaignStatus::Created => Err(CampaignError::CampaignNotStarted),
            CampaignStatus::Started => {
                self.status = CampaignStatus::Finished;
                self.finished_at = Some(Utc::now());
                Ok(())
            }
        }
    }

    pub fn cancel(&mut self) -> Result<(), CampaignError> {
        match self.status {
            CampaignStatus::Cancelled => Err(CampaignError::CampaignCancelled),
            CampaignStatus::Finished => Err(CampaignError::CampaignFinished),
            CampaignStatus::Started => Err(CampaignError::CampaignAlreadyStarted),
            CampaignStatus::Created => {
                self.status = CampaignStatus::Cancelled;
                self.finished_at = Some(Utc::now());
                Ok(())
            }
        }
    }

    /// Does not check MAX_PLAYERS.
    pub fn add_player(&mut self, player: PlayerId) -> Result<(), CampaignError> {
        match self.status {
            CampaignStatus::Finished => return Err(CampaignError::CampaignFinished),
            CampaignStatus::Cancelled => return Err(CampaignError::CampaignCancelled),
            CampaignStatus::Created | CampaignStatus::Started => {}
        }

        if !self.members.insert(player) {
            return Err(CampaignError::PlayerAlreadyInCampaign);
        }
        Ok(())
    }

    /// True while `Created`, or while under the member cap in any status.
    pub fn can_be_joined(&self) -> bool {
        self.status == CampaignStatus::Created || self.members.len() < MAX_PLAYERS
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
