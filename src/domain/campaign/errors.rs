use crate::db::TransactionError;
use crate::domain::error::ErrorKind;

// ============================================================================
// Campaign Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("campaign name must be at most {max} characters")]
    InvalidName { max: usize },

    #[error("campaign description must be at most {max} characters")]
    InvalidDescription { max: usize },

    #[error("player already in campaign")]
    PlayerAlreadyInCampaign,

    #[error("campaign is finished")]
    CampaignFinished,

    #[error("campaign is cancelled")]
    CampaignCancelled,

    #[error("campaign is still not created")]
    CampaignNotCreated,

    #[error("campaign is still not started")]
    CampaignNotStarted,

    #[error("campaign is already started")]
    CampaignAlreadyStarted,

    #[error("not enough players to start the campaign")]
    NotEnoughPlayers,

    #[error("campaign not found")]
    CampaignNotFound,

    #[error("wrong access code")]
    WrongAccessCode,

    #[error("only the campaign master can do this")]
    NotCampaignMaster,

    #[error("database error when executing use case")]
    Database,

    #[error("could not commit transaction")]
    CommitFailed,
}

impl CampaignError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName { .. } | Self::InvalidDescription { .. } => ErrorKind::Validation,
            Self::PlayerAlreadyInCampaign
            | Self::CampaignFinished
            | Self::CampaignCancelled
            | Self::CampaignNotCreated
            | Self::CampaignNotStarted
            | Self::CampaignAlreadyStarted
            | Self::NotEnoughPlayers => ErrorKind::StateConflict,
            Self::CampaignNotFound => ErrorKind::NotFound,
            Self::WrongAccessCode | Self::NotCampaignMaster => ErrorKind::Credential,
            Self::Database | Self::CommitFailed => ErrorKind::Infrastructure,
        }
    }
}

impl From<TransactionError> for CampaignError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::BeginFailed(_) => Self::Database,
            TransactionError::CommitFailed(_) => Self::CommitFailed,
        }
    }
}
