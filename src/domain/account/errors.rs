use crate::db::TransactionError;
use crate::domain::error::ErrorKind;
use crate::domain::player::PlayerError;

// ============================================================================
// Account Use Case Errors
// ============================================================================
//
// Storage details never reach these variants; they are logged where the
// storage error is translated.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("username must be between {min} and {max} characters")]
    InvalidUsername { min: usize, max: usize },

    #[error("password must be between {min} and {max} characters")]
    InvalidPassword { min: usize, max: usize },

    #[error("invalid email format")]
    InvalidEmail,

    #[error("player name must be at most {max} characters")]
    InvalidPlayerName { max: usize },

    #[error("account name already taken")]
    AccountNameAlreadyTaken,

    #[error("could not find a free player name")]
    NameExhausted,

    #[error("invalid login credentials")]
    InvalidCredentials,

    #[error("account not found")]
    AccountNotFound,

    #[error("could not hash the password")]
    HashingFailed,

    #[error("could not issue authentication token")]
    TokenIssueFailed,

    #[error("database error when executing use case")]
    Database,

    #[error("could not commit transaction")]
    CommitFailed,
}

impl AccountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUsername { .. }
            | Self::InvalidPassword { .. }
            | Self::InvalidEmail
            | Self::InvalidPlayerName { .. } => ErrorKind::Validation,
            Self::AccountNameAlreadyTaken | Self::NameExhausted => ErrorKind::Conflict,
            Self::AccountNotFound => ErrorKind::NotFound,
            Self::InvalidCredentials => ErrorKind::Credential,
            Self::HashingFailed | Self::TokenIssueFailed | Self::Database | Self::CommitFailed => {
                ErrorKind::Infrastructure
            }
        }
    }
}

impl From<TransactionError> for AccountError {
    fn from(err: TransactionError) -> Self {
        match err {
            TransactionError::BeginFailed(_) => Self::Database,
            TransactionError::CommitFailed(_) => Self::CommitFailed,
        }
    }
}

impl From<PlayerError> for AccountError {
    fn from(err: PlayerError) -> Self {
        match err {
            PlayerError::InvalidName { max } => Self::InvalidPlayerName { max },
            PlayerError::NameExhausted { .. } => Self::NameExhausted,
            PlayerError::Database => Self::Database,
        }
    }
}
