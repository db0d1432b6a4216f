use crate::domain::error::ErrorKind;

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("player name must be between 1 and {max} characters")]
    InvalidName { max: usize },

    #[error("player name {base} still taken after {attempts} attempts")]
    NameExhausted { base: String, attempts: u32 },

    #[error("database error while saving player")]
    Database,
}

impl PlayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName { .. } => ErrorKind::Validation,
            Self::NameExhausted { .. } => ErrorKind::Conflict,
            Self::Database => ErrorKind::Infrastructure,
        }
    }
}
