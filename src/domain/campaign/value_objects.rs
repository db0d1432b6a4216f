use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Campaign Value Objects
// ============================================================================

pub const MAX_NAME_CHARACTERS: usize = 50;
pub const MAX_DESCRIPTION_CHARACTERS: usize = 200;
/// Master included
pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 100;

const ACCESS_CODE_BYTES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    Created,
    Started,
    Finished,
    Cancelled,
}

impl CampaignStatus {
    /// Form used in storage and responses
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Started => "STARTED",
            Self::Finished => "FINISHED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown campaign status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for CampaignStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "CREATED" => Ok(Self::Created),
            "STARTED" => Ok(Self::Started),
            "FINISHED" => Ok(Self::Finished),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Shared secret gating joins: 6 uppercase hex characters.
///
/// Generated once per campaign and never regenerated.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessCode(String);

impl AccessCode {
    pub fn generate() -> Self {
        let mut bytes = [0u8; ACCESS_CODE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode_upper(bytes))
    }

    /// Wraps a code read back from storage
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(normalize(&value.into()))
    }

    /// Compares after trimming and uppercasing the submitted value
    pub fn matches(&self, submitted: &str) -> bool {
        self.0 == normalize(submitted)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn normalize(code: &str) -> String {
    code.trim().to_uppercase()
}

impl fmt::Debug for AccessCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessCode(..)")
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
