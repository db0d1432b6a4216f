use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::PlayerError;
use crate::domain::ids::PlayerId;

pub const PLAYER_NAME_MAX_CHARACTERS: usize = 20;

/// In-game name, 1 to 20 characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlayerName(String);

impl PlayerName {
    pub fn parse(value: impl Into<String>) -> Result<Self, PlayerError> {
        let value = value.into();
        let length = value.chars().count();
        if length == 0 || length > PLAYER_NAME_MAX_CHARACTERS {
            return Err(PlayerError::InvalidName {
                max: PLAYER_NAME_MAX_CHARACTERS,
            });
        }
        Ok(Self(value))
    }

    /// Name tried on retry number `retry` after collisions on `base`.
    ///
    /// Retry 0 is `base` itself, retry n is `base_n`. The base is cut short
    /// when the suffix would push the name past the length limit, so the
    /// result only depends on `(base, retry)`.
    pub fn candidate(base: &PlayerName, retry: u32) -> PlayerName {
        if retry == 0 {
            return base.clone();
        }

        let suffix = format!("_{retry}");
        let room = PLAYER_NAME_MAX_CHARACTERS.saturating_sub(suffix.chars().count());
        let stem: String = base.0.chars().take(room).collect();
        PlayerName(format!("{stem}{suffix}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<PlayerName> for String {
    fn from(value: PlayerName) -> Self {
        value.0
    }
}

impl TryFrom<String> for PlayerName {
    type Error = PlayerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Persisted player. The owning account lives only in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: PlayerName,
}
