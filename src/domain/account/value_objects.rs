use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::errors::AccountError;

// ============================================================================
// Account Value Objects
// ============================================================================

pub const USERNAME_MIN_CHARACTERS: usize = 5;
pub const USERNAME_MAX_CHARACTERS: usize = 20;
pub const PASSWORD_MIN_CHARACTERS: usize = 8;
pub const PASSWORD_MAX_CHARACTERS: usize = 72;

/// Login name, 5 to 20 characters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Username(String);

impl Username {
    pub fn parse(value: impl Into<String>) -> Result<Self, AccountError> {
        let value = value.into();
        let length = value.chars().count();
        if !(USERNAME_MIN_CHARACTERS..=USERNAME_MAX_CHARACTERS).contains(&length) {
            return Err(AccountError::InvalidUsername {
                min: USERNAME_MIN_CHARACTERS,
                max: USERNAME_MAX_CHARACTERS,
            });
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Username> for String {
    fn from(value: Username) -> Self {
        value.0
    }
}

impl TryFrom<String> for Username {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

/// Checks a raw password before it is handed to the hasher.
pub fn validate_raw_password(raw: &str) -> Result<(), AccountError> {
    let length = raw.chars().count();
    if !(PASSWORD_MIN_CHARACTERS..=PASSWORD_MAX_CHARACTERS).contains(&length) {
        return Err(AccountError::InvalidPassword {
            min: PASSWORD_MIN_CHARACTERS,
            max: PASSWORD_MAX_CHARACTERS,
        });
    }
    Ok(())
}

/// Output of the password hasher. Opaque: never compared directly.
#[derive(Clone, PartialEq, Eq)]
pub struct HashedPassword(String);

impl HashedPassword {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HashedPassword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HashedPassword(..)")
    }
}

/// Trimmed, lowercased, syntactically valid mail address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_RE.get_or_init(|| {
        // local part: RFC 5322 atext plus dots; domain: dot-separated labels
        let pattern = concat!(
            r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*",
            r"@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?",
            r"(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
        );
        Regex::new(pattern).unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    })
}

impl Email {
    pub fn parse(value: &str) -> Result<Self, AccountError> {
        let trimmed = value.trim();
        if trimmed.len() > 254 || !email_regex().is_match(trimmed) {
            return Err(AccountError::InvalidEmail);
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Email> for String {
    fn from(value: Email) -> Self {
        value.0
    }
}

impl TryFrom<String> for Email {
    type Error = AccountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
