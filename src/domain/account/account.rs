use chrono::{DateTime, Utc};

use super::value_objects::{Email, HashedPassword, Username};
use crate::domain::ids::AccountId;

// ============================================================================
// Account Entity
// ============================================================================

/// Validated account that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: Username,
    pub password: HashedPassword,
    pub email: Option<Email>,
}

impl NewAccount {
    pub fn new(username: Username, password: HashedPassword) -> Self {
        Self {
            username,
            password,
            email: None,
        }
    }

    pub fn with_email(mut self, email: Email) -> Self {
        self.email = Some(email);
        self
    }
}

/// Persisted account; `id` and `created_at` come from storage
#[derive(Debug, Clone)]
pub struct Account {
    pub id: AccountId,
    pub username: Username,
    pub password: HashedPassword,
    pub email: Option<Email>,
    pub created_at: DateTime<Utc>,
    pub last_access: Option<DateTime<Utc>>,
}

impl Account {
    pub fn update_email(&mut self, email: Email) {
        self.email = Some(email);
    }
}
