// ============================================================================
// Persistence Errors - what an adapter may report to the domain
// ============================================================================
//
// Adapters translate engine errors into these variants. The only signal the
// domain inspects is `UniqueViolation`; anything else is opaque.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// A uniqueness constraint rejected the write
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("row not found")]
    NotFound,

    /// Any other storage fault; the message is for logs only
    #[error("database failure: {0}")]
    Database(String),
}

impl PersistenceError {
    pub fn unique(constraint: impl Into<String>) -> Self {
        Self::UniqueViolation {
            constraint: constraint.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}
