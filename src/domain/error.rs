use serde::Serialize;

// ============================================================================
// Error taxonomy shared by every use case
// ============================================================================

/// Coarse class of a domain failure, used by outer layers to pick a
/// response without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input, rejected before any transaction opens
    Validation,
    /// Uniqueness constraint reported by the store
    Conflict,
    NotFound,
    /// Deliberately vague authentication failures
    Credential,
    /// Lifecycle rule violated by the requested transition
    StateConflict,
    Infrastructure,
}
