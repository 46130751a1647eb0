//! Error types for quotacard.

/// Result type for quotacard operations.
pub type Result<T> = std::result::Result<T, CardError>;

/// Errors that can occur in card and redemption operations.
///
/// All variants are surfaced to the caller verbatim; nothing here is
/// silently recovered or retried by the core.
#[derive(Debug, thiserror::Error)]
pub enum CardError {
    /// Bad card configuration (missing or invalid amounts or type).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown code, id, redemption, or credential.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of thing was looked up.
        entity: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// Wrong status for the requested transition.
    #[error("invalid state: expected {expected}, card/redemption is {actual}")]
    InvalidState {
        /// Status the transition requires.
        expected: String,
        /// Status actually observed.
        actual: String,
    },

    /// Card past its validity window.
    #[error("card has expired: {code}")]
    Expired {
        /// The expired card's code.
        code: String,
    },

    /// Non-aggregated credential used for a quota/combo card.
    #[error("not eligible: {0}")]
    NotEligible(String),

    /// The credential service call failed.
    #[error("credential directory error: {0}")]
    Directory(String),

    /// Storage failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl CardError {
    /// Shorthand for a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Shorthand for an `InvalidState` error.
    #[must_use]
    pub fn invalid_state(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::InvalidState {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
