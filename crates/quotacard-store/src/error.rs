//! Error types for quotacard storage.

use quotacard_core::{CardStatus, RedemptionStatus};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// What kind of record was looked up.
        entity: &'static str,
        /// The identifier that missed.
        id: String,
    },

    /// A card with this code already exists.
    #[error("duplicate card code: {code}")]
    DuplicateCode {
        /// The colliding code.
        code: String,
    },

    /// Conditional card transition failed: the card was not in the
    /// expected status.
    #[error("card status conflict: expected {expected}, found {actual}")]
    CardStatusConflict {
        /// Status the transition requires.
        expected: CardStatus,
        /// Status actually stored.
        actual: CardStatus,
    },

    /// Conditional redemption transition failed: the record was not in the
    /// expected status.
    #[error("redemption status conflict: expected {expected}, found {actual}")]
    RedemptionStatusConflict {
        /// Status the transition requires.
        expected: RedemptionStatus,
        /// Status actually stored.
        actual: RedemptionStatus,
    },
}

impl From<StoreError> for quotacard_core::CardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound { entity, id },
            StoreError::CardStatusConflict { expected, actual } => Self::InvalidState {
                expected: expected.to_string(),
                actual: actual.to_string(),
            },
            StoreError::RedemptionStatusConflict { expected, actual } => Self::InvalidState {
                expected: expected.to_string(),
                actual: actual.to_string(),
            },
            StoreError::DuplicateCode { code } => {
                Self::Storage(format!("duplicate card code: {code}"))
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Storage(msg),
        }
    }
}
