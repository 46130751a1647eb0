//! Wire types for the credential-service API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quotacard_core::TimeUnit;

/// Request body for quota increase and deduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaChangeRequest {
    /// Credits to add or remove.
    pub amount: i64,
}

/// Response to a quota increase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaIncreaseResponse {
    /// Quota limit after the increase.
    pub quota_limit: i64,
}

/// Response to a quota deduction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaDeductResponse {
    /// Credits actually removed; may be less than requested if the
    /// service clamps at zero.
    pub deducted: i64,
}

/// Request body for an expiry extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendExpiryRequest {
    /// How much time to add.
    pub amount: i64,
    /// Unit for `amount`.
    pub unit: TimeUnit,
}

/// Response to an expiry extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendExpiryResponse {
    /// Expiry deadline after the extension.
    pub expires_at: DateTime<Utc>,
}

/// Error response envelope returned by the credential service.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    /// The error payload.
    pub error: ErrorBody,
}

/// Error payload returned by the credential service.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
}
