//! The credential-management collaborator contract.
//!
//! Quota limits and expiry deadlines live in an external credential service;
//! the redemption engine only ever mutates them through this trait. The
//! implementation is injected at engine construction, so there is no
//! run-time service lookup, and tests can substitute an in-memory fake.
//!
//! After-values returned by the mutation calls are authoritative: the
//! credential service owns clamping and rounding, and the engine records
//! what it returns rather than recomputing locally.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::TimeUnit;
use crate::error::Result;

/// A credential record as seen by the redemption engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    /// Credential id.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Current quota limit in credits.
    pub quota_limit: i64,

    /// Current expiry deadline. `None` = no expiry.
    pub expires_at: Option<DateTime<Utc>>,

    /// Whether this credential pools usage across underlying accounts.
    /// Only aggregated credentials may receive quota grants.
    pub is_aggregated: bool,
}

/// Mutation and lookup operations on credentials.
#[async_trait]
pub trait CredentialDirectory: Send + Sync {
    /// Fetch a credential by id, or `None` if it does not exist.
    async fn get_credential(&self, id: &str) -> Result<Option<Credential>>;

    /// Raise the credential's quota limit by `amount` credits.
    ///
    /// Returns the new quota limit.
    async fn increase_quota_limit(&self, id: &str, amount: i64) -> Result<i64>;

    /// Lower the credential's quota limit by up to `amount` credits.
    ///
    /// Returns the amount actually deducted, which may be less than
    /// requested if the service clamps at zero.
    async fn deduct_quota_limit(&self, id: &str, amount: i64) -> Result<i64>;

    /// Push the credential's expiry out by `amount` `unit`s.
    ///
    /// Returns the new expiry deadline.
    async fn extend_expiry(&self, id: &str, amount: i64, unit: TimeUnit)
        -> Result<DateTime<Utc>>;
}
