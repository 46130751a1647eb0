//! Redemption ledger types.
//!
//! A `Redemption` is the durable record of applying one card to one
//! credential. Records are immutable except for the single `Active` →
//! `Revoked` transition; they are never deleted, so the ledger stays
//! auditable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::card::{Card, CardType, RedemptionInfo, TimeUnit};
use crate::ids::{CardId, RedemptionId};

/// A ledger entry recording one card redemption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
    /// Unique ledger entry id. ULIDs sort by creation time.
    pub id: RedemptionId,

    /// The redeemed card.
    pub card_id: CardId,

    /// Card code at redemption time (denormalized snapshot).
    pub card_code: String,

    /// Card type at redemption time (denormalized snapshot).
    pub card_type: CardType,

    /// Id of the redeeming user.
    pub user_id: String,

    /// Username of the redeeming user, if known.
    pub username: String,

    /// Target credential id.
    pub api_key_id: String,

    /// Target credential name at redemption time.
    pub api_key_name: String,

    /// Quota credits actually applied.
    pub quota_added: i64,

    /// Time amount actually applied.
    pub time_added: i64,

    /// Unit for `time_added`.
    pub time_unit: TimeUnit,

    /// Credential quota limit before the grant.
    pub before_quota: i64,

    /// Credential quota limit after the grant, as returned by the
    /// credential service.
    pub after_quota: i64,

    /// Credential expiry before the grant. `None` = no expiry.
    pub before_expiry: Option<DateTime<Utc>>,

    /// Credential expiry after the grant, as returned by the credential
    /// service.
    pub after_expiry: Option<DateTime<Utc>>,

    /// When the redemption happened.
    pub timestamp: DateTime<Utc>,

    /// Whether the redemption still stands.
    pub status: RedemptionStatus,

    /// Revocation details. Present iff status is Revoked.
    pub revocation: Option<RedemptionRevocation>,
}

impl Redemption {
    /// Build the ledger entry for a card claimed by `info`, with before/after
    /// snapshots captured from the credential service.
    #[must_use]
    pub fn record(
        card: &Card,
        info: &RedemptionInfo,
        before_quota: i64,
        after_quota: i64,
        before_expiry: Option<DateTime<Utc>>,
        after_expiry: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: RedemptionId::generate(),
            card_id: card.id,
            card_code: card.code.clone(),
            card_type: card.card_type,
            user_id: info.user_id.clone(),
            username: info.username.clone(),
            api_key_id: info.api_key_id.clone(),
            api_key_name: info.api_key_name.clone(),
            quota_added: card.quota_effect(),
            time_added: card.time_effect(),
            time_unit: card.time_unit,
            before_quota,
            after_quota,
            before_expiry,
            after_expiry,
            timestamp: info.redeemed_at,
            status: RedemptionStatus::Active,
            revocation: None,
        }
    }
}

/// Whether a redemption still stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    /// The grant is in effect.
    Active,
    /// The grant was reversed. Terminal.
    Revoked,
}

impl RedemptionStatus {
    /// The status name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }
}

impl std::fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Revocation details on a ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionRevocation {
    /// When the redemption was revoked.
    pub revoked_at: DateTime<Utc>,

    /// Who revoked it.
    pub revoked_by: String,

    /// Why it was revoked.
    pub reason: String,

    /// Quota credits actually clawed back. May be less than `quota_added`
    /// when the credential service clamps the deduction.
    pub actual_quota_deducted: i64,
}
