//! Card types for quotacard.
//!
//! A card is a single-use grant token for quota and/or time, identified by a
//! human-facing code. Cards move through a small state machine:
//!
//! ```text
//! Unused --redeem--> Redeemed --revoke--> Revoked
//! Unused --expiry detected--> Expired
//! ```
//!
//! `Expired` and `Revoked` are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CardError;
use crate::ids::CardId;

/// A prepaid card granting quota and/or a time extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    /// Unique card id, generated at creation.
    pub id: CardId,

    /// Human-facing code, `CC_XXXX_XXXX_XXXX`.
    pub code: String,

    /// What the card grants.
    pub card_type: CardType,

    /// Quota credits granted on redemption. Zero for time-only cards.
    pub quota_amount: i64,

    /// Time amount granted on redemption. Zero for quota-only cards.
    pub time_amount: i64,

    /// Unit for `time_amount`.
    pub time_unit: TimeUnit,

    /// Current lifecycle state.
    pub status: CardStatus,

    /// Validity deadline for the card itself. `None` = never expires.
    ///
    /// Distinct from the time extension a `Time`/`Combo` card grants.
    pub expires_at: Option<DateTime<Utc>>,

    /// Who created the card.
    pub created_by: String,

    /// When the card was created.
    pub created_at: DateTime<Utc>,

    /// Free-form operator note.
    pub note: String,

    /// Redemption provenance. Populated iff status is Redeemed or Revoked.
    pub redemption: Option<RedemptionInfo>,

    /// Revocation provenance. Populated iff status is Revoked.
    pub revocation: Option<RevocationInfo>,
}

impl Card {
    /// Issue a new card from a validated configuration and a generated code.
    ///
    /// # Errors
    ///
    /// Returns `CardError::Validation` if the configuration is invalid.
    pub fn issue(config: &NewCard, code: String) -> Result<Self, CardError> {
        config.validate()?;

        Ok(Self {
            id: CardId::generate(),
            code,
            card_type: config.card_type,
            quota_amount: config.quota_amount,
            time_amount: config.time_amount,
            time_unit: config.time_unit,
            status: CardStatus::Unused,
            expires_at: config.expires_at,
            created_by: config.created_by.clone(),
            created_at: Utc::now(),
            note: config.note.clone(),
            redemption: None,
            revocation: None,
        })
    }

    /// Quota credits this card applies on redemption.
    ///
    /// Zero for time-only cards regardless of the stored amount.
    #[must_use]
    pub const fn quota_effect(&self) -> i64 {
        match self.card_type {
            CardType::Time => 0,
            CardType::Quota | CardType::Combo => self.quota_amount,
        }
    }

    /// Time amount this card applies on redemption.
    ///
    /// Zero for quota-only cards regardless of the stored amount.
    #[must_use]
    pub const fn time_effect(&self) -> i64 {
        match self.card_type {
            CardType::Quota => 0,
            CardType::Time | CardType::Combo => self.time_amount,
        }
    }

    /// Whether the card's own validity window has passed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline < now)
    }
}

/// What a card grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    /// Quota credits only.
    Quota,

    /// Time extension only.
    Time,

    /// Both quota credits and a time extension.
    Combo,
}

impl CardType {
    /// The type name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Quota => "quota",
            Self::Time => "time",
            Self::Combo => "combo",
        }
    }
}

/// Unit for a card's time extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    /// Hours.
    Hours,
    /// Days.
    #[default]
    Days,
    /// Calendar months.
    Months,
}

impl TimeUnit {
    /// The unit name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Hours => "hours",
            Self::Days => "days",
            Self::Months => "months",
        }
    }
}

/// Lifecycle state of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    /// Issued, never redeemed.
    Unused,
    /// Redeemed onto a credential.
    Redeemed,
    /// Redemption was reversed. Terminal.
    Revoked,
    /// Validity window passed before redemption. Terminal.
    Expired,
}

impl CardStatus {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Unused, Self::Redeemed, Self::Revoked, Self::Expired];

    /// The status name as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unused => "unused",
            Self::Redeemed => "redeemed",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for CardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Redemption provenance recorded on a card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionInfo {
    /// Id of the redeeming user.
    pub user_id: String,
    /// Username of the redeeming user, if known.
    pub username: String,
    /// Target credential id.
    pub api_key_id: String,
    /// Target credential name at redemption time.
    pub api_key_name: String,
    /// When the card was redeemed.
    pub redeemed_at: DateTime<Utc>,
}

/// Revocation provenance recorded on a card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationInfo {
    /// When the redemption was revoked.
    pub revoked_at: DateTime<Utc>,
    /// Who revoked it.
    pub revoked_by: String,
    /// Why it was revoked.
    pub reason: String,
}

/// Configuration for creating a card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCard {
    /// What the card grants.
    pub card_type: CardType,

    /// Quota credits. Must be positive for Quota/Combo.
    #[serde(default)]
    pub quota_amount: i64,

    /// Time amount. Must be positive for Time/Combo.
    #[serde(default)]
    pub time_amount: i64,

    /// Unit for `time_amount`.
    #[serde(default)]
    pub time_unit: TimeUnit,

    /// Optional validity deadline for the card itself.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    /// Free-form operator note.
    #[serde(default)]
    pub note: String,

    /// Who is creating the card.
    pub created_by: String,
}

impl NewCard {
    /// Check the type/amount rules.
    ///
    /// # Errors
    ///
    /// Returns `CardError::Validation` if a required amount is missing or
    /// not positive.
    pub fn validate(&self) -> Result<(), CardError> {
        match self.card_type {
            CardType::Quota | CardType::Combo if self.quota_amount <= 0 => {
                return Err(CardError::Validation(format!(
                    "quota_amount must be positive for {} cards",
                    self.card_type.as_str()
                )));
            }
            _ => {}
        }

        match self.card_type {
            CardType::Time | CardType::Combo if self.time_amount <= 0 => {
                return Err(CardError::Validation(format!(
                    "time_amount must be positive for {} cards",
                    self.card_type.as_str()
                )));
            }
            _ => {}
        }

        Ok(())
    }
}

/// Per-status card counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStats {
    /// Total cards across all states.
    pub total: u64,
    /// Cards never redeemed.
    pub unused: u64,
    /// Cards redeemed onto a credential.
    pub redeemed: u64,
    /// Cards whose redemption was reversed.
    pub revoked: u64,
    /// Cards that expired before redemption.
    pub expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quota_config() -> NewCard {
        NewCard {
            card_type: CardType::Quota,
            quota_amount: 100,
            time_amount: 0,
            time_unit: TimeUnit::Days,
            expires_at: None,
            note: String::new(),
            created_by: "admin".into(),
        }
    }

    #[test]
    fn issue_starts_unused() {
        let card = Card::issue(&quota_config(), "CC_AAAA_BBBB_CCCC".into()).unwrap();
        assert_eq!(card.status, CardStatus::Unused);
        assert!(card.redemption.is_none());
        assert!(card.revocation.is_none());
    }

    #[test]
    fn quota_card_requires_positive_quota() {
        let mut config = quota_config();
        config.quota_amount = 0;
        assert!(matches!(
            Card::issue(&config, "CC_AAAA_BBBB_CCCC".into()),
            Err(CardError::Validation(_))
        ));
    }

    #[test]
    fn combo_card_requires_both_amounts() {
        let config = NewCard {
            card_type: CardType::Combo,
            quota_amount: 100,
            time_amount: 0,
            time_unit: TimeUnit::Days,
            expires_at: None,
            note: String::new(),
            created_by: "admin".into(),
        };
        assert!(matches!(config.validate(), Err(CardError::Validation(_))));
    }

    #[test]
    fn time_card_ignores_quota_amount() {
        let config = NewCard {
            card_type: CardType::Time,
            quota_amount: 999,
            time_amount: 30,
            time_unit: TimeUnit::Days,
            expires_at: None,
            note: String::new(),
            created_by: "admin".into(),
        };
        let card = Card::issue(&config, "CC_AAAA_BBBB_CCCC".into()).unwrap();
        assert_eq!(card.quota_effect(), 0);
        assert_eq!(card.time_effect(), 30);
    }

    #[test]
    fn combo_card_applies_both_effects() {
        let config = NewCard {
            card_type: CardType::Combo,
            quota_amount: 100,
            time_amount: 7,
            time_unit: TimeUnit::Days,
            expires_at: None,
            note: String::new(),
            created_by: "admin".into(),
        };
        let card = Card::issue(&config, "CC_AAAA_BBBB_CCCC".into()).unwrap();
        assert_eq!(card.quota_effect(), 100);
        assert_eq!(card.time_effect(), 7);
    }

    #[test]
    fn expiry_check_respects_deadline() {
        let now = Utc::now();
        let mut card = Card::issue(&quota_config(), "CC_AAAA_BBBB_CCCC".into()).unwrap();
        assert!(!card.is_expired_at(now));

        card.expires_at = Some(now - chrono::Duration::hours(1));
        assert!(card.is_expired_at(now));

        card.expires_at = Some(now + chrono::Duration::hours(1));
        assert!(!card.is_expired_at(now));
    }
}
