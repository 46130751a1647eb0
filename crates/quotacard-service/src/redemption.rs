//! The redemption engine.
//!
//! Redemption applies a card's effects to a credential and writes the
//! ledger entry; revocation reverses the quota effect and terminally
//! invalidates the card. The engine owns the card state machine:
//!
//! ```text
//! Unused --redeem--> Redeemed --revoke--> Revoked
//! Unused --expiry detected--> Expired
//! ```
//!
//! The `Unused` → `Redeemed` claim is the first durable write of a
//! redemption, before any credential mutation. Concurrent redemptions of
//! the same code race on that conditional transition and at most one wins;
//! a crash after the claim leaves a redeemed card with no ledger entry,
//! which is detectable and reportable rather than double-payable.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use quotacard_core::{
    Card, CardError, CardStatus, CardType, CredentialDirectory, Redemption, RedemptionId,
    RedemptionInfo, RedemptionRevocation, RedemptionStatus, Result, RevocationInfo, TimeUnit,
};
use quotacard_store::{CardTransition, Page, RedemptionFilter, Store, StoreError};

/// Orchestrates redemption and revocation.
#[derive(Clone)]
pub struct RedemptionEngine {
    store: Arc<dyn Store>,
    directory: Arc<dyn CredentialDirectory>,
}

impl RedemptionEngine {
    /// Create a new engine over a store and a credential directory.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, directory: Arc<dyn CredentialDirectory>) -> Self {
        Self { store, directory }
    }

    /// Redeem a card onto a credential.
    ///
    /// # Errors
    ///
    /// - `CardError::NotFound` for an unknown code or credential.
    /// - `CardError::InvalidState` if the card is not `Unused` (including
    ///   losing a concurrent redemption race).
    /// - `CardError::Expired` if the card's validity window has passed;
    ///   the card transitions to `Expired` as a side effect.
    /// - `CardError::NotEligible` if a quota/combo card targets a
    ///   non-aggregated credential.
    /// - `CardError::Directory` if a credential mutation fails after the
    ///   card was claimed; the card stays `Redeemed` with no ledger entry.
    pub async fn redeem_card(
        &self,
        code: &str,
        api_key_id: &str,
        user_id: &str,
        username: &str,
    ) -> Result<RedemptionOutcome> {
        let card = self
            .store
            .get_card_by_code(code)?
            .ok_or_else(|| CardError::not_found("card", code))?;

        if card.status != CardStatus::Unused {
            return Err(CardError::invalid_state(
                CardStatus::Unused.as_str(),
                card.status.as_str(),
            ));
        }

        let now = Utc::now();
        if card.is_expired_at(now) {
            self.expire_card(&card)?;
            return Err(CardError::Expired { code: card.code });
        }

        let credential = self
            .directory
            .get_credential(api_key_id)
            .await?
            .ok_or_else(|| CardError::not_found("credential", api_key_id))?;

        // Quota grants only make sense on credentials that pool usage;
        // time-only cards bypass the check.
        if card.card_type != CardType::Time && !credential.is_aggregated {
            return Err(CardError::NotEligible(
                "only aggregated credentials can redeem quota cards".into(),
            ));
        }

        let before_quota = credential.quota_limit;
        let before_expiry = credential.expires_at;

        // Claim the card before touching the credential. This conditional
        // transition is what closes the concurrent-redemption race: losers
        // observe `Redeemed` and fail, and the effects below run at most
        // once per card.
        let info = RedemptionInfo {
            user_id: user_id.to_string(),
            username: username.to_string(),
            api_key_id: api_key_id.to_string(),
            api_key_name: credential.name.clone(),
            redeemed_at: now,
        };
        let card = self
            .store
            .transition_card(&card.id, CardTransition::Redeem(info.clone()))?;

        let (after_quota, after_expiry) = self
            .apply_effects(&card, api_key_id, before_quota, before_expiry)
            .await?;

        let redemption =
            Redemption::record(&card, &info, before_quota, after_quota, before_expiry, after_expiry);
        self.store.insert_redemption(&redemption)?;

        tracing::info!(
            redemption_id = %redemption.id,
            code = %card.code,
            api_key_id = %api_key_id,
            user_id = %user_id,
            quota_added = redemption.quota_added,
            time_added = redemption.time_added,
            "card redeemed"
        );

        Ok(RedemptionOutcome {
            redemption_id: redemption.id,
            card_code: redemption.card_code,
            card_type: redemption.card_type,
            quota_added: redemption.quota_added,
            time_added: redemption.time_added,
            time_unit: redemption.time_unit,
            before_quota,
            after_quota,
            before_expiry,
            after_expiry,
        })
    }

    /// Reverse a redemption's quota effect and invalidate its card.
    ///
    /// Time extensions already granted are retained; only quota is clawed
    /// back, clamped by the credential service at whatever is still
    /// deductible.
    ///
    /// # Errors
    ///
    /// - `CardError::NotFound` for an unknown redemption id.
    /// - `CardError::InvalidState` if the redemption is already revoked.
    /// - `CardError::Directory` if the quota deduction fails.
    pub async fn revoke_redemption(
        &self,
        redemption_id: &RedemptionId,
        revoked_by: &str,
        reason: &str,
    ) -> Result<RevocationOutcome> {
        let redemption = self
            .store
            .get_redemption(redemption_id)?
            .ok_or_else(|| CardError::not_found("redemption", redemption_id.to_string()))?;

        if redemption.status != RedemptionStatus::Active {
            return Err(CardError::invalid_state(
                RedemptionStatus::Active.as_str(),
                redemption.status.as_str(),
            ));
        }

        let mut actual_quota_deducted = 0;
        if redemption.quota_added > 0 {
            actual_quota_deducted = self
                .directory
                .deduct_quota_limit(&redemption.api_key_id, redemption.quota_added)
                .await?;
        }

        let now = Utc::now();
        let redemption = self.store.revoke_redemption(
            redemption_id,
            RedemptionRevocation {
                revoked_at: now,
                revoked_by: revoked_by.to_string(),
                reason: reason.to_string(),
                actual_quota_deducted,
            },
        )?;

        // The card is terminally invalidated as well, even though only the
        // redemption's effect was undone.
        self.store.transition_card(
            &redemption.card_id,
            CardTransition::Revoke(RevocationInfo {
                revoked_at: now,
                revoked_by: revoked_by.to_string(),
                reason: reason.to_string(),
            }),
        )?;

        tracing::info!(
            redemption_id = %redemption.id,
            code = %redemption.card_code,
            revoked_by = %revoked_by,
            actual_quota_deducted,
            "redemption revoked"
        );

        Ok(RevocationOutcome {
            redemption_id: redemption.id,
            card_code: redemption.card_code,
            actual_quota_deducted,
            reason: reason.to_string(),
        })
    }

    /// List ledger entries, newest first.
    pub fn list_redemptions(
        &self,
        filter: &RedemptionFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Page<Redemption>> {
        Ok(self.store.list_redemptions(filter, limit, offset)?)
    }

    /// Transition a card whose validity window passed to `Expired`.
    ///
    /// Losing this transition to a concurrent caller is fine: the card is
    /// expired either way.
    fn expire_card(&self, card: &Card) -> Result<()> {
        match self.store.transition_card(&card.id, CardTransition::Expire) {
            Ok(_) => {
                tracing::info!(code = %card.code, "card expired on redemption attempt");
                Ok(())
            }
            Err(StoreError::CardStatusConflict { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply card effects in fixed order: quota first, then time.
    ///
    /// After-values come from the credential service, which owns clamping
    /// and rounding; they are recorded, not recomputed.
    async fn apply_effects(
        &self,
        card: &Card,
        api_key_id: &str,
        before_quota: i64,
        before_expiry: Option<DateTime<Utc>>,
    ) -> Result<(i64, Option<DateTime<Utc>>)> {
        let mut after_quota = before_quota;
        let mut after_expiry = before_expiry;

        if card.quota_effect() > 0 {
            after_quota = self
                .directory
                .increase_quota_limit(api_key_id, card.quota_effect())
                .await
                .map_err(|e| Self::effect_failure(card, &e))?;
        }

        if card.time_effect() > 0 {
            after_expiry = Some(
                self.directory
                    .extend_expiry(api_key_id, card.time_effect(), card.time_unit)
                    .await
                    .map_err(|e| Self::effect_failure(card, &e))?,
            );
        }

        Ok((after_quota, after_expiry))
    }

    /// Log a credential mutation failing after the card was claimed.
    fn effect_failure(card: &Card, error: &CardError) -> CardError {
        tracing::error!(
            code = %card.code,
            error = %error,
            "credential mutation failed after claim; card stays redeemed without a ledger entry"
        );
        CardError::Directory(error.to_string())
    }
}

/// Result of a successful redemption.
#[derive(Debug, Clone)]
pub struct RedemptionOutcome {
    /// The new ledger entry's id.
    pub redemption_id: RedemptionId,
    /// The redeemed card's code.
    pub card_code: String,
    /// The redeemed card's type.
    pub card_type: CardType,
    /// Quota credits applied.
    pub quota_added: i64,
    /// Time amount applied.
    pub time_added: i64,
    /// Unit for `time_added`.
    pub time_unit: TimeUnit,
    /// Credential quota before the grant.
    pub before_quota: i64,
    /// Credential quota after the grant.
    pub after_quota: i64,
    /// Credential expiry before the grant.
    pub before_expiry: Option<DateTime<Utc>>,
    /// Credential expiry after the grant.
    pub after_expiry: Option<DateTime<Utc>>,
}

/// Result of a successful revocation.
#[derive(Debug, Clone)]
pub struct RevocationOutcome {
    /// The revoked ledger entry's id.
    pub redemption_id: RedemptionId,
    /// The card whose redemption was reversed.
    pub card_code: String,
    /// Quota credits actually clawed back (possibly clamped).
    pub actual_quota_deducted: i64,
    /// The recorded reason.
    pub reason: String,
}
