//! Card lifecycle management.
//!
//! The manager owns creation, lookup, listing, deletion, and stats for
//! cards. It never touches credentials; granting effects is the redemption
//! engine's job.

use std::sync::Arc;

use quotacard_core::{
    generate_card_code, Card, CardError, CardId, CardStats, CardStatus, NewCard, Result,
};
use quotacard_store::{Page, Store, StoreError};

/// How many times to regenerate a colliding code before giving up.
///
/// With 32^12 possible codes one retry is already unlikely to be needed.
const MAX_CODE_ATTEMPTS: u32 = 5;

/// Card lifecycle manager.
#[derive(Clone)]
pub struct CardManager {
    store: Arc<dyn Store>,
}

impl CardManager {
    /// Create a new manager over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a single card with a freshly generated code.
    ///
    /// A code collision against the store is retried with a new code; the
    /// existing card is never overwritten.
    ///
    /// # Errors
    ///
    /// Returns `CardError::Validation` for a bad configuration, or a
    /// storage error if the store fails.
    pub fn create_card(&self, config: &NewCard) -> Result<Card> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let card = Card::issue(config, generate_card_code())?;

            match self.store.insert_card(&card) {
                Ok(()) => {
                    tracing::info!(
                        card_id = %card.id,
                        code = %card.code,
                        card_type = card.card_type.as_str(),
                        created_by = %card.created_by,
                        "card created"
                    );
                    return Ok(card);
                }
                Err(StoreError::DuplicateCode { code }) => {
                    tracing::warn!(%code, attempt, "card code collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CardError::Storage(format!(
            "could not generate a unique card code after {MAX_CODE_ATTEMPTS} attempts"
        )))
    }

    /// Create `count` cards from one configuration.
    ///
    /// Each card is an independent `create_card` call; cards created before
    /// a failure remain valid and are reported in the outcome.
    #[must_use]
    pub fn create_cards_batch(&self, config: &NewCard, count: usize) -> BatchOutcome {
        let mut cards = Vec::with_capacity(count);
        let mut failure = None;

        for _ in 0..count {
            match self.create_card(config) {
                Ok(card) => cards.push(card),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        tracing::info!(requested = count, created = cards.len(), "card batch created");

        BatchOutcome {
            requested: count,
            cards,
            failure,
        }
    }

    /// Look up a card by its human-facing code.
    ///
    /// # Errors
    ///
    /// Returns `CardError::NotFound` if no card has this code.
    pub fn get_card_by_code(&self, code: &str) -> Result<Card> {
        self.store
            .get_card_by_code(code)?
            .ok_or_else(|| CardError::not_found("card", code))
    }

    /// Look up a card by id.
    ///
    /// # Errors
    ///
    /// Returns `CardError::NotFound` if the card doesn't exist.
    pub fn get_card_by_id(&self, card_id: &CardId) -> Result<Card> {
        self.store
            .get_card(card_id)?
            .ok_or_else(|| CardError::not_found("card", card_id.to_string()))
    }

    /// List cards, newest first, optionally filtered by status.
    ///
    /// `total` reflects the filtered set size before pagination.
    pub fn list_cards(
        &self,
        status: Option<CardStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Page<Card>> {
        Ok(self.store.list_cards(status, limit, offset)?)
    }

    /// Delete a card that has never been redeemed.
    ///
    /// Cards with history are never deleted, to preserve audit integrity.
    ///
    /// # Errors
    ///
    /// Returns `CardError::NotFound` for an unknown id and
    /// `CardError::InvalidState` for a card that is not `Unused`.
    pub fn delete_card(&self, card_id: &CardId) -> Result<Card> {
        let card = self.store.delete_card(card_id)?;
        tracing::info!(card_id = %card.id, code = %card.code, "card deleted");
        Ok(card)
    }

    /// Per-status card counts.
    pub fn stats(&self) -> Result<CardStats> {
        Ok(self.store.card_stats()?)
    }
}

/// Outcome of a batch creation.
///
/// Batch creation does not roll back: cards created before a failure stay
/// valid, and the caller is told how many succeeded.
#[derive(Debug)]
pub struct BatchOutcome {
    /// How many cards were requested.
    pub requested: usize,
    /// The cards actually created, in creation order.
    pub cards: Vec<Card>,
    /// The error that stopped the batch, if any.
    pub failure: Option<CardError>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotacard_core::{CardType, TimeUnit};
    use quotacard_store::RocksStore;
    use tempfile::TempDir;

    fn manager() -> (CardManager, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (CardManager::new(Arc::new(store)), dir)
    }

    fn quota_config() -> NewCard {
        NewCard {
            card_type: CardType::Quota,
            quota_amount: 100,
            time_amount: 0,
            time_unit: TimeUnit::Days,
            expires_at: None,
            note: "welcome grant".into(),
            created_by: "admin".into(),
        }
    }

    #[test]
    fn created_card_is_fetchable_by_code_and_id() {
        let (manager, _dir) = manager();
        let card = manager.create_card(&quota_config()).unwrap();

        let by_code = manager.get_card_by_code(&card.code).unwrap();
        let by_id = manager.get_card_by_id(&card.id).unwrap();

        assert_eq!(by_code.id, card.id);
        assert_eq!(by_id.code, card.code);
        assert_eq!(by_code.status, CardStatus::Unused);
        assert_eq!(by_code.quota_amount, 100);
        assert_eq!(by_code.note, "welcome grant");
    }

    #[test]
    fn invalid_config_is_rejected() {
        let (manager, _dir) = manager();
        let mut config = quota_config();
        config.quota_amount = 0;

        assert!(matches!(
            manager.create_card(&config),
            Err(CardError::Validation(_))
        ));
        assert_eq!(manager.stats().unwrap().total, 0);
    }

    #[test]
    fn batch_creates_requested_count() {
        let (manager, _dir) = manager();
        let outcome = manager.create_cards_batch(&quota_config(), 10);

        assert_eq!(outcome.requested, 10);
        assert_eq!(outcome.cards.len(), 10);
        assert!(outcome.failure.is_none());

        // Codes are unique across the batch.
        let codes: std::collections::HashSet<_> =
            outcome.cards.iter().map(|c| c.code.clone()).collect();
        assert_eq!(codes.len(), 10);

        assert_eq!(manager.stats().unwrap().unused, 10);
    }

    #[test]
    fn batch_with_invalid_config_creates_nothing() {
        let (manager, _dir) = manager();
        let mut config = quota_config();
        config.quota_amount = -1;

        let outcome = manager.create_cards_batch(&config, 3);
        assert_eq!(outcome.requested, 3);
        assert!(outcome.cards.is_empty());
        assert!(matches!(outcome.failure, Some(CardError::Validation(_))));
    }

    #[test]
    fn unknown_lookups_are_not_found() {
        let (manager, _dir) = manager();

        assert!(matches!(
            manager.get_card_by_code("CC_AAAA_BBBB_CCCC"),
            Err(CardError::NotFound { .. })
        ));
        assert!(matches!(
            manager.get_card_by_id(&CardId::generate()),
            Err(CardError::NotFound { .. })
        ));
    }

    #[test]
    fn delete_removes_card_and_code_lookup() {
        let (manager, _dir) = manager();
        let card = manager.create_card(&quota_config()).unwrap();

        manager.delete_card(&card.id).unwrap();

        assert!(matches!(
            manager.get_card_by_code(&card.code),
            Err(CardError::NotFound { .. })
        ));
        assert_eq!(manager.stats().unwrap().total, 0);
    }

    #[test]
    fn listing_is_newest_first_with_total() {
        let (manager, _dir) = manager();
        for _ in 0..3 {
            manager.create_card(&quota_config()).unwrap();
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let page = manager.list_cards(None, 2, 0).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].created_at >= page.items[1].created_at);

        let filtered = manager
            .list_cards(Some(CardStatus::Redeemed), 10, 0)
            .unwrap();
        assert_eq!(filtered.total, 0);
    }
}
