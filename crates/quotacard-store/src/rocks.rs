//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store`
//! trait. Conditional status transitions are serialized through an internal
//! mutex so the compare step and the batch write cannot interleave with
//! another writer; plain reads take no lock.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, IteratorMode, MultiThreaded,
    Options, WriteBatch,
};

use quotacard_core::{
    Card, CardId, CardStats, CardStatus, Redemption, RedemptionId, RedemptionRevocation,
    RedemptionStatus,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{sort_cards_for_listing, CardTransition, Page, RedemptionFilter, Store};

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    /// Serializes conditional writes (transitions, inserts, deletes) so a
    /// compare step and its batch cannot interleave with another writer.
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tracing::debug!(
            column_families = all_column_families().len(),
            "opened RocksDB store"
        );

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn lock_writes(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch a card or fail with `NotFound`.
    fn require_card(&self, card_id: &CardId) -> Result<Card> {
        self.get_card(card_id)?.ok_or_else(|| StoreError::NotFound {
            entity: "card",
            id: card_id.to_string(),
        })
    }

    /// Collect card ids currently in one status set.
    fn card_ids_with_status(&self, status: CardStatus) -> Result<Vec<CardId>> {
        let cf_status = self.cf(cf::CARDS_BY_STATUS)?;
        let prefix = keys::card_status_prefix(status);

        let iter = self.db.iterator_cf(
            &cf_status,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            ids.push(keys::extract_card_id_from_status_key(&key));
        }

        Ok(ids)
    }

    /// Collect redemption ids matching a filter, oldest first.
    fn redemption_ids(&self, filter: &RedemptionFilter) -> Result<Vec<RedemptionId>> {
        match filter {
            RedemptionFilter::All => {
                let cf_redemptions = self.cf(cf::REDEMPTIONS)?;
                let iter = self.db.iterator_cf(&cf_redemptions, IteratorMode::Start);

                let mut ids = Vec::new();
                for item in iter {
                    let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
                    let mut bytes = [0u8; 16];
                    bytes.copy_from_slice(&key[..16]);
                    ids.push(RedemptionId::from_bytes(bytes).expect("valid ULID bytes"));
                }
                Ok(ids)
            }
            RedemptionFilter::User(user_id) => {
                self.subject_redemption_ids(cf::REDEMPTIONS_BY_USER, user_id)
            }
            RedemptionFilter::ApiKey(api_key_id) => {
                self.subject_redemption_ids(cf::REDEMPTIONS_BY_KEY, api_key_id)
            }
        }
    }

    fn subject_redemption_ids(&self, cf_name: &str, subject: &str) -> Result<Vec<RedemptionId>> {
        let cf_index = self.cf(cf_name)?;
        let prefix = keys::subject_prefix(subject);

        let iter = self.db.iterator_cf(
            &cf_index,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        let mut ids = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }
            ids.push(keys::extract_redemption_id_from_subject_key(&key));
        }

        Ok(ids)
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Card Operations
    // =========================================================================

    fn insert_card(&self, card: &Card) -> Result<()> {
        let cf_cards = self.cf(cf::CARDS)?;
        let cf_codes = self.cf(cf::CARD_CODES)?;
        let cf_status = self.cf(cf::CARDS_BY_STATUS)?;

        let code_key = keys::code_key(&card.code);
        let value = Self::serialize(card)?;

        let _guard = self.lock_writes();

        // Never overwrite an existing code mapping, however unlikely the
        // collision.
        let taken = self
            .db
            .get_cf(&cf_codes, &code_key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if taken {
            return Err(StoreError::DuplicateCode {
                code: card.code.clone(),
            });
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_cards, keys::card_key(&card.id), &value);
        batch.put_cf(&cf_codes, &code_key, card.id.as_bytes());
        batch.put_cf(&cf_status, keys::card_status_key(card.status, &card.id), []);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_card(&self, card_id: &CardId) -> Result<Option<Card>> {
        let cf_cards = self.cf(cf::CARDS)?;

        self.db
            .get_cf(&cf_cards, keys::card_key(card_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn get_card_by_code(&self, code: &str) -> Result<Option<Card>> {
        let cf_codes = self.cf(cf::CARD_CODES)?;

        let Some(id_bytes) = self
            .db
            .get_cf(&cf_codes, keys::code_key(code))
            .map_err(|e| StoreError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&id_bytes[..16]);
        self.get_card(&CardId::from_bytes(bytes))
    }

    fn delete_card(&self, card_id: &CardId) -> Result<Card> {
        let cf_cards = self.cf(cf::CARDS)?;
        let cf_codes = self.cf(cf::CARD_CODES)?;
        let cf_status = self.cf(cf::CARDS_BY_STATUS)?;

        let _guard = self.lock_writes();

        let card = self.require_card(card_id)?;
        if card.status != CardStatus::Unused {
            return Err(StoreError::CardStatusConflict {
                expected: CardStatus::Unused,
                actual: card.status,
            });
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_cards, keys::card_key(card_id));
        batch.delete_cf(&cf_codes, keys::code_key(&card.code));
        batch.delete_cf(&cf_status, keys::card_status_key(card.status, card_id));

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(card)
    }

    fn transition_card(&self, card_id: &CardId, transition: CardTransition) -> Result<Card> {
        let cf_cards = self.cf(cf::CARDS)?;
        let cf_status = self.cf(cf::CARDS_BY_STATUS)?;

        let _guard = self.lock_writes();

        let mut card = self.require_card(card_id)?;
        if card.status != transition.expected() {
            return Err(StoreError::CardStatusConflict {
                expected: transition.expected(),
                actual: card.status,
            });
        }

        let old_status_key = keys::card_status_key(card.status, card_id);
        transition.apply(&mut card);
        let value = Self::serialize(&card)?;

        // The record write and the index move are one atomic unit: no
        // reader can observe the card in two status sets, or in neither.
        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_cards, keys::card_key(card_id), &value);
        batch.delete_cf(&cf_status, old_status_key);
        batch.put_cf(&cf_status, keys::card_status_key(card.status, card_id), []);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(card)
    }

    fn list_cards(
        &self,
        status: Option<CardStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Page<Card>> {
        let mut cards = match status {
            Some(status) => {
                let ids = self.card_ids_with_status(status)?;
                let mut cards = Vec::with_capacity(ids.len());
                for id in ids {
                    if let Some(card) = self.get_card(&id)? {
                        cards.push(card);
                    }
                }
                cards
            }
            None => {
                let cf_cards = self.cf(cf::CARDS)?;
                let iter = self.db.iterator_cf(&cf_cards, IteratorMode::Start);

                let mut cards = Vec::new();
                for item in iter {
                    let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
                    cards.push(Self::deserialize(&value)?);
                }
                cards
            }
        };

        sort_cards_for_listing(&mut cards);

        let total = cards.len();
        let items = cards.into_iter().skip(offset).take(limit).collect();

        Ok(Page { items, total })
    }

    fn card_stats(&self) -> Result<CardStats> {
        let count = |status| -> Result<u64> {
            Ok(self.card_ids_with_status(status)?.len() as u64)
        };

        let unused = count(CardStatus::Unused)?;
        let redeemed = count(CardStatus::Redeemed)?;
        let revoked = count(CardStatus::Revoked)?;
        let expired = count(CardStatus::Expired)?;

        Ok(CardStats {
            total: unused + redeemed + revoked + expired,
            unused,
            redeemed,
            revoked,
            expired,
        })
    }

    // =========================================================================
    // Redemption Ledger Operations
    // =========================================================================

    fn insert_redemption(&self, redemption: &Redemption) -> Result<()> {
        let cf_redemptions = self.cf(cf::REDEMPTIONS)?;
        let cf_by_user = self.cf(cf::REDEMPTIONS_BY_USER)?;
        let cf_by_key = self.cf(cf::REDEMPTIONS_BY_KEY)?;

        let value = Self::serialize(redemption)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_redemptions, keys::redemption_key(&redemption.id), &value);
        batch.put_cf(
            &cf_by_user,
            keys::subject_redemption_key(&redemption.user_id, &redemption.id),
            [],
        );
        batch.put_cf(
            &cf_by_key,
            keys::subject_redemption_key(&redemption.api_key_id, &redemption.id),
            [],
        );

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn get_redemption(&self, redemption_id: &RedemptionId) -> Result<Option<Redemption>> {
        let cf_redemptions = self.cf(cf::REDEMPTIONS)?;

        self.db
            .get_cf(&cf_redemptions, keys::redemption_key(redemption_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn revoke_redemption(
        &self,
        redemption_id: &RedemptionId,
        revocation: RedemptionRevocation,
    ) -> Result<Redemption> {
        let cf_redemptions = self.cf(cf::REDEMPTIONS)?;

        let _guard = self.lock_writes();

        let mut redemption =
            self.get_redemption(redemption_id)?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "redemption",
                    id: redemption_id.to_string(),
                })?;

        if redemption.status != RedemptionStatus::Active {
            return Err(StoreError::RedemptionStatusConflict {
                expected: RedemptionStatus::Active,
                actual: redemption.status,
            });
        }

        redemption.status = RedemptionStatus::Revoked;
        redemption.revocation = Some(revocation);

        let value = Self::serialize(&redemption)?;
        self.db
            .put_cf(&cf_redemptions, keys::redemption_key(redemption_id), value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(redemption)
    }

    fn list_redemptions(
        &self,
        filter: &RedemptionFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Page<Redemption>> {
        // ULID keys iterate oldest first; reverse for newest first.
        let mut ids = self.redemption_ids(filter)?;
        ids.reverse();

        let total = ids.len();
        let mut items = Vec::new();
        for id in ids.into_iter().skip(offset).take(limit) {
            if let Some(redemption) = self.get_redemption(&id)? {
                items.push(redemption);
            }
        }

        Ok(Page { items, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quotacard_core::{
        generate_card_code, CardType, NewCard, RedemptionInfo, RevocationInfo, TimeUnit,
    };
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn quota_card() -> Card {
        let config = NewCard {
            card_type: CardType::Quota,
            quota_amount: 100,
            time_amount: 0,
            time_unit: TimeUnit::Days,
            expires_at: None,
            note: String::new(),
            created_by: "admin".into(),
        };
        Card::issue(&config, generate_card_code()).unwrap()
    }

    fn redemption_info() -> RedemptionInfo {
        RedemptionInfo {
            user_id: "user-1".into(),
            username: "alice".into(),
            api_key_id: "key-1".into(),
            api_key_name: "pool".into(),
            redeemed_at: Utc::now(),
        }
    }

    fn ledger_entry(card: &Card, user_id: &str, api_key_id: &str) -> Redemption {
        let mut info = redemption_info();
        info.user_id = user_id.into();
        info.api_key_id = api_key_id.into();
        Redemption::record(card, &info, 0, card.quota_effect(), None, None)
    }

    #[test]
    fn card_roundtrip_by_id_and_code() {
        let (store, _dir) = create_test_store();
        let card = quota_card();

        store.insert_card(&card).unwrap();

        let by_id = store.get_card(&card.id).unwrap().unwrap();
        let by_code = store.get_card_by_code(&card.code).unwrap().unwrap();
        assert_eq!(by_id.id, card.id);
        assert_eq!(by_code.id, card.id);
        assert_eq!(by_id.status, CardStatus::Unused);
    }

    #[test]
    fn insert_rejects_duplicate_code() {
        let (store, _dir) = create_test_store();
        let card = quota_card();
        store.insert_card(&card).unwrap();

        let mut clash = quota_card();
        clash.code.clone_from(&card.code);

        let result = store.insert_card(&clash);
        assert!(matches!(result, Err(StoreError::DuplicateCode { .. })));

        // The original card is untouched.
        let stored = store.get_card_by_code(&card.code).unwrap().unwrap();
        assert_eq!(stored.id, card.id);
    }

    #[test]
    fn transition_moves_card_between_status_sets() {
        let (store, _dir) = create_test_store();
        let card = quota_card();
        store.insert_card(&card).unwrap();

        let redeemed = store
            .transition_card(&card.id, CardTransition::Redeem(redemption_info()))
            .unwrap();
        assert_eq!(redeemed.status, CardStatus::Redeemed);
        assert!(redeemed.redemption.is_some());

        let stats = store.card_stats().unwrap();
        assert_eq!(stats.unused, 0);
        assert_eq!(stats.redeemed, 1);
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn transition_conflict_reports_actual_status() {
        let (store, _dir) = create_test_store();
        let card = quota_card();
        store.insert_card(&card).unwrap();

        store
            .transition_card(&card.id, CardTransition::Redeem(redemption_info()))
            .unwrap();

        // A second redeem must lose and see the post-transition state.
        let result = store.transition_card(&card.id, CardTransition::Redeem(redemption_info()));
        assert!(matches!(
            result,
            Err(StoreError::CardStatusConflict {
                expected: CardStatus::Unused,
                actual: CardStatus::Redeemed,
            })
        ));
    }

    #[test]
    fn revoke_transition_requires_redeemed() {
        let (store, _dir) = create_test_store();
        let card = quota_card();
        store.insert_card(&card).unwrap();

        let revocation = RevocationInfo {
            revoked_at: Utc::now(),
            revoked_by: "admin".into(),
            reason: "test".into(),
        };
        let result = store.transition_card(&card.id, CardTransition::Revoke(revocation));
        assert!(matches!(
            result,
            Err(StoreError::CardStatusConflict {
                expected: CardStatus::Redeemed,
                actual: CardStatus::Unused,
            })
        ));
    }

    #[test]
    fn delete_only_while_unused_and_removes_all_indices() {
        let (store, _dir) = create_test_store();
        let card = quota_card();
        store.insert_card(&card).unwrap();

        let deleted = store.delete_card(&card.id).unwrap();
        assert_eq!(deleted.id, card.id);

        assert!(store.get_card(&card.id).unwrap().is_none());
        assert!(store.get_card_by_code(&card.code).unwrap().is_none());
        let stats = store.card_stats().unwrap();
        assert_eq!(stats.total, 0);

        // A redeemed card cannot be deleted.
        let other = quota_card();
        store.insert_card(&other).unwrap();
        store
            .transition_card(&other.id, CardTransition::Redeem(redemption_info()))
            .unwrap();
        let result = store.delete_card(&other.id);
        assert!(matches!(
            result,
            Err(StoreError::CardStatusConflict { .. })
        ));
    }

    #[test]
    fn delete_missing_card_not_found() {
        let (store, _dir) = create_test_store();
        let result = store.delete_card(&CardId::generate());
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn list_cards_sorted_and_paginated() {
        let (store, _dir) = create_test_store();

        let mut cards = Vec::new();
        for _ in 0..5 {
            let card = quota_card();
            store.insert_card(&card).unwrap();
            cards.push(card);
            std::thread::sleep(std::time::Duration::from_millis(2));
        }

        let page = store.list_cards(None, 10, 0).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 5);
        // Newest first.
        assert_eq!(page.items[0].id, cards[4].id);
        assert_eq!(page.items[4].id, cards[0].id);

        let page = store.list_cards(None, 2, 2).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].id, cards[2].id);

        // Status filter counts before pagination.
        store
            .transition_card(&cards[0].id, CardTransition::Redeem(redemption_info()))
            .unwrap();
        let unused = store.list_cards(Some(CardStatus::Unused), 100, 0).unwrap();
        assert_eq!(unused.total, 4);
        let redeemed = store
            .list_cards(Some(CardStatus::Redeemed), 100, 0)
            .unwrap();
        assert_eq!(redeemed.total, 1);
        assert_eq!(redeemed.items[0].id, cards[0].id);
    }

    #[test]
    fn stats_equal_per_status_listing_counts() {
        let (store, _dir) = create_test_store();

        for _ in 0..3 {
            store.insert_card(&quota_card()).unwrap();
        }
        let card = quota_card();
        store.insert_card(&card).unwrap();
        store
            .transition_card(&card.id, CardTransition::Redeem(redemption_info()))
            .unwrap();

        let stats = store.card_stats().unwrap();
        assert_eq!(stats.total, stats.unused + stats.redeemed + stats.revoked + stats.expired);
        assert_eq!(stats.total, 4);
        assert_eq!(
            stats.unused as usize,
            store.list_cards(Some(CardStatus::Unused), 100, 0).unwrap().total
        );
        assert_eq!(
            stats.redeemed as usize,
            store.list_cards(Some(CardStatus::Redeemed), 100, 0).unwrap().total
        );
    }

    #[test]
    fn redemption_roundtrip_and_filters() {
        let (store, _dir) = create_test_store();

        let card_a = quota_card();
        let card_b = quota_card();
        store.insert_card(&card_a).unwrap();
        store.insert_card(&card_b).unwrap();

        let first = ledger_entry(&card_a, "user-1", "key-1");
        store.insert_redemption(&first).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = ledger_entry(&card_b, "user-2", "key-1");
        store.insert_redemption(&second).unwrap();

        let fetched = store.get_redemption(&first.id).unwrap().unwrap();
        assert_eq!(fetched.card_id, card_a.id);

        // Global listing, newest first.
        let all = store.list_redemptions(&RedemptionFilter::All, 10, 0).unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.items[0].id, second.id);
        assert_eq!(all.items[1].id, first.id);

        // User filter.
        let user = store
            .list_redemptions(&RedemptionFilter::User("user-1".into()), 10, 0)
            .unwrap();
        assert_eq!(user.total, 1);
        assert_eq!(user.items[0].id, first.id);

        // Credential filter sees both.
        let key = store
            .list_redemptions(&RedemptionFilter::ApiKey("key-1".into()), 10, 0)
            .unwrap();
        assert_eq!(key.total, 2);

        // Pagination against the filtered total.
        let page = store
            .list_redemptions(&RedemptionFilter::ApiKey("key-1".into()), 1, 1)
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, first.id);
    }

    #[test]
    fn revoke_redemption_is_single_shot() {
        let (store, _dir) = create_test_store();
        let card = quota_card();
        store.insert_card(&card).unwrap();

        let entry = ledger_entry(&card, "user-1", "key-1");
        store.insert_redemption(&entry).unwrap();

        let revocation = RedemptionRevocation {
            revoked_at: Utc::now(),
            revoked_by: "admin".into(),
            reason: "mistake".into(),
            actual_quota_deducted: 80,
        };
        let revoked = store.revoke_redemption(&entry.id, revocation.clone()).unwrap();
        assert_eq!(revoked.status, RedemptionStatus::Revoked);
        assert_eq!(
            revoked.revocation.as_ref().unwrap().actual_quota_deducted,
            80
        );

        let again = store.revoke_redemption(&entry.id, revocation);
        assert!(matches!(
            again,
            Err(StoreError::RedemptionStatusConflict {
                expected: RedemptionStatus::Active,
                actual: RedemptionStatus::Revoked,
            })
        ));
    }

    #[test]
    fn revoke_missing_redemption_not_found() {
        let (store, _dir) = create_test_store();
        let revocation = RedemptionRevocation {
            revoked_at: Utc::now(),
            revoked_by: "admin".into(),
            reason: String::new(),
            actual_quota_deducted: 0,
        };
        let result = store.revoke_redemption(&RedemptionId::generate(), revocation);
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }
}
