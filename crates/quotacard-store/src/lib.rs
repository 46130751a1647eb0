//! `RocksDB` storage layer for quotacard.
//!
//! This crate persists card records and the redemption ledger using
//! `RocksDB` with column families for efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `cards`: Primary card records, keyed by `card_id`
//! - `card_codes`: Index mapping card codes to card ids
//! - `cards_by_status`: Index partitioning card ids by status
//! - `redemptions`: Ledger entries, keyed by `redemption_id` (ULID)
//! - `redemptions_by_user` / `redemptions_by_key`: Subject indices
//!
//! Every mutation writes the record and all affected index entries in a
//! single `WriteBatch`, so indices cannot drift from the records they
//! derive from. Status changes go through conditional transitions that
//! compare the stored status first and fail with a typed conflict error if
//! another writer got there first.
//!
//! # Example
//!
//! ```no_run
//! use quotacard_store::{RocksStore, Store};
//! use quotacard_core::{Card, NewCard, CardType, TimeUnit, generate_card_code};
//!
//! let store = RocksStore::open("/tmp/quotacard-db").unwrap();
//!
//! let config = NewCard {
//!     card_type: CardType::Quota,
//!     quota_amount: 100,
//!     time_amount: 0,
//!     time_unit: TimeUnit::Days,
//!     expires_at: None,
//!     note: String::new(),
//!     created_by: "admin".into(),
//! };
//! let card = Card::issue(&config, generate_card_code()).unwrap();
//! store.insert_card(&card).unwrap();
//!
//! let found = store.get_card_by_code(&card.code).unwrap();
//! assert!(found.is_some());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use quotacard_core::{
    Card, CardId, CardStats, CardStatus, Redemption, RedemptionId, RedemptionInfo,
    RedemptionRevocation, RevocationInfo,
};

/// A page of records plus the total matching count before pagination.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// The records on this page.
    pub items: Vec<T>,
    /// Total records matching the filter, ignoring limit/offset.
    pub total: usize,
}

/// A conditional card status transition.
///
/// Each variant names its target state and carries the provenance recorded
/// alongside it; the expected source state is implied by the state machine,
/// so callers cannot request an edge that does not exist.
#[derive(Debug, Clone)]
pub enum CardTransition {
    /// `Unused` → `Expired` (lazy expiry detection).
    Expire,

    /// `Unused` → `Redeemed` with redemption provenance.
    Redeem(RedemptionInfo),

    /// `Redeemed` → `Revoked` with revocation provenance.
    Revoke(RevocationInfo),
}

impl CardTransition {
    /// The status the card must currently hold.
    #[must_use]
    pub const fn expected(&self) -> CardStatus {
        match self {
            Self::Expire | Self::Redeem(_) => CardStatus::Unused,
            Self::Revoke(_) => CardStatus::Redeemed,
        }
    }

    /// The status the card moves to.
    #[must_use]
    pub const fn target(&self) -> CardStatus {
        match self {
            Self::Expire => CardStatus::Expired,
            Self::Redeem(_) => CardStatus::Redeemed,
            Self::Revoke(_) => CardStatus::Revoked,
        }
    }

    /// Apply the transition to a card record.
    fn apply(self, card: &mut Card) {
        card.status = self.target();
        match self {
            Self::Expire => {}
            Self::Redeem(info) => card.redemption = Some(info),
            Self::Revoke(info) => card.revocation = Some(info),
        }
    }
}

/// Which slice of the redemption ledger to list.
#[derive(Debug, Clone)]
pub enum RedemptionFilter {
    /// Every ledger entry.
    All,
    /// Entries for one redeeming user.
    User(String),
    /// Entries for one target credential.
    ApiKey(String),
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different
/// implementations (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Card Operations
    // =========================================================================

    /// Insert a freshly issued card and register it in the code and status
    /// indices.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DuplicateCode` if the code is already mapped to
    /// another card; the existing card is never overwritten.
    fn insert_card(&self, card: &Card) -> Result<()>;

    /// Get a card by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_card(&self, card_id: &CardId) -> Result<Option<Card>>;

    /// Get a card by its human-facing code.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_card_by_code(&self, code: &str) -> Result<Option<Card>>;

    /// Delete a card that has never been redeemed.
    ///
    /// Removes the record, the code mapping, and the status index entry in
    /// one atomic batch, and returns the deleted card.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the card doesn't exist.
    /// - `StoreError::CardStatusConflict` if the card is not `Unused`;
    ///   cards with history are never deleted.
    fn delete_card(&self, card_id: &CardId) -> Result<Card>;

    /// Conditionally transition a card's status.
    ///
    /// Compares the stored status against the transition's expected status
    /// and, on match, writes the updated record and moves the card between
    /// status index sets in one atomic batch. At most one of several
    /// concurrent callers can win a given transition.
    ///
    /// Returns the card after the transition.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the card doesn't exist.
    /// - `StoreError::CardStatusConflict` if another writer moved the card
    ///   first; the error carries the status actually observed.
    fn transition_card(&self, card_id: &CardId, transition: CardTransition) -> Result<Card>;

    /// List cards, optionally filtered by status, sorted by creation time
    /// descending (ties broken by id for determinism).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_cards(
        &self,
        status: Option<CardStatus>,
        limit: usize,
        offset: usize,
    ) -> Result<Page<Card>>;

    /// Per-status card counts from the status index cardinalities.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn card_stats(&self) -> Result<CardStats>;

    // =========================================================================
    // Redemption Ledger Operations
    // =========================================================================

    /// Insert a ledger entry and register it in the user and credential
    /// indices.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn insert_redemption(&self, redemption: &Redemption) -> Result<()>;

    /// Get a ledger entry by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_redemption(&self, redemption_id: &RedemptionId) -> Result<Option<Redemption>>;

    /// Conditionally mark an `Active` ledger entry `Revoked`.
    ///
    /// Returns the record after the transition. The entry itself is never
    /// deleted.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the record doesn't exist.
    /// - `StoreError::RedemptionStatusConflict` if it is already revoked.
    fn revoke_redemption(
        &self,
        redemption_id: &RedemptionId,
        revocation: RedemptionRevocation,
    ) -> Result<Redemption>;

    /// List ledger entries matching a filter, newest first.
    ///
    /// ULID keys make "newest first" a reverse key scan; no secondary sort
    /// is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_redemptions(
        &self,
        filter: &RedemptionFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Page<Redemption>>;
}

/// Sort cards for listing: newest first, ties broken by id.
pub(crate) fn sort_cards_for_listing(cards: &mut [Card]) {
    cards.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.as_bytes().cmp(b.id.as_bytes()))
    });
}
