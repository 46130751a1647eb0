//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in
//! column families.

use quotacard_core::{CardId, CardStatus, RedemptionId};

/// Separator between a variable-length subject id and the fixed-length
/// redemption id in index keys. User and credential ids never contain NUL.
const SUBJECT_SEPARATOR: u8 = 0;

/// Create a card key from a card id.
#[must_use]
pub fn card_key(card_id: &CardId) -> Vec<u8> {
    card_id.as_bytes().to_vec()
}

/// Create a code-index key from a card code.
#[must_use]
pub fn code_key(code: &str) -> Vec<u8> {
    code.as_bytes().to_vec()
}

/// Single-byte tag for a card status, used as an index key prefix.
#[must_use]
pub const fn status_tag(status: CardStatus) -> u8 {
    match status {
        CardStatus::Unused => 0,
        CardStatus::Redeemed => 1,
        CardStatus::Revoked => 2,
        CardStatus::Expired => 3,
    }
}

/// Create a status-index key.
///
/// Format: `status_tag (1 byte) || card_id (16 bytes)`
#[must_use]
pub fn card_status_key(status: CardStatus, card_id: &CardId) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.push(status_tag(status));
    key.extend_from_slice(card_id.as_bytes());
    key
}

/// Create a prefix for iterating all cards in one status.
#[must_use]
pub fn card_status_prefix(status: CardStatus) -> Vec<u8> {
    vec![status_tag(status)]
}

/// Extract the card id from a status-index key.
///
/// # Panics
///
/// Panics if the key is not 17 bytes.
#[must_use]
pub fn extract_card_id_from_status_key(key: &[u8]) -> CardId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[1..17]);
    CardId::from_bytes(bytes)
}

/// Create a redemption key from a redemption id.
///
/// ULID bytes sort by creation time, so the ledger iterates chronologically.
#[must_use]
pub fn redemption_key(redemption_id: &RedemptionId) -> Vec<u8> {
    redemption_id.to_bytes().to_vec()
}

/// Create a subject-index key for a redemption.
///
/// Format: `subject_id || 0x00 || redemption_id (16 bytes)`
///
/// The separator keeps `user-1` from matching keys under `user-10`.
#[must_use]
pub fn subject_redemption_key(subject: &str, redemption_id: &RedemptionId) -> Vec<u8> {
    let mut key = Vec::with_capacity(subject.len() + 1 + 16);
    key.extend_from_slice(subject.as_bytes());
    key.push(SUBJECT_SEPARATOR);
    key.extend_from_slice(&redemption_id.to_bytes());
    key
}

/// Create a prefix for iterating all redemptions for one subject.
#[must_use]
pub fn subject_prefix(subject: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(subject.len() + 1);
    prefix.extend_from_slice(subject.as_bytes());
    prefix.push(SUBJECT_SEPARATOR);
    prefix
}

/// Extract the redemption id from a subject-index key.
///
/// # Panics
///
/// Panics if the key is shorter than 16 bytes.
#[must_use]
pub fn extract_redemption_id_from_subject_key(key: &[u8]) -> RedemptionId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[key.len() - 16..]);
    RedemptionId::from_bytes(bytes).expect("valid ULID bytes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn card_key_length() {
        let card_id = CardId::generate();
        assert_eq!(card_key(&card_id).len(), 16);
    }

    #[test]
    fn status_tags_are_distinct() {
        let tags: std::collections::HashSet<u8> =
            CardStatus::ALL.iter().map(|s| status_tag(*s)).collect();
        assert_eq!(tags.len(), 4);
    }

    #[test]
    fn card_status_key_format() {
        let card_id = CardId::generate();
        let key = card_status_key(CardStatus::Redeemed, &card_id);

        assert_eq!(key.len(), 17);
        assert_eq!(key[0], status_tag(CardStatus::Redeemed));
        assert_eq!(&key[1..], card_id.as_bytes());
        assert_eq!(extract_card_id_from_status_key(&key), card_id);
    }

    #[test]
    fn subject_key_roundtrip() {
        let redemption_id = RedemptionId::generate();
        let key = subject_redemption_key("user-1", &redemption_id);

        assert!(key.starts_with(&subject_prefix("user-1")));
        assert_eq!(extract_redemption_id_from_subject_key(&key), redemption_id);
    }

    #[test]
    fn subject_prefix_does_not_match_longer_subject() {
        let redemption_id = RedemptionId::generate();
        let key = subject_redemption_key("user-10", &redemption_id);
        assert!(!key.starts_with(&subject_prefix("user-1")));
    }
}
