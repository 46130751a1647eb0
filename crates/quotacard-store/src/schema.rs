//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary card records, keyed by `card_id` (UUID bytes).
    pub const CARDS: &str = "cards";

    /// Index: card code → card id. Value is the card id (16 bytes).
    pub const CARD_CODES: &str = "card_codes";

    /// Index: cards partitioned by status, keyed by
    /// `status_tag (1 byte) || card_id`. Value is empty (index only).
    pub const CARDS_BY_STATUS: &str = "cards_by_status";

    /// Redemption ledger entries, keyed by `redemption_id` (ULID bytes).
    pub const REDEMPTIONS: &str = "redemptions";

    /// Index: redemptions by redeeming user, keyed by
    /// `user_id || 0x00 || redemption_id`. Value is empty (index only).
    pub const REDEMPTIONS_BY_USER: &str = "redemptions_by_user";

    /// Index: redemptions by target credential, keyed by
    /// `api_key_id || 0x00 || redemption_id`. Value is empty (index only).
    pub const REDEMPTIONS_BY_KEY: &str = "redemptions_by_key";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::CARDS,
        cf::CARD_CODES,
        cf::CARDS_BY_STATUS,
        cf::REDEMPTIONS,
        cf::REDEMPTIONS_BY_USER,
        cf::REDEMPTIONS_BY_KEY,
    ]
}
