//! Core types and utilities for quotacard.
//!
//! This crate provides the foundational types used throughout the quotacard
//! platform:
//!
//! - **Identifiers**: `CardId`, `RedemptionId`
//! - **Cards**: `Card`, `CardType`, `CardStatus`, `NewCard`
//! - **Redemptions**: `Redemption`, `RedemptionStatus`
//! - **Codes**: card-code generation and validation
//! - **Credentials**: the `CredentialDirectory` collaborator contract
//!
//! # Quota Unit
//!
//! Quota is tracked as `i64` integer credits. Amounts are never stored as
//! floating point, so grants and deductions round-trip exactly.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod card;
pub mod code;
pub mod credential;
pub mod error;
pub mod ids;
pub mod redemption;

pub use card::{
    Card, CardStats, CardStatus, CardType, NewCard, RedemptionInfo, RevocationInfo, TimeUnit,
};
pub use code::{generate_card_code, is_valid_card_code, CARD_CODE_ALPHABET, CARD_CODE_PREFIX};
pub use credential::{Credential, CredentialDirectory};
pub use error::{CardError, Result};
pub use ids::{CardId, IdError, RedemptionId};
pub use redemption::{Redemption, RedemptionRevocation, RedemptionStatus};
