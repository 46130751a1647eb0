//! Quotacard HTTP API Service.
//!
//! This crate provides the HTTP API for the quotacard service, including:
//!
//! - Card lifecycle management (create, batch create, list, delete, stats)
//! - Card redemption against credentials
//! - Redemption revocation and ledger queries
//!
//! The redemption engine talks to the external credential-management
//! service through the [`quotacard_core::CredentialDirectory`] trait,
//! injected at startup.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers are async for routing consistency

pub mod auth;
pub mod cards;
pub mod config;
pub mod error;
pub mod handlers;
pub mod redemption;
pub mod routes;
pub mod state;

pub use cards::{BatchOutcome, CardManager};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use redemption::{RedemptionEngine, RedemptionOutcome, RevocationOutcome};
pub use routes::create_router;
pub use state::AppState;
