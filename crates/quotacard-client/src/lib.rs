//! Credential-service client for quotacard.
//!
//! This crate provides the HTTP client through which the redemption engine
//! reads and mutates credentials. It implements
//! [`quotacard_core::CredentialDirectory`], so the engine never knows it is
//! talking over the network.
//!
//! # Example
//!
//! ```no_run
//! use quotacard_client::CredentialServiceClient;
//!
//! # async fn example() -> Result<(), quotacard_client::ClientError> {
//! let client = CredentialServiceClient::new(
//!     "http://credentials.platform.svc:8080",
//!     "your-service-api-key",
//! )?;
//!
//! let credential = client.fetch_credential("key-123").await?;
//! if let Some(credential) = credential {
//!     println!("quota limit: {}", credential.quota_limit);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::CredentialServiceClient;
pub use error::ClientError;
pub use types::*;
