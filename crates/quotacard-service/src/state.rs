//! Application state.

use std::sync::Arc;

use quotacard_core::CredentialDirectory;
use quotacard_store::Store;

use crate::cards::CardManager;
use crate::config::ServiceConfig;
use crate::redemption::RedemptionEngine;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Card lifecycle manager.
    pub manager: CardManager,

    /// Redemption engine.
    pub engine: RedemptionEngine,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        directory: Arc<dyn CredentialDirectory>,
        config: ServiceConfig,
    ) -> Self {
        if config.admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not configured - administrative endpoints will reject all requests");
        }

        Self {
            manager: CardManager::new(Arc::clone(&store)),
            engine: RedemptionEngine::new(store, directory),
            config,
        }
    }
}
