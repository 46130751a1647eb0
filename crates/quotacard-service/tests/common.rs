//! Common test utilities for quotacard integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum_test::TestServer;
use chrono::{DateTime, Duration, Months, Utc};
use tempfile::TempDir;

use quotacard_core::{CardError, Credential, CredentialDirectory, Result, TimeUnit};
use quotacard_service::{create_router, AppState, ServiceConfig};
use quotacard_store::RocksStore;

/// The admin key integration tests authenticate with.
pub const ADMIN_KEY: &str = "test-admin-key";

/// In-memory credential directory standing in for the credential service.
#[derive(Default)]
pub struct TestDirectory {
    credentials: Mutex<HashMap<String, Credential>>,
}

impl TestDirectory {
    /// Register a credential.
    pub fn insert(&self, credential: Credential) {
        self.credentials
            .lock()
            .unwrap()
            .insert(credential.id.clone(), credential);
    }

    /// Current quota limit of a credential.
    pub fn quota_limit(&self, id: &str) -> i64 {
        self.credentials.lock().unwrap()[id].quota_limit
    }
}

#[async_trait]
impl CredentialDirectory for TestDirectory {
    async fn get_credential(&self, id: &str) -> Result<Option<Credential>> {
        Ok(self.credentials.lock().unwrap().get(id).cloned())
    }

    async fn increase_quota_limit(&self, id: &str, amount: i64) -> Result<i64> {
        let mut credentials = self.credentials.lock().unwrap();
        let credential = credentials
            .get_mut(id)
            .ok_or_else(|| CardError::not_found("credential", id))?;
        credential.quota_limit += amount;
        Ok(credential.quota_limit)
    }

    async fn deduct_quota_limit(&self, id: &str, amount: i64) -> Result<i64> {
        let mut credentials = self.credentials.lock().unwrap();
        let credential = credentials
            .get_mut(id)
            .ok_or_else(|| CardError::not_found("credential", id))?;
        let deducted = amount.min(credential.quota_limit);
        credential.quota_limit -= deducted;
        Ok(deducted)
    }

    async fn extend_expiry(&self, id: &str, amount: i64, unit: TimeUnit) -> Result<DateTime<Utc>> {
        let mut credentials = self.credentials.lock().unwrap();
        let credential = credentials
            .get_mut(id)
            .ok_or_else(|| CardError::not_found("credential", id))?;

        let now = Utc::now();
        let base = credential.expires_at.filter(|t| *t > now).unwrap_or(now);
        let extended = match unit {
            TimeUnit::Hours => base + Duration::hours(amount),
            TimeUnit::Days => base + Duration::days(amount),
            TimeUnit::Months => base + Months::new(u32::try_from(amount).unwrap()),
        };
        credential.expires_at = Some(extended);
        Ok(extended)
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The in-memory credential directory.
    pub directory: Arc<TestDirectory>,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = Arc::new(RocksStore::open(temp_dir.path()).expect("Failed to open store"));
        let directory = Arc::new(TestDirectory::default());

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            admin_api_key: Some(ADMIN_KEY.into()),
            credential_api_url: "http://localhost:0".into(),
            credential_api_key: String::new(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        };

        let state = AppState::new(store, Arc::clone(&directory) as _, config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            directory,
            _temp_dir: temp_dir,
        }
    }

    /// Register an aggregated credential with the given quota limit.
    pub fn seed_credential(&self, id: &str, quota_limit: i64, is_aggregated: bool) {
        self.directory.insert(Credential {
            id: id.into(),
            name: format!("{id}-name"),
            quota_limit,
            expires_at: None,
            is_aggregated,
        });
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
