//! Credential-service API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use quotacard_core::{CardError, Credential, CredentialDirectory, TimeUnit};

use crate::error::ClientError;
use crate::types::{
    ErrorResponse, ExtendExpiryRequest, ExtendExpiryResponse, QuotaChangeRequest,
    QuotaDeductResponse, QuotaIncreaseResponse,
};

/// Default request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for the credential-management service.
#[derive(Debug, Clone)]
pub struct CredentialServiceClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CredentialServiceClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Credential service URL (e.g. `"http://localhost:8080"`)
    /// * `api_key` - Service API key sent as a bearer token
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the HTTP client cannot be
    /// built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// Fetch a credential by id. Returns `None` on 404.
    pub async fn fetch_credential(&self, id: &str) -> Result<Option<Credential>, ClientError> {
        let url = format!("{}/v1/credentials/{id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Self::handle_response::<Credential>(response).await.map(Some)
    }

    /// Raise a credential's quota limit. Returns the new limit.
    pub async fn add_quota(&self, id: &str, amount: i64) -> Result<i64, ClientError> {
        let url = format!("{}/v1/credentials/{id}/quota/increase", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&QuotaChangeRequest { amount })
            .send()
            .await?;

        Self::handle_response::<QuotaIncreaseResponse>(response)
            .await
            .map(|r| r.quota_limit)
    }

    /// Lower a credential's quota limit by up to `amount`. Returns the
    /// amount actually deducted.
    pub async fn remove_quota(&self, id: &str, amount: i64) -> Result<i64, ClientError> {
        let url = format!("{}/v1/credentials/{id}/quota/deduct", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&QuotaChangeRequest { amount })
            .send()
            .await?;

        Self::handle_response::<QuotaDeductResponse>(response)
            .await
            .map(|r| r.deducted)
    }

    /// Push a credential's expiry out. Returns the new deadline.
    pub async fn push_expiry(
        &self,
        id: &str,
        amount: i64,
        unit: TimeUnit,
    ) -> Result<DateTime<Utc>, ClientError> {
        let url = format!("{}/v1/credentials/{id}/expiry/extend", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ExtendExpiryRequest { amount, unit })
            .send()
            .await?;

        Self::handle_response::<ExtendExpiryResponse>(response)
            .await
            .map(|r| r.expires_at)
    }

    /// Decode a success body, or map an error response to `ClientError::Api`.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let message = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, "credential service returned an error");
        match serde_json::from_str::<ErrorResponse>(&message) {
            Ok(body) => Err(ClientError::Api {
                code: body.error.code,
                message: body.error.message,
                status: status.as_u16(),
            }),
            Err(_) => Err(ClientError::Api {
                code: "unknown".into(),
                message,
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl CredentialDirectory for CredentialServiceClient {
    async fn get_credential(&self, id: &str) -> quotacard_core::Result<Option<Credential>> {
        self.fetch_credential(id).await.map_err(CardError::from)
    }

    async fn increase_quota_limit(&self, id: &str, amount: i64) -> quotacard_core::Result<i64> {
        self.add_quota(id, amount).await.map_err(CardError::from)
    }

    async fn deduct_quota_limit(&self, id: &str, amount: i64) -> quotacard_core::Result<i64> {
        self.remove_quota(id, amount).await.map_err(CardError::from)
    }

    async fn extend_expiry(
        &self,
        id: &str,
        amount: i64,
        unit: TimeUnit,
    ) -> quotacard_core::Result<DateTime<Utc>> {
        self.push_expiry(id, amount, unit)
            .await
            .map_err(CardError::from)
    }
}
