//! Redemption and revocation handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quotacard_core::{CardType, Redemption, RedemptionId, RedemptionRevocation, RedemptionStatus, TimeUnit};
use quotacard_store::RedemptionFilter;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::redemption::RedemptionOutcome;
use crate::state::AppState;

/// Redeem request.
#[derive(Debug, Deserialize)]
pub struct RedeemRequest {
    /// The card code to redeem.
    pub code: String,
    /// Target credential id.
    pub api_key_id: String,
    /// Id of the redeeming user.
    pub user_id: String,
    /// Username of the redeeming user.
    #[serde(default)]
    pub username: String,
}

/// Redemption response.
#[derive(Debug, Serialize)]
pub struct RedeemResponse {
    /// The new ledger entry's id.
    pub redemption_id: String,
    /// The redeemed card's code.
    pub card_code: String,
    /// The redeemed card's type.
    pub card_type: CardType,
    /// Quota credits applied.
    pub quota_added: i64,
    /// Time amount applied.
    pub time_added: i64,
    /// Unit for `time_added`.
    pub time_unit: TimeUnit,
    /// Credential quota before the grant.
    pub before_quota: i64,
    /// Credential quota after the grant.
    pub after_quota: i64,
    /// Credential expiry before the grant.
    pub before_expiry: Option<DateTime<Utc>>,
    /// Credential expiry after the grant.
    pub after_expiry: Option<DateTime<Utc>>,
}

impl From<RedemptionOutcome> for RedeemResponse {
    fn from(outcome: RedemptionOutcome) -> Self {
        Self {
            redemption_id: outcome.redemption_id.to_string(),
            card_code: outcome.card_code,
            card_type: outcome.card_type,
            quota_added: outcome.quota_added,
            time_added: outcome.time_added,
            time_unit: outcome.time_unit,
            before_quota: outcome.before_quota,
            after_quota: outcome.after_quota,
            before_expiry: outcome.before_expiry,
            after_expiry: outcome.after_expiry,
        }
    }
}

/// Redeem a card onto a credential.
pub async fn redeem_card(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Json(body): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>, ApiError> {
    let outcome = state
        .engine
        .redeem_card(&body.code, &body.api_key_id, &body.user_id, &body.username)
        .await?;
    Ok(Json(RedeemResponse::from(outcome)))
}

/// Revoke request.
#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    /// The revoking actor.
    pub revoked_by: String,
    /// Why the redemption is being revoked.
    #[serde(default)]
    pub reason: String,
}

/// Revocation response.
#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    /// The revoked ledger entry's id.
    pub redemption_id: String,
    /// The card whose redemption was reversed.
    pub card_code: String,
    /// Quota credits actually clawed back (possibly clamped).
    pub actual_quota_deducted: i64,
    /// The recorded reason.
    pub reason: String,
}

/// Revoke an active redemption.
pub async fn revoke_redemption(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(id): Path<String>,
    Json(body): Json<RevokeRequest>,
) -> Result<Json<RevokeResponse>, ApiError> {
    let redemption_id: RedemptionId = id
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid redemption id: {id}")))?;

    let outcome = state
        .engine
        .revoke_redemption(&redemption_id, &body.revoked_by, &body.reason)
        .await?;

    Ok(Json(RevokeResponse {
        redemption_id: outcome.redemption_id.to_string(),
        card_code: outcome.card_code,
        actual_quota_deducted: outcome.actual_quota_deducted,
        reason: outcome.reason,
    }))
}

/// List redemptions query. At most one of the two filters may be set.
#[derive(Debug, Deserialize)]
pub struct ListRedemptionsQuery {
    /// Filter by redeeming user.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Filter by target credential.
    #[serde(default)]
    pub api_key_id: Option<String>,
    /// Page size (max 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Page offset.
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// A ledger entry as returned by the API.
#[derive(Debug, Serialize)]
pub struct RedemptionResponse {
    /// Ledger entry id.
    pub id: String,
    /// The redeemed card's id.
    pub card_id: String,
    /// Card code at redemption time.
    pub card_code: String,
    /// Card type at redemption time.
    pub card_type: CardType,
    /// Id of the redeeming user.
    pub user_id: String,
    /// Username of the redeeming user.
    pub username: String,
    /// Target credential id.
    pub api_key_id: String,
    /// Target credential name at redemption time.
    pub api_key_name: String,
    /// Quota credits applied.
    pub quota_added: i64,
    /// Time amount applied.
    pub time_added: i64,
    /// Unit for `time_added`.
    pub time_unit: TimeUnit,
    /// Credential quota before the grant.
    pub before_quota: i64,
    /// Credential quota after the grant.
    pub after_quota: i64,
    /// Credential expiry before the grant.
    pub before_expiry: Option<DateTime<Utc>>,
    /// Credential expiry after the grant.
    pub after_expiry: Option<DateTime<Utc>>,
    /// When the redemption happened.
    pub timestamp: DateTime<Utc>,
    /// Whether the redemption still stands.
    pub status: RedemptionStatus,
    /// Revocation details, if revoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RedemptionRevocation>,
}

impl From<&Redemption> for RedemptionResponse {
    fn from(redemption: &Redemption) -> Self {
        Self {
            id: redemption.id.to_string(),
            card_id: redemption.card_id.to_string(),
            card_code: redemption.card_code.clone(),
            card_type: redemption.card_type,
            user_id: redemption.user_id.clone(),
            username: redemption.username.clone(),
            api_key_id: redemption.api_key_id.clone(),
            api_key_name: redemption.api_key_name.clone(),
            quota_added: redemption.quota_added,
            time_added: redemption.time_added,
            time_unit: redemption.time_unit,
            before_quota: redemption.before_quota,
            after_quota: redemption.after_quota,
            before_expiry: redemption.before_expiry,
            after_expiry: redemption.after_expiry,
            timestamp: redemption.timestamp,
            status: redemption.status,
            revocation: redemption.revocation.clone(),
        }
    }
}

/// Redemption list response.
#[derive(Debug, Serialize)]
pub struct RedemptionListResponse {
    /// Ledger entries on this page, newest first.
    pub redemptions: Vec<RedemptionResponse>,
    /// Total entries matching the filter.
    pub total: usize,
    /// Applied page size.
    pub limit: usize,
    /// Applied page offset.
    pub offset: usize,
}

/// List ledger entries, newest first.
pub async fn list_redemptions(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Query(query): Query<ListRedemptionsQuery>,
) -> Result<Json<RedemptionListResponse>, ApiError> {
    let filter = match (query.user_id, query.api_key_id) {
        (Some(_), Some(_)) => {
            return Err(ApiError::BadRequest(
                "user_id and api_key_id are mutually exclusive filters".into(),
            ));
        }
        (Some(user_id), None) => RedemptionFilter::User(user_id),
        (None, Some(api_key_id)) => RedemptionFilter::ApiKey(api_key_id),
        (None, None) => RedemptionFilter::All,
    };

    let limit = query.limit.min(100);
    let page = state.engine.list_redemptions(&filter, limit, query.offset)?;

    Ok(Json(RedemptionListResponse {
        redemptions: page.items.iter().map(RedemptionResponse::from).collect(),
        total: page.total,
        limit,
        offset: query.offset,
    }))
}
