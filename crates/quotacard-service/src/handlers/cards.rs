//! Card lifecycle handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quotacard_core::{
    Card, CardId, CardStats, CardStatus, CardType, NewCard, RedemptionInfo, RevocationInfo,
    TimeUnit,
};

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Hard cap on batch size per request.
const MAX_BATCH_COUNT: usize = 1000;

/// Card response.
#[derive(Debug, Serialize)]
pub struct CardResponse {
    /// Card id.
    pub id: String,
    /// Human-facing code.
    pub code: String,
    /// What the card grants.
    pub card_type: CardType,
    /// Quota credits granted on redemption.
    pub quota_amount: i64,
    /// Time amount granted on redemption.
    pub time_amount: i64,
    /// Unit for `time_amount`.
    pub time_unit: TimeUnit,
    /// Current lifecycle state.
    pub status: CardStatus,
    /// Validity deadline for the card itself.
    pub expires_at: Option<DateTime<Utc>>,
    /// Who created the card.
    pub created_by: String,
    /// When the card was created.
    pub created_at: DateTime<Utc>,
    /// Free-form operator note.
    pub note: String,
    /// Redemption provenance, if redeemed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redemption: Option<RedemptionInfo>,
    /// Revocation provenance, if revoked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationInfo>,
}

impl From<&Card> for CardResponse {
    fn from(card: &Card) -> Self {
        Self {
            id: card.id.to_string(),
            code: card.code.clone(),
            card_type: card.card_type,
            quota_amount: card.quota_amount,
            time_amount: card.time_amount,
            time_unit: card.time_unit,
            status: card.status,
            expires_at: card.expires_at,
            created_by: card.created_by.clone(),
            created_at: card.created_at,
            note: card.note.clone(),
            redemption: card.redemption.clone(),
            revocation: card.revocation.clone(),
        }
    }
}

/// Create card request.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCardRequest {
    /// What the card grants.
    pub card_type: CardType,
    /// Quota credits. Required positive for quota/combo.
    #[serde(default)]
    pub quota_amount: i64,
    /// Time amount. Required positive for time/combo.
    #[serde(default)]
    pub time_amount: i64,
    /// Unit for `time_amount`.
    #[serde(default)]
    pub time_unit: TimeUnit,
    /// Optional validity deadline for the card itself.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form operator note.
    #[serde(default)]
    pub note: String,
    /// Creating actor; defaults to "admin".
    #[serde(default = "default_created_by")]
    pub created_by: String,
}

fn default_created_by() -> String {
    "admin".into()
}

impl CreateCardRequest {
    fn into_config(self) -> NewCard {
        NewCard {
            card_type: self.card_type,
            quota_amount: self.quota_amount,
            time_amount: self.time_amount,
            time_unit: self.time_unit,
            expires_at: self.expires_at,
            note: self.note,
            created_by: self.created_by,
        }
    }
}

/// Create a single card.
pub async fn create_card(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Json(body): Json<CreateCardRequest>,
) -> Result<Json<CardResponse>, ApiError> {
    let card = state.manager.create_card(&body.into_config())?;
    Ok(Json(CardResponse::from(&card)))
}

/// Batch create request.
#[derive(Debug, Deserialize)]
pub struct CreateCardsBatchRequest {
    /// Shared configuration for every card in the batch.
    #[serde(flatten)]
    pub config: CreateCardRequest,
    /// How many cards to create.
    pub count: usize,
}

/// Batch create response.
///
/// Cards created before a failure remain valid; `created` tells the caller
/// how many succeeded.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    /// How many cards were requested.
    pub requested: usize,
    /// How many cards were created.
    pub created: usize,
    /// The created cards, in creation order.
    pub cards: Vec<CardResponse>,
    /// The error that stopped the batch, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Create several cards from one configuration.
pub async fn create_cards_batch(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Json(body): Json<CreateCardsBatchRequest>,
) -> Result<Json<BatchResponse>, ApiError> {
    if body.count == 0 || body.count > MAX_BATCH_COUNT {
        return Err(ApiError::BadRequest(format!(
            "count must be between 1 and {MAX_BATCH_COUNT}"
        )));
    }

    let outcome = state
        .manager
        .create_cards_batch(&body.config.into_config(), body.count);

    Ok(Json(BatchResponse {
        requested: outcome.requested,
        created: outcome.cards.len(),
        cards: outcome.cards.iter().map(CardResponse::from).collect(),
        error: outcome.failure.map(|e| e.to_string()),
    }))
}

/// List cards query.
#[derive(Debug, Deserialize)]
pub struct ListCardsQuery {
    /// Optional status filter.
    #[serde(default)]
    pub status: Option<CardStatus>,
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

/// Card list response.
#[derive(Debug, Serialize)]
pub struct CardListResponse {
    /// Cards on this page, newest first.
    pub cards: Vec<CardResponse>,
    /// Total cards matching the filter.
    pub total: usize,
    /// Applied page size.
    pub limit: usize,
    /// Applied page offset.
    pub offset: usize,
}

/// List cards, newest first.
pub async fn list_cards(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Query(query): Query<ListCardsQuery>,
) -> Result<Json<CardListResponse>, ApiError> {
    let limit = query.limit.min(100);
    let page = state.manager.list_cards(query.status, limit, query.offset)?;

    Ok(Json(CardListResponse {
        cards: page.items.iter().map(CardResponse::from).collect(),
        total: page.total,
        limit,
        offset: query.offset,
    }))
}

/// Get a card by id.
pub async fn get_card(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(id): Path<String>,
) -> Result<Json<CardResponse>, ApiError> {
    let card_id = parse_card_id(&id)?;
    let card = state.manager.get_card_by_id(&card_id)?;
    Ok(Json(CardResponse::from(&card)))
}

/// Get a card by its human-facing code.
pub async fn get_card_by_code(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(code): Path<String>,
) -> Result<Json<CardResponse>, ApiError> {
    let card = state.manager.get_card_by_code(&code)?;
    Ok(Json(CardResponse::from(&card)))
}

/// Delete response.
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    /// The deleted card's id.
    pub id: String,
    /// The deleted card's code.
    pub code: String,
}

/// Delete a card that has never been redeemed.
pub async fn delete_card(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let card_id = parse_card_id(&id)?;
    let card = state.manager.delete_card(&card_id)?;
    Ok(Json(DeletedResponse {
        id: card.id.to_string(),
        code: card.code,
    }))
}

/// Per-status card counts.
pub async fn card_stats(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
) -> Result<Json<CardStats>, ApiError> {
    Ok(Json(state.manager.stats()?))
}

fn parse_card_id(id: &str) -> Result<CardId, ApiError> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid card id: {id}")))
}
