use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{parse_id, AuthUser};
use crate::errors::{Result, SwapError};
use crate::lifecycle::CreateSwap;
use crate::models::notification::Notification;
use crate::models::request::{Relationship, SwapRequest};
use crate::query::DEFAULT_NOTIFICATION_LIMIT;
use crate::AppState;

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequestBody {
    pub to_user_id: String,
    pub offered_skill: String,
    pub wanted_skill: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Deserialize)]
pub struct ListRequestsParams {
    /// "sent" | "received" | "all"
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Deserialize)]
pub struct NotificationParams {
    pub limit: Option<usize>,
}

// ── Swap Requests ────────────────────────────────────────────

/// POST /api/v1/requests - send a swap request as the caller
pub async fn create_request(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Json(body): Json<CreateRequestBody>,
) -> Result<(StatusCode, Json<SwapRequest>)> {
    let to_user_id = parse_id(&body.to_user_id, "user")?;
    let request = state
        .swaps
        .create_request(CreateSwap {
            from_user_id: user_id,
            to_user_id,
            offered_skill: body.offered_skill,
            wanted_skill: body.wanted_skill,
            message: body.message,
        })
        .await
        .map_err(|e| {
            log_failure("create_request", &e);
            e
        })?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/v1/requests?type=sent|received|all
pub async fn list_requests(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(params): Query<ListRequestsParams>,
) -> Result<Json<Vec<SwapRequest>>> {
    let requests = match params.kind.as_deref().unwrap_or("all") {
        "sent" => state.queries.sent_requests(user_id).await,
        "received" => state.queries.received_requests(user_id).await,
        "all" => state.queries.all_requests(user_id).await,
        other => {
            tracing::warn!("list_requests: invalid type: {}", other);
            return Err(SwapError::invalid("type must be sent, received or all"));
        }
    }
    .map_err(|e| {
        log_failure("list_requests", &e);
        e
    })?;
    Ok(Json(requests))
}

/// GET /api/v1/requests/:id
pub async fn get_request(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SwapRequest>> {
    let id = parse_id(&id, "request")?;
    Ok(Json(state.queries.get_request(id, user_id).await?))
}

/// POST /api/v1/requests/:id/accept
pub async fn accept_request(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SwapRequest>> {
    let id = parse_id(&id, "request")?;
    let request = state.swaps.accept(id, user_id).await.map_err(|e| {
        log_failure("accept_request", &e);
        e
    })?;
    Ok(Json(request))
}

/// POST /api/v1/requests/:id/reject
pub async fn reject_request(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SwapRequest>> {
    let id = parse_id(&id, "request")?;
    let request = state.swaps.reject(id, user_id).await.map_err(|e| {
        log_failure("reject_request", &e);
        e
    })?;
    Ok(Json(request))
}

/// POST /api/v1/requests/:id/cancel
pub async fn cancel_request(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SwapRequest>> {
    let id = parse_id(&id, "request")?;
    let request = state.swaps.cancel(id, user_id).await.map_err(|e| {
        log_failure("cancel_request", &e);
        e
    })?;
    Ok(Json(request))
}

/// DELETE /api/v1/requests/:id - only resolved requests can be deleted
pub async fn delete_request(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "request")?;
    state.swaps.delete_request(id, user_id).await.map_err(|e| {
        log_failure("delete_request", &e);
        e
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/relationships/:other_user_id
pub async fn get_relationship(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(other): Path<String>,
) -> Result<Json<Relationship>> {
    let other = parse_id(&other, "user")?;
    Ok(Json(state.queries.relationship_status(user_id, other).await?))
}

// ── Notifications ────────────────────────────────────────────

/// GET /api/v1/notifications - newest first
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Query(params): Query<NotificationParams>,
) -> Result<Json<Vec<Notification>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_NOTIFICATION_LIMIT)
        .clamp(1, 200);
    let notifications = state
        .queries
        .notifications(user_id, limit)
        .await
        .map_err(|e| {
            log_failure("list_notifications", &e);
            e
        })?;
    Ok(Json(notifications))
}

/// GET /api/v1/notifications/unread
pub async fn count_unread_notifications(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Value>> {
    let count = state.queries.unread_count(user_id).await?;
    Ok(Json(json!({ "count": count })))
}

/// POST /api/v1/notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_id(&id, "notification")?;
    state.queries.mark_read(user_id, id).await?;
    Ok(Json(json!({ "id": id, "read": true })))
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_notifications_read(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
) -> Result<Json<Value>> {
    let updated = state.queries.mark_all_read(user_id).await?;
    Ok(Json(json!({ "updated": updated })))
}

/// DELETE /api/v1/notifications/:id
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(AuthUser(user_id)): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    let id = parse_id(&id, "notification")?;
    state.queries.delete_notification(user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Client mistakes are worth a warning; backend failures are logged where
/// the response is built.
pub(crate) fn log_failure(op: &str, e: &SwapError) {
    if !matches!(e, SwapError::Store(_)) {
        tracing::warn!("{} rejected: {}", op, e);
    }
}
