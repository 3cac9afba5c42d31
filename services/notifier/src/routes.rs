//! Notifier HTTP routes
//!
//! Every notification endpoint answers `200` with the uniform
//! `{success, error?, ...}` body; failures are reported in the body.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{
    facade::NotificationResult,
    identity::AuthUser,
    manager::{DEFAULT_HISTORY_LIMIT, DEFAULT_RETENTION_DAYS},
    models::NotificationData,
    preferences::PreferencesUpdate,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: NotificationData,
}

#[derive(Debug, Deserialize)]
pub struct PushRequest {
    pub token: String,
    #[serde(flatten)]
    pub message: MessageBody,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub tokens: Vec<String>,
    #[serde(flatten)]
    pub message: MessageBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsersRequest {
    pub user_ids: Vec<Uuid>,
    #[serde(flatten)]
    pub message: MessageBody,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    #[serde(default)]
    pub seconds: u64,
    #[serde(flatten)]
    pub message: MessageBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTokensRequest {
    pub user_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupRequest {
    pub days_old: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Create the router for the notifier service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/session",
            get(get_session).post(sign_in).delete(sign_out),
        )
        .route("/notifications/local", post(send_local))
        .route("/notifications/push", post(send_push))
        .route("/notifications/bulk", post(send_bulk))
        .route("/notifications/users", post(send_to_users))
        .route("/notifications/broadcast", post(send_broadcast))
        .route("/notifications/history", get(get_history))
        .route(
            "/notifications/scheduled",
            get(get_scheduled).post(schedule).delete(clear_all),
        )
        .route("/notifications/scheduled/:id", delete(cancel_scheduled))
        .route("/tokens", get(get_active_tokens))
        .route("/tokens/users", post(get_user_tokens))
        .route("/tokens/current", delete(deactivate_current))
        .route("/tokens/stored", get(get_stored_token))
        .route("/tokens/stats", get(get_token_stats))
        .route("/tokens/cleanup", post(cleanup_tokens))
        .route(
            "/permissions",
            get(get_permissions).post(request_permissions),
        )
        .route(
            "/preferences",
            get(get_preferences)
                .patch(set_preferences)
                .delete(reset_preferences),
        )
        .route("/preferences/dark-mode", post(toggle_dark_mode))
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "notifier-service"
    }))
}

pub async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.facade.state())
}

/// Sign a user in on this device session
pub async fn sign_in(
    State(state): State<AppState>,
    Json(user): Json<AuthUser>,
) -> impl IntoResponse {
    state.identity.sign_in(user).await;
    Json(NotificationResult::ok())
}

pub async fn sign_out(State(state): State<AppState>) -> impl IntoResponse {
    state.identity.sign_out().await;
    Json(NotificationResult::ok())
}

pub async fn send_local(
    State(state): State<AppState>,
    Json(req): Json<MessageBody>,
) -> Json<NotificationResult> {
    Json(
        state
            .facade
            .send_local_notification(&req.title, &req.body, &req.data)
            .await,
    )
}

pub async fn send_push(
    State(state): State<AppState>,
    Json(req): Json<PushRequest>,
) -> Json<NotificationResult> {
    let m = req.message;
    Json(
        state
            .facade
            .send_push_notification(&req.token, &m.title, &m.body, &m.data)
            .await,
    )
}

pub async fn send_bulk(
    State(state): State<AppState>,
    Json(req): Json<BulkRequest>,
) -> Json<NotificationResult> {
    let m = req.message;
    Json(
        state
            .facade
            .send_bulk_notifications(&req.tokens, &m.title, &m.body, &m.data)
            .await,
    )
}

pub async fn send_to_users(
    State(state): State<AppState>,
    Json(req): Json<UsersRequest>,
) -> Json<NotificationResult> {
    let m = req.message;
    Json(
        state
            .facade
            .send_notification_to_users(&req.user_ids, &m.title, &m.body, &m.data)
            .await,
    )
}

pub async fn send_broadcast(
    State(state): State<AppState>,
    Json(req): Json<MessageBody>,
) -> Json<NotificationResult> {
    Json(
        state
            .facade
            .send_broadcast_notification(&req.title, &req.body, &req.data)
            .await,
    )
}

pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<NotificationResult> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Json(state.facade.get_notification_history(limit).await)
}

pub async fn schedule(
    State(state): State<AppState>,
    Json(req): Json<ScheduleRequest>,
) -> Json<NotificationResult> {
    let m = req.message;
    Json(
        state
            .facade
            .schedule_notification(&m.title, &m.body, req.seconds, &m.data)
            .await,
    )
}

pub async fn get_scheduled(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.get_all_scheduled_notifications().await)
}

pub async fn clear_all(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.clear_all_notifications().await)
}

pub async fn cancel_scheduled(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<NotificationResult> {
    Json(state.facade.cancel_scheduled_notification(&id).await)
}

pub async fn get_active_tokens(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.get_all_active_tokens().await)
}

pub async fn get_user_tokens(
    State(state): State<AppState>,
    Json(req): Json<UserTokensRequest>,
) -> Json<NotificationResult> {
    Json(state.facade.get_user_tokens(&req.user_ids).await)
}

pub async fn deactivate_current(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.deactivate_current_token().await)
}

pub async fn get_stored_token(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.get_stored_token().await)
}

pub async fn get_token_stats(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.get_token_stats().await)
}

/// The body is optional; a missing or unreadable one uses the default window
pub async fn cleanup_tokens(
    State(state): State<AppState>,
    body: Option<Json<CleanupRequest>>,
) -> Json<NotificationResult> {
    let days_old = body
        .and_then(|Json(req)| req.days_old)
        .unwrap_or(DEFAULT_RETENTION_DAYS);
    Json(state.facade.cleanup_inactive_tokens(days_old).await)
}

pub async fn get_permissions(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.are_notifications_enabled().await)
}

pub async fn request_permissions(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.request_notification_permissions().await)
}

pub async fn get_preferences(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.get_preferences().await)
}

pub async fn set_preferences(
    State(state): State<AppState>,
    Json(update): Json<PreferencesUpdate>,
) -> Json<NotificationResult> {
    Json(state.facade.set_preferences(update).await)
}

pub async fn reset_preferences(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.reset_preferences().await)
}

pub async fn toggle_dark_mode(State(state): State<AppState>) -> Json<NotificationResult> {
    Json(state.facade.toggle_dark_mode().await)
}
