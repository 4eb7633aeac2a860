// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Web Push subscription and reminder settings routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use super::{parse_object_id, SuccessResponse};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::notification::{
    NotificationSettingsForm, NotificationSettingsResponse, ReminderForm, SubscribeRequest,
};
use crate::services::accounts::current_user;
use crate::services::notifications::{self, NotificationDebug, NotificationStatusResponse};
use crate::AppState;

/// Notification routes (require authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications/vapid-public-key", get(vapid_public_key))
        .route("/notifications/subscribe", post(subscribe))
        .route("/notifications/resubscribe", post(resubscribe))
        .route("/notifications/status", get(status))
        .route("/notifications/test", post(send_test))
        .route("/notifications/debug", get(debug))
        .route(
            "/notifications/teams/{team}/settings",
            get(get_settings).post(update_settings),
        )
        .route("/notifications/teams/{team}/subscribe-all", post(subscribe_all))
        .route(
            "/notifications/assignments/{id}/subscribe",
            post(subscribe_assignment),
        )
        .route(
            "/notifications/assignments/{id}/unsubscribe",
            post(unsubscribe_assignment),
        )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidKeyResponse {
    pub public_key: String,
}

async fn vapid_public_key(State(state): State<Arc<AppState>>) -> Result<Json<VapidKeyResponse>> {
    let push = state
        .push
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Push notifications are not configured".to_string()))?;
    Ok(Json(VapidKeyResponse {
        public_key: push.public_key().to_string(),
    }))
}

async fn subscribe(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<SuccessResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    notifications::subscribe(&state.db, &user, &req).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[derive(Serialize)]
pub struct ResubscribeResponse {
    pub success: bool,
    pub rescheduled: u64,
}

async fn resubscribe(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SubscribeRequest>,
) -> Result<Json<ResubscribeResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    let rescheduled = notifications::resubscribe(&state.db, &user, &req).await?;
    Ok(Json(ResubscribeResponse {
        success: true,
        rescheduled,
    }))
}

async fn status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<NotificationStatusResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(
        notifications::status(&state.db, &user, state.push.is_some()).await?,
    ))
}

async fn send_test(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<SuccessResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    notifications::send_test(&state.db, state.push.as_ref(), &user).await?;
    Ok(Json(SuccessResponse::ok()))
}

async fn debug(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<NotificationDebug>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(notifications::debug(&state.db, &user).await?))
}

// ─── Team settings ───────────────────────────────────────────

async fn get_settings(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
) -> Result<Json<NotificationSettingsResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(
        notifications::get_settings(&state.db, &user, team_number).await?,
    ))
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
    Json(form): Json<NotificationSettingsForm>,
) -> Result<Json<NotificationSettingsResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(
        notifications::update_settings(&state.db, &user, team_number, &form).await?,
    ))
}

#[derive(Serialize)]
pub struct SubscribeAllResponse {
    #[serde(flatten)]
    pub settings: NotificationSettingsResponse,
    pub scheduled: usize,
}

async fn subscribe_all(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
    Json(form): Json<ReminderForm>,
) -> Result<Json<SubscribeAllResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    let (settings, scheduled) =
        notifications::subscribe_all(&state.db, &user, team_number, form.reminder_time).await?;
    Ok(Json(SubscribeAllResponse {
        settings,
        scheduled,
    }))
}

// ─── Per-assignment reminders ────────────────────────────────

#[derive(Serialize)]
pub struct AssignmentSubscribeResponse {
    pub success: bool,
    /// False when the reminder time has already passed
    pub scheduled: bool,
}

async fn subscribe_assignment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(form): Json<ReminderForm>,
) -> Result<Json<AssignmentSubscribeResponse>> {
    let id = parse_object_id(&id)?;
    let user = current_user(&state.db, &auth.user_id).await?;
    let scheduled =
        notifications::subscribe_assignment(&state.db, &user, &id, form.reminder_time).await?;
    Ok(Json(AssignmentSubscribeResponse {
        success: true,
        scheduled,
    }))
}

async fn unsubscribe_assignment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    let id = parse_object_id(&id)?;
    let user = current_user(&state.db, &auth.user_id).await?;
    notifications::unsubscribe_assignment(&state.db, &user, &id).await?;
    Ok(Json(SuccessResponse::ok()))
}
