// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account routes: registration, login, profile and settings.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::SuccessResponse;
use crate::error::{AppError, Result};
use crate::middleware::auth::{
    create_jwt, removal_cookie, session_cookie, AuthUser, REMEMBER_SECS, SESSION_SECS,
};
use crate::models::{PublicProfile, UserResponse};
use crate::services::accounts::{self, NewAccount};
use crate::AppState;

/// Routes reachable without a session.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/profile/{username}", get(profile))
}

/// Routes that need a session (auth middleware applied in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/me", get(me))
        .route("/auth/settings", get(me).post(update_settings))
        .route("/auth/password", post(change_password))
        .route("/auth/check_username", post(check_username))
        .route("/auth/delete_account", post(delete_account))
}

// ─── Registration / Login ────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 50, message = "Username must be 1-50 characters"))]
    pub username: String,
    pub password: String,
    pub confirm_password: String,
    pub team_passcode: String,
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<UserResponse>> {
    req.validate()?;
    let user = accounts::register(
        &state.db,
        &state.config,
        NewAccount {
            email: &req.email,
            username: &req.username,
            password: &req.password,
            confirm_password: &req.confirm_password,
            team_passcode: &req.team_passcode,
        },
    )
    .await?;
    Ok(Json(UserResponse::from(&user)))
}

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginRequest {
    /// Username or email
    pub login: String,
    pub password: String,
    pub team_passcode: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginParams {
    next: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LoginResponse {
    pub user: UserResponse,
    /// Where the client should go next (validated `next`, else `/`)
    pub redirect: String,
}

async fn login(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LoginParams>,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>)> {
    let user = accounts::login(
        &state.db,
        &state.config,
        &req.login,
        &req.password,
        &req.team_passcode,
    )
    .await?;

    let lifetime = if req.remember { REMEMBER_SECS } else { SESSION_SECS };
    let token = create_jwt(&user.id, lifetime, &state.config.jwt_signing_key)?;
    let jar = jar.add(session_cookie(token, lifetime, state.config.cookie_secure));

    let redirect = params
        .next
        .filter(|next| accounts::is_safe_redirect(next))
        .unwrap_or_else(|| "/".to_string());

    Ok((
        jar,
        Json(LoginResponse {
            user: UserResponse::from(&user),
            redirect,
        }),
    ))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> (CookieJar, Json<SuccessResponse>) {
    (
        jar.add(removal_cookie(state.config.cookie_secure)),
        Json(SuccessResponse::ok()),
    )
}

// ─── Profile / Settings ──────────────────────────────────────

async fn me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let user = accounts::current_user(&state.db, &auth.user_id).await?;
    Ok(Json(UserResponse::from(&user)))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<Json<PublicProfile>> {
    let user = state
        .db
        .get_user_by_username(&username)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(PublicProfile::from(&user)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct SettingsRequest {
    #[serde(default)]
    #[validate(length(max = 50, message = "Username must be at most 50 characters"))]
    pub username: Option<String>,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
}

async fn update_settings(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<UserResponse>> {
    req.validate()?;
    let user = accounts::update_settings(
        &state.db,
        &auth.user_id,
        req.username.as_deref(),
        req.description.as_deref(),
    )
    .await?;
    tracing::info!(user_id = %auth.user_id, "Updated settings");
    Ok(Json(UserResponse::from(&user)))
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<PasswordRequest>,
) -> Result<Json<SuccessResponse>> {
    accounts::change_password(&state.db, &auth.user_id, &req.current_password, &req.new_password)
        .await?;
    Ok(Json(SuccessResponse::ok()))
}

#[derive(Debug, Deserialize)]
pub struct CheckUsernameRequest {
    #[serde(default)]
    pub username: String,
}

#[derive(Serialize)]
pub struct CheckUsernameResponse {
    pub available: bool,
}

async fn check_username(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CheckUsernameRequest>,
) -> Result<Json<CheckUsernameResponse>> {
    let available =
        accounts::username_available(&state.db, Some(&auth.user_id), &req.username).await?;
    Ok(Json(CheckUsernameResponse { available }))
}

async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SuccessResponse>)> {
    accounts::delete_account(&state.db, &auth.user_id).await?;
    Ok((
        jar.add(removal_cookie(state.config.cookie_secure)),
        Json(SuccessResponse::ok()),
    ))
}
