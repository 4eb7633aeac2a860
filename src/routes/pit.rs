// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pit scouting routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use std::sync::Arc;

use super::SuccessResponse;
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{PitScoutingForm, PitScoutingResponse};
use crate::services::accounts::current_user;
use crate::services::pit;
use crate::AppState;

/// Pit scouting routes (require authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scouting/pit", get(list_pit))
        .route("/scouting/pit/add", post(add_pit))
        .route("/scouting/pit/{team}", get(get_pit))
        .route("/scouting/pit/edit/{team}", post(edit_pit))
        .route("/scouting/pit/delete/{team}", post(delete_pit))
}

async fn list_pit(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<PitScoutingResponse>>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(pit::list_pit(&state.db, &user).await?))
}

async fn add_pit(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(form): Json<PitScoutingForm>,
) -> Result<Json<PitScoutingResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(pit::add_pit(&state.db, &user, &form).await?))
}

async fn get_pit(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team): Path<i32>,
) -> Result<Json<PitScoutingResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(pit::get_pit(&state.db, &user, team).await?))
}

async fn edit_pit(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team): Path<i32>,
    Json(form): Json<PitScoutingForm>,
) -> Result<Json<PitScoutingResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(pit::edit_pit(&state.db, &user, team, &form).await?))
}

async fn delete_pit(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team): Path<i32>,
) -> Result<Json<SuccessResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    pit::delete_pit(&state.db, &user, team).await?;
    Ok(Json(SuccessResponse::ok()))
}
