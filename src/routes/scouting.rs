// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Match scouting, statistics and leaderboard routes.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{parse_object_id, SuccessResponse};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::scouting::{AutoPath, MatchGroup, TeamPath};
use crate::models::{
    LeaderboardEntry, LeaderboardSort, ScouterSort, ScoutingEntryResponse, ScoutingForm, TeamStats,
};
use crate::services::accounts::current_user;
use crate::services::scouting::{self, ScouterLeaderboard};
use crate::AppState;

/// Scouting routes (require authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scouting", get(list_entries))
        .route("/scouting/add", post(add_entry))
        .route("/scouting/matches", get(matches))
        .route("/scouting/{id}", get(get_entry))
        .route("/scouting/edit/{id}", post(edit_entry))
        .route("/scouting/delete/{id}", post(delete_entry))
        .route("/leaderboard", get(leaderboard))
        .route("/scouter-leaderboard", get(scouter_leaderboard))
        .route("/api/compare", get(compare))
        .route("/api/team_stats/{team}", get(team_stats))
        .route("/api/team_paths", get(team_paths))
        .route("/api/auto_paths/{team}", get(auto_paths))
}

// ─── Entries ─────────────────────────────────────────────────

async fn list_entries(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ScoutingEntryResponse>>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    let entries = scouting::list_entries(&state.db, &user).await?;
    Ok(Json(
        entries
            .iter()
            .map(|e| ScoutingEntryResponse::for_viewer(e, &user.id))
            .collect(),
    ))
}

async fn add_entry(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(form): Json<ScoutingForm>,
) -> Result<Json<ScoutingEntryResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    let entry = scouting::add_entry(&state.db, &user, &form).await?;
    Ok(Json(ScoutingEntryResponse::for_viewer(&entry, &user.id)))
}

async fn matches(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<MatchGroup>>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(scouting::matches(&state.db, &user).await?))
}

async fn get_entry(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<ScoutingEntryResponse>> {
    let id = parse_object_id(&id)?;
    let user = current_user(&state.db, &auth.user_id).await?;
    let entry = scouting::get_entry(&state.db, &user, &id).await?;
    Ok(Json(ScoutingEntryResponse::for_viewer(&entry, &user.id)))
}

async fn edit_entry(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(form): Json<ScoutingForm>,
) -> Result<Json<ScoutingEntryResponse>> {
    let id = parse_object_id(&id)?;
    let user = current_user(&state.db, &auth.user_id).await?;
    let entry = scouting::edit_entry(&state.db, &user, &id, &form).await?;
    Ok(Json(ScoutingEntryResponse::for_viewer(&entry, &user.id)))
}

async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    let id = parse_object_id(&id)?;
    let user = current_user(&state.db, &auth.user_id).await?;
    scouting::delete_entry(&state.db, &user, &id).await?;
    Ok(Json(SuccessResponse::ok()))
}

// ─── Leaderboards ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    #[serde(default)]
    sort: LeaderboardSort,
}

async fn leaderboard(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(scouting::leaderboard(&state.db, &user, params.sort).await?))
}

#[derive(Debug, Deserialize)]
pub struct ScouterLeaderboardParams {
    #[serde(default)]
    sort: ScouterSort,
    /// Event code, or `all`
    event: Option<String>,
    /// Scouting team number, or `all`
    team: Option<String>,
}

/// `None` for a missing, empty or `all` filter value.
fn filter_value(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
}

async fn scouter_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScouterLeaderboardParams>,
) -> Result<Json<ScouterLeaderboard>> {
    let team = filter_value(params.team.as_deref())
        .map(|t| {
            t.parse::<i32>()
                .map_err(|_| AppError::BadRequest(format!("Invalid team filter: {}", t)))
        })
        .transpose()?;
    let event = filter_value(params.event.as_deref());

    Ok(Json(
        scouting::scouter_leaderboard(&state.db, params.sort, event, team).await?,
    ))
}

// ─── Team API ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    team1: Option<i32>,
    team2: Option<i32>,
    team3: Option<i32>,
}

#[derive(Serialize)]
pub struct CompareResponse {
    pub teams: Vec<TeamStats>,
}

async fn compare(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<CompareParams>,
) -> Result<Json<CompareResponse>> {
    let teams: Vec<i32> = [params.team1, params.team2, params.team3]
        .into_iter()
        .flatten()
        .collect();
    if teams.len() < 2 {
        return Err(AppError::BadRequest("At least 2 teams are required".to_string()));
    }
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(CompareResponse {
        teams: scouting::compare(&state.db, &user, &teams).await?,
    }))
}

async fn team_stats(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team): Path<i32>,
) -> Result<Json<TeamStats>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(scouting::team_stats(&state.db, &user, team).await?))
}

#[derive(Debug, Deserialize)]
pub struct TeamPathParams {
    team: Option<i32>,
}

async fn team_paths(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Query(params): Query<TeamPathParams>,
) -> Result<Json<Vec<TeamPath>>> {
    let team = params
        .team
        .ok_or_else(|| AppError::BadRequest("Team number is required".to_string()))?;
    let user = current_user(&state.db, &auth.user_id).await?;
    Ok(Json(scouting::team_paths(&state.db, &user, team).await?))
}

async fn auto_paths(
    State(state): State<Arc<AppState>>,
    Path(team): Path<i32>,
) -> Result<Json<Vec<AutoPath>>> {
    Ok(Json(scouting::auto_paths(&state.db, team).await?))
}
