// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Team membership, administration and assignment routes.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use super::{parse_object_id, SuccessResponse};
use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::assignment::{AssignmentForm, AssignmentStatusForm};
use crate::models::{AssignmentResponse, TeamDetails, TeamMember, TeamSummary};
use crate::services::accounts::current_user;
use crate::services::teams;
use crate::AppState;

/// Routes that create or join a team (rate limited in routes/mod.rs).
pub fn join_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/team/create", post(create_team))
        .route("/team/join", post(join_team))
}

/// Team routes (require authentication).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/team/manage", get(manage))
        .route("/team/view/{team}", get(view_team))
        .route("/team/{team}/members", get(list_members))
        .route("/team/{team}/leave", post(leave_team))
        .route("/team/{team}/admin/add", post(add_admin))
        .route("/team/{team}/admin/remove", post(remove_admin))
        .route("/team/{team}/user/{user_id}/remove", post(remove_user))
        .route("/team/{team}/update_team_info", post(update_team_info))
        .route("/team/{team}/delete", post(delete_team))
        .route(
            "/team/{team}/assignments",
            get(list_assignments).post(create_assignment),
        )
        .route("/team/{team}/assignments/clear", post(clear_assignments))
        .route("/team/assignments/{id}/status", post(update_status))
        .route("/team/assignments/{id}/update", post(update_assignment))
        .route("/team/assignments/{id}/delete", post(delete_assignment))
}

// ─── Membership ──────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CreateTeamRequest {
    #[validate(range(min = 1, max = 99999, message = "Team number must be 1-99999"))]
    pub team_number: i32,
    #[serde(default)]
    #[validate(length(max = 100, message = "Team name must be at most 100 characters"))]
    pub team_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
}

async fn create_team(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<CreateTeamRequest>,
) -> Result<Json<TeamDetails>> {
    req.validate()?;
    let user = current_user(&state.db, &auth.user_id).await?;
    let team = teams::create_team(
        &state.db,
        &user,
        req.team_number,
        req.team_name,
        req.description,
    )
    .await?;
    Ok(Json(TeamDetails::for_viewer(&team, &user.id)))
}

#[derive(Debug, Deserialize)]
pub struct JoinTeamRequest {
    pub join_code: String,
}

async fn join_team(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<JoinTeamRequest>,
) -> Result<Json<TeamDetails>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    let team = teams::join_team(&state.db, &user, &req.join_code).await?;
    Ok(Json(TeamDetails::for_viewer(&team, &user.id)))
}

#[derive(Serialize)]
pub struct ManageResponse {
    pub team: Option<TeamDetails>,
    pub members: Vec<TeamMember>,
    pub assignments: Vec<AssignmentResponse>,
    pub can_manage: bool,
}

/// The caller's team with members and assignments, or an empty view.
async fn manage(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ManageResponse>> {
    let user = current_user(&state.db, &auth.user_id).await?;
    let Some(team) = teams::validate_membership(&state.db, &user).await? else {
        return Ok(Json(ManageResponse {
            team: None,
            members: Vec::new(),
            assignments: Vec::new(),
            can_manage: false,
        }));
    };

    let members = teams::members(&state.db, &team).await?;
    let assignments = state.db.list_assignments(team.team_number).await?;
    Ok(Json(ManageResponse {
        can_manage: teams::can_manage(&team, &user.id),
        team: Some(TeamDetails::for_viewer(&team, &user.id)),
        members,
        assignments: assignments.iter().map(Into::into).collect(),
    }))
}

async fn view_team(
    State(state): State<Arc<AppState>>,
    Path(team_number): Path<i32>,
) -> Result<Json<TeamSummary>> {
    let team = teams::require_team(&state.db, team_number).await?;
    Ok(Json(TeamSummary::from(&team)))
}

async fn list_members(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
) -> Result<Json<Vec<TeamMember>>> {
    let team = teams::require_member(&state.db, team_number, &auth.user_id).await?;
    Ok(Json(teams::members(&state.db, &team).await?))
}

async fn leave_team(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
) -> Result<Json<SuccessResponse>> {
    teams::leave_team(&state.db, &auth.user_id, team_number).await?;
    Ok(Json(SuccessResponse::ok()))
}

// ─── Administration ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TargetUserRequest {
    pub user_id: String,
}

async fn add_admin(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
    Json(req): Json<TargetUserRequest>,
) -> Result<Json<TeamDetails>> {
    let target = parse_object_id(&req.user_id)?;
    let team = teams::add_admin(&state.db, &auth.user_id, team_number, &target).await?;
    Ok(Json(TeamDetails::for_viewer(&team, &auth.user_id)))
}

async fn remove_admin(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
    Json(req): Json<TargetUserRequest>,
) -> Result<Json<TeamDetails>> {
    let target = parse_object_id(&req.user_id)?;
    let team = teams::remove_admin(&state.db, &auth.user_id, team_number, &target).await?;
    Ok(Json(TeamDetails::for_viewer(&team, &auth.user_id)))
}

async fn remove_user(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((team_number, user_id)): Path<(i32, String)>,
) -> Result<Json<SuccessResponse>> {
    let target = parse_object_id(&user_id)?;
    teams::remove_user(&state.db, &auth.user_id, team_number, &target).await?;
    Ok(Json(SuccessResponse::ok()))
}

#[derive(Debug, Deserialize, Validate)]
pub struct TeamInfoRequest {
    #[serde(default)]
    #[validate(length(max = 100, message = "Team name must be at most 100 characters"))]
    pub team_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,
}

async fn update_team_info(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
    Json(req): Json<TeamInfoRequest>,
) -> Result<Json<TeamDetails>> {
    req.validate()?;
    let team = teams::update_team_info(
        &state.db,
        &auth.user_id,
        team_number,
        req.team_name,
        req.description,
    )
    .await?;
    Ok(Json(TeamDetails::for_viewer(&team, &auth.user_id)))
}

async fn delete_team(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
) -> Result<Json<SuccessResponse>> {
    teams::delete_team(&state.db, &auth.user_id, team_number).await?;
    Ok(Json(SuccessResponse::ok()))
}

// ─── Assignments ─────────────────────────────────────────────

async fn list_assignments(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
) -> Result<Json<Vec<AssignmentResponse>>> {
    teams::require_member(&state.db, team_number, &auth.user_id).await?;
    let assignments = state.db.list_assignments(team_number).await?;
    Ok(Json(assignments.iter().map(Into::into).collect()))
}

async fn create_assignment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
    Json(form): Json<AssignmentForm>,
) -> Result<Json<AssignmentResponse>> {
    form.validate()?;
    let assignment = teams::create_assignment(&state.db, &auth.user_id, team_number, &form).await?;
    Ok(Json(AssignmentResponse::from(&assignment)))
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub deleted: u64,
}

async fn clear_assignments(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(team_number): Path<i32>,
) -> Result<Json<ClearResponse>> {
    let deleted = teams::clear_assignments(&state.db, &auth.user_id, team_number).await?;
    Ok(Json(ClearResponse {
        success: true,
        deleted,
    }))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(form): Json<AssignmentStatusForm>,
) -> Result<Json<AssignmentResponse>> {
    let id = parse_object_id(&id)?;
    let assignment =
        teams::update_assignment_status(&state.db, &auth.user_id, &id, form.status).await?;
    Ok(Json(AssignmentResponse::from(&assignment)))
}

async fn update_assignment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(form): Json<AssignmentForm>,
) -> Result<Json<AssignmentResponse>> {
    form.validate()?;
    let id = parse_object_id(&id)?;
    let assignment = teams::update_assignment(&state.db, &auth.user_id, &id, &form).await?;
    Ok(Json(AssignmentResponse::from(&assignment)))
}

async fn delete_assignment(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>> {
    let id = parse_object_id(&id)?;
    teams::delete_assignment(&state.db, &auth.user_id, &id).await?;
    Ok(Json(SuccessResponse::ok()))
}
