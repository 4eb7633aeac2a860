// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Team membership, roles and assignments.
//!
//! Permission rules:
//! - owner: manage admins, delete the team; cannot leave, be removed or be
//!   demoted
//! - admins (owner included): remove members, edit team info, manage
//!   assignments
//! - members: view the team, list assignments, update the status of
//!   assignments given to them

use bson::oid::ObjectId;
use bson::{doc, Bson};
use ring::rand::{SecureRandom, SystemRandom};

use crate::db::MongoDb;
use crate::error::AppError;
use crate::models::assignment::AssignmentForm;
use crate::models::{Assignment, AssignmentStatus, Team, TeamMember, TeamRole, User};
use crate::time_utils::parse_client_datetime;

pub const JOIN_CODE_LEN: usize = 6;
const JOIN_CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Largest multiple of 36 that fits in a byte; higher bytes are rejected so
/// every symbol is equally likely.
const JOIN_CODE_CUTOFF: u8 = 252;
const JOIN_CODE_MAX_TRIES: usize = 20;

/// Generate a random join code (not checked for uniqueness).
pub fn generate_join_code(rng: &dyn SecureRandom) -> Result<String, AppError> {
    let mut code = String::with_capacity(JOIN_CODE_LEN);
    let mut buf = [0u8; 16];
    while code.len() < JOIN_CODE_LEN {
        rng.fill(&mut buf)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG failure")))?;
        push_code_symbols(&mut code, &buf);
    }
    Ok(code)
}

fn push_code_symbols(code: &mut String, random: &[u8]) {
    for b in random.iter().copied().filter(|b| *b < JOIN_CODE_CUTOFF) {
        if code.len() == JOIN_CODE_LEN {
            break;
        }
        code.push(char::from(JOIN_CODE_ALPHABET[usize::from(b % 36)]));
    }
}

/// Normalize user input to the stored join code form.
pub fn normalize_join_code(code: &str) -> Option<String> {
    let code = code.trim().to_ascii_uppercase();
    (code.len() == JOIN_CODE_LEN && code.bytes().all(|b| JOIN_CODE_ALPHABET.contains(&b)))
        .then_some(code)
}

async fn unique_join_code(db: &MongoDb) -> Result<String, AppError> {
    let rng = SystemRandom::new();
    for _ in 0..JOIN_CODE_MAX_TRIES {
        let code = generate_join_code(&rng)?;
        if !db.join_code_exists(&code).await? {
            return Ok(code);
        }
    }
    Err(AppError::Internal(anyhow::anyhow!(
        "Could not generate a unique join code"
    )))
}

/// Load a team or fail with 404.
pub async fn require_team(db: &MongoDb, team_number: i32) -> Result<Team, AppError> {
    db.get_team(team_number)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Team {} not found", team_number)))
}

/// Load a team the user belongs to.
pub async fn require_member(
    db: &MongoDb,
    team_number: i32,
    user: &ObjectId,
) -> Result<Team, AppError> {
    let team = require_team(db, team_number).await?;
    if !team.is_member(user) {
        return Err(AppError::Forbidden("You are not a member of this team".to_string()));
    }
    Ok(team)
}

/// Load a team the user administers.
pub async fn require_admin(
    db: &MongoDb,
    team_number: i32,
    user: &ObjectId,
) -> Result<Team, AppError> {
    let team = require_team(db, team_number).await?;
    if !team.is_admin(user) {
        return Err(AppError::Forbidden("Only team admins can do that".to_string()));
    }
    Ok(team)
}

fn require_owner(team: &Team, user: &ObjectId, action: &str) -> Result<(), AppError> {
    if !team.is_owner(user) {
        return Err(AppError::Forbidden(format!("Only the team owner can {}", action)));
    }
    Ok(())
}

// ─── Membership ──────────────────────────────────────────────────

pub async fn create_team(
    db: &MongoDb,
    user: &User,
    team_number: i32,
    team_name: Option<String>,
    description: Option<String>,
) -> Result<Team, AppError> {
    if user.team_number.is_some() {
        return Err(AppError::Conflict("You are already on a team".to_string()));
    }
    if db.get_team(team_number).await?.is_some() {
        return Err(AppError::Conflict("Team number already exists".to_string()));
    }

    let team = Team {
        id: ObjectId::new(),
        team_number,
        team_join_code: unique_join_code(db).await?,
        users: vec![user.id],
        admins: vec![user.id],
        owner_id: user.id,
        created_at: bson::DateTime::now(),
        team_name: team_name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        description: description.unwrap_or_default().trim().to_string(),
    };
    db.insert_team(&team).await?;
    db.set_user_team(&user.id, Some(team_number)).await?;

    tracing::info!(team_number, owner = %user.id, "Created team");
    Ok(team)
}

pub async fn join_team(db: &MongoDb, user: &User, join_code: &str) -> Result<Team, AppError> {
    if user.team_number.is_some() {
        return Err(AppError::Conflict("You are already on a team".to_string()));
    }
    let invalid = || AppError::NotFound("Invalid team join code".to_string());
    let code = normalize_join_code(join_code).ok_or_else(invalid)?;
    let team = db.get_team_by_join_code(&code).await?.ok_or_else(invalid)?;

    if team.is_member(&user.id) {
        return Err(AppError::Conflict("User already in team".to_string()));
    }

    let team = db
        .add_team_member(team.team_number, &user.id)
        .await?
        .ok_or_else(invalid)?;
    db.set_user_team(&user.id, Some(team.team_number)).await?;

    tracing::info!(team_number = team.team_number, user_id = %user.id, "User joined team");
    Ok(team)
}

pub async fn leave_team(db: &MongoDb, user: &ObjectId, team_number: i32) -> Result<(), AppError> {
    let team = require_team(db, team_number).await?;
    if team.is_owner(user) {
        return Err(AppError::Conflict(
            "Team owner cannot leave. Please delete the team instead.".to_string(),
        ));
    }
    if !team.is_member(user) {
        return Err(AppError::NotFound("User not found in team".to_string()));
    }

    db.remove_team_member(team_number, user).await?;
    db.set_user_team(user, None).await?;

    tracing::info!(team_number, user_id = %user, "User left team");
    Ok(())
}

/// Members with their roles, sorted by username.
pub async fn members(db: &MongoDb, team: &Team) -> Result<Vec<TeamMember>, AppError> {
    let users = db.get_users(&team.users).await?;
    Ok(users
        .iter()
        .filter_map(|u| {
            team.role_of(&u.id).map(|role| TeamMember {
                id: u.id.to_hex(),
                username: u.username.clone(),
                description: u.description.clone(),
                role,
            })
        })
        .collect())
}

/// Resolve the caller's team for the manage view.
///
/// A `teamNumber` pointing at a missing team, or a team that no longer lists
/// the user, is cleared and reported as "no team".
pub async fn validate_membership(db: &MongoDb, user: &User) -> Result<Option<Team>, AppError> {
    let Some(team_number) = user.team_number else {
        return Ok(None);
    };
    match db.get_team(team_number).await? {
        Some(team) if team.is_member(&user.id) => Ok(Some(team)),
        _ => {
            tracing::warn!(user_id = %user.id, team_number, "Resetting stale team membership");
            db.set_user_team(&user.id, None).await?;
            Ok(None)
        }
    }
}

pub async fn add_admin(
    db: &MongoDb,
    caller: &ObjectId,
    team_number: i32,
    target: &ObjectId,
) -> Result<Team, AppError> {
    let team = require_team(db, team_number).await?;
    require_owner(&team, caller, "add new admins")?;
    if !team.is_member(target) {
        return Err(AppError::BadRequest("User is not a member of this team".to_string()));
    }
    if team.is_admin(target) {
        return Err(AppError::Conflict("User is already an admin".to_string()));
    }

    let team = db
        .add_team_admin(team_number, target)
        .await?
        .ok_or_else(|| AppError::NotFound("Team not found".to_string()))?;
    tracing::info!(team_number, user_id = %target, "Added team admin");
    Ok(team)
}

pub async fn remove_admin(
    db: &MongoDb,
    caller: &ObjectId,
    team_number: i32,
    target: &ObjectId,
) -> Result<Team, AppError> {
    let team = require_team(db, team_number).await?;
    require_owner(&team, caller, "remove admins")?;
    if team.is_owner(target) {
        return Err(AppError::Forbidden(
            "Cannot remove admin status from team owner".to_string(),
        ));
    }
    if !team.admins.contains(target) {
        return Err(AppError::BadRequest("User is not an admin".to_string()));
    }

    let team = db
        .remove_team_admin(team_number, target)
        .await?
        .ok_or_else(|| AppError::NotFound("Team not found".to_string()))?;
    tracing::info!(team_number, user_id = %target, "Removed team admin");
    Ok(team)
}

pub async fn remove_user(
    db: &MongoDb,
    caller: &ObjectId,
    team_number: i32,
    target: &ObjectId,
) -> Result<(), AppError> {
    let team = require_admin(db, team_number, caller).await?;
    if team.is_owner(target) {
        return Err(AppError::Forbidden("Cannot remove the team owner".to_string()));
    }
    if !team.is_member(target) {
        return Err(AppError::NotFound("User not found in team".to_string()));
    }

    db.remove_team_member(team_number, target).await?;
    db.set_user_team(target, None).await?;

    tracing::info!(team_number, user_id = %target, removed_by = %caller, "Removed user from team");
    Ok(())
}

pub async fn update_team_info(
    db: &MongoDb,
    caller: &ObjectId,
    team_number: i32,
    team_name: Option<String>,
    description: Option<String>,
) -> Result<Team, AppError> {
    require_admin(db, team_number, caller).await?;

    let mut set = bson::Document::new();
    if let Some(name) = team_name {
        let name = name.trim();
        set.insert("team_name", if name.is_empty() { Bson::Null } else { Bson::from(name) });
    }
    if let Some(description) = description {
        set.insert("description", description.trim());
    }
    if set.is_empty() {
        return require_team(db, team_number).await;
    }

    db.update_team_info(team_number, set)
        .await?
        .ok_or_else(|| AppError::NotFound("Team not found".to_string()))
}

/// Delete a team, its assignments, and everyone's membership in it.
pub async fn delete_team(
    db: &MongoDb,
    caller: &ObjectId,
    team_number: i32,
) -> Result<(), AppError> {
    let team = require_team(db, team_number).await?;
    require_owner(&team, caller, "delete the team")?;

    for assignment in db.list_assignments(team_number).await? {
        db.delete_pending_notifications_for_assignment(&assignment.id, None)
            .await?;
    }
    let assignments = db.delete_team_assignments(team_number).await?;
    let members = db.clear_team_for_members(team_number).await?;
    db.delete_team(team_number).await?;

    tracing::info!(team_number, assignments, members, "Deleted team");
    Ok(())
}

// ─── Assignments ─────────────────────────────────────────────────

/// Parse and check assignee ids against the team's members.
fn resolve_assignees(team: &Team, ids: &[String]) -> Result<Vec<ObjectId>, AppError> {
    let mut assignees = Vec::with_capacity(ids.len());
    for raw in ids {
        let id = ObjectId::parse_str(raw.trim())
            .map_err(|_| AppError::BadRequest(format!("Invalid user id: {}", raw)))?;
        if !team.is_member(&id) {
            return Err(AppError::BadRequest(format!(
                "User {} is not a member of this team",
                raw
            )));
        }
        if !assignees.contains(&id) {
            assignees.push(id);
        }
    }
    Ok(assignees)
}

fn parse_due_date(raw: Option<&str>) -> Result<Option<bson::DateTime>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => parse_client_datetime(raw)
            .map(|dt| Some(bson::DateTime::from_chrono(dt)))
            .ok_or_else(|| AppError::BadRequest(format!("Invalid due date: {}", raw))),
    }
}

pub async fn require_assignment(db: &MongoDb, id: &ObjectId) -> Result<Assignment, AppError> {
    db.get_assignment(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))
}

pub async fn create_assignment(
    db: &MongoDb,
    caller: &ObjectId,
    team_number: i32,
    form: &AssignmentForm,
) -> Result<Assignment, AppError> {
    let team = require_admin(db, team_number, caller).await?;

    let assignment = Assignment {
        id: ObjectId::new(),
        team_number,
        title: form.title.trim().to_string(),
        description: form.description.trim().to_string(),
        assigned_to: resolve_assignees(&team, &form.assigned_to)?,
        status: AssignmentStatus::Pending,
        due_date: parse_due_date(form.due_date.as_deref())?,
        created_by: *caller,
        created_at: bson::DateTime::now(),
        completed_at: None,
        updated_at: None,
        updated_by: None,
    };
    db.insert_assignment(&assignment).await?;

    tracing::info!(team_number, assignment_id = %assignment.id, "Created assignment");
    Ok(assignment)
}

pub async fn update_assignment(
    db: &MongoDb,
    caller: &ObjectId,
    id: &ObjectId,
    form: &AssignmentForm,
) -> Result<Assignment, AppError> {
    let existing = require_assignment(db, id).await?;
    let team = require_admin(db, existing.team_number, caller).await?;

    let assigned_to = resolve_assignees(&team, &form.assigned_to)?;
    let due_date = parse_due_date(form.due_date.as_deref())?;
    let set = doc! {
        "title": form.title.trim(),
        "description": form.description.trim(),
        "assigned_to": assigned_to,
        "due_date": due_date.map(Bson::DateTime).unwrap_or(Bson::Null),
        "updated_at": bson::DateTime::now(),
        "updated_by": *caller,
    };
    let updated = db
        .update_assignment(id, set)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))?;

    // Reminders are rebuilt from the new due date and assignees
    if existing.due_date != updated.due_date || existing.assigned_to != updated.assigned_to {
        db.delete_pending_notifications_for_assignment(id, None).await?;
    }

    tracing::info!(assignment_id = %id, "Updated assignment");
    Ok(updated)
}

/// Change status; only assignees may do this.
pub async fn update_assignment_status(
    db: &MongoDb,
    caller: &ObjectId,
    id: &ObjectId,
    status: AssignmentStatus,
) -> Result<Assignment, AppError> {
    let assignment = require_assignment(db, id).await?;
    if !assignment.is_assigned(caller) {
        return Err(AppError::Forbidden(
            "User is not assigned to this task".to_string(),
        ));
    }

    let now = bson::DateTime::now();
    let mut set = doc! {
        "status": status.as_str(),
        "updated_at": now,
        "updated_by": *caller,
    };
    set.insert(
        "completed_at",
        if status == AssignmentStatus::Completed {
            Bson::DateTime(now)
        } else {
            Bson::Null
        },
    );

    let updated = db
        .update_assignment(id, set)
        .await?
        .ok_or_else(|| AppError::NotFound("Assignment not found".to_string()))?;

    if status == AssignmentStatus::Completed {
        db.delete_pending_notifications_for_assignment(id, Some(caller))
            .await?;
    }
    tracing::info!(assignment_id = %id, status = status.as_str(), "Assignment status changed");
    Ok(updated)
}

pub async fn delete_assignment(
    db: &MongoDb,
    caller: &ObjectId,
    id: &ObjectId,
) -> Result<(), AppError> {
    let assignment = require_assignment(db, id).await?;
    require_admin(db, assignment.team_number, caller).await?;

    db.delete_pending_notifications_for_assignment(id, None).await?;
    db.delete_assignment(id).await?;

    tracing::info!(assignment_id = %id, "Deleted assignment");
    Ok(())
}

pub async fn clear_assignments(
    db: &MongoDb,
    caller: &ObjectId,
    team_number: i32,
) -> Result<u64, AppError> {
    require_admin(db, team_number, caller).await?;

    for assignment in db.list_assignments(team_number).await? {
        db.delete_pending_notifications_for_assignment(&assignment.id, None)
            .await?;
    }
    let deleted = db.delete_team_assignments(team_number).await?;

    tracing::info!(team_number, deleted, "Cleared assignments");
    Ok(deleted)
}

/// Role helper for callers that only need to know whether someone manages
/// the team.
pub fn can_manage(team: &Team, user: &ObjectId) -> bool {
    matches!(team.role_of(user), Some(TeamRole::Owner | TeamRole::Admin))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team(owner: ObjectId, members: &[ObjectId]) -> Team {
        let mut users = vec![owner];
        users.extend_from_slice(members);
        Team {
            id: ObjectId::new(),
            team_number: 334,
            team_join_code: "ABC123".to_string(),
            users,
            admins: vec![owner],
            owner_id: owner,
            created_at: bson::DateTime::now(),
            team_name: None,
            description: String::new(),
        }
    }

    #[test]
    fn test_join_code_shape() {
        let rng = SystemRandom::new();
        for _ in 0..50 {
            let code = generate_join_code(&rng).unwrap();
            assert_eq!(code.len(), JOIN_CODE_LEN);
            assert!(code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[test]
    fn test_join_code_rejects_biased_bytes() {
        // 255 and 252 are rejected; 0 -> 'A', 35 -> '9', 36 -> 'A'
        let mut code = String::new();
        push_code_symbols(&mut code, &[255, 0, 252, 35, 36]);
        assert_eq!(code, "A9A");
        push_code_symbols(&mut code, &[1, 2, 3, 4, 5]);
        assert_eq!(code, "A9ABCD");
    }

    #[test]
    fn test_normalize_join_code() {
        assert_eq!(normalize_join_code(" abc123 "), Some("ABC123".to_string()));
        assert_eq!(normalize_join_code("ABC12"), None);
        assert_eq!(normalize_join_code("ABC12!"), None);
    }

    #[test]
    fn test_resolve_assignees() {
        let owner = ObjectId::new();
        let member = ObjectId::new();
        let team = team(owner, &[member]);

        let ids = vec![member.to_hex(), member.to_hex(), owner.to_hex()];
        assert_eq!(resolve_assignees(&team, &ids).unwrap(), vec![member, owner]);

        let outsider = vec![ObjectId::new().to_hex()];
        assert!(matches!(
            resolve_assignees(&team, &outsider),
            Err(AppError::BadRequest(_))
        ));
        assert!(resolve_assignees(&team, &["nope".to_string()]).is_err());
    }

    #[test]
    fn test_parse_due_date() {
        assert_eq!(parse_due_date(None).unwrap(), None);
        assert_eq!(parse_due_date(Some("  ")).unwrap(), None);
        assert!(parse_due_date(Some("2026-03-14T09:30")).unwrap().is_some());
        assert!(parse_due_date(Some("soon")).is_err());
    }

    #[test]
    fn test_can_manage() {
        let owner = ObjectId::new();
        let member = ObjectId::new();
        let team = team(owner, &[member]);
        assert!(can_manage(&team, &owner));
        assert!(!can_manage(&team, &member));
    }
}
