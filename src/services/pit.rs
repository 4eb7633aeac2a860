// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pit scouting: one entry per scouted robot per scouting team.

use bson::doc;
use validator::Validate;

use crate::db::{MongoDb, PitWithScouter, Viewer};
use crate::error::AppError;
use crate::models::{PitScouting, PitScoutingForm, PitScoutingResponse, Team, User};

fn response(pit: &PitWithScouter, viewer: &User) -> PitScoutingResponse {
    PitScoutingResponse::new(&pit.entry, pit.scouter_name.clone(), pit.scouter_team, &viewer.id)
}

/// The visible entry for `team_number`, preferring the caller's own.
async fn find_visible(
    db: &MongoDb,
    user: &User,
    team_number: i32,
) -> Result<PitWithScouter, AppError> {
    let mut found = db
        .visible_pit(&Viewer::from(user), doc! { "team_number": team_number })
        .await?;
    let idx = found
        .iter()
        .position(|p| p.entry.scouter_id == user.id)
        .unwrap_or(0);
    if found.is_empty() {
        return Err(AppError::NotFound(format!(
            "No pit scouting data for team {}",
            team_number
        )));
    }
    Ok(found.swap_remove(idx))
}

/// Whether `caller` may edit a pit entry: its scouter, or an admin of the
/// team the scouter belongs to.
pub fn may_edit(pit: &PitWithScouter, caller: &User, team: Option<&Team>) -> bool {
    if pit.entry.scouter_id == caller.id {
        return true;
    }
    match (caller.team_number, pit.scouter_team, team) {
        (Some(mine), Some(theirs), Some(team)) => {
            mine == theirs && team.team_number == mine && team.is_admin(&caller.id)
        }
        _ => false,
    }
}

pub async fn add_pit(
    db: &MongoDb,
    user: &User,
    form: &PitScoutingForm,
) -> Result<PitScoutingResponse, AppError> {
    form.validate()?;

    let existing = db
        .visible_pit(&Viewer::from(user), doc! { "team_number": form.team_number })
        .await?;
    if !existing.is_empty() {
        tracing::warn!(
            team_number = form.team_number,
            scouting_team = ?user.team_number,
            "Team already pit scouted"
        );
        return Err(AppError::Conflict(format!(
            "Team {} has already been pit scouted by your team",
            form.team_number
        )));
    }

    let entry = PitScouting::from_form(form, user.id, bson::DateTime::now());
    db.insert_pit(&entry).await?;

    tracing::info!(team_number = entry.team_number, scouter = %user.id, "Added pit scouting entry");
    Ok(PitScoutingResponse::new(
        &entry,
        Some(user.username.clone()),
        user.team_number,
        &user.id,
    ))
}

pub async fn list_pit(db: &MongoDb, user: &User) -> Result<Vec<PitScoutingResponse>, AppError> {
    let entries = db.visible_pit(&Viewer::from(user), doc! {}).await?;
    Ok(entries.iter().map(|p| response(p, user)).collect())
}

pub async fn get_pit(
    db: &MongoDb,
    user: &User,
    team_number: i32,
) -> Result<PitScoutingResponse, AppError> {
    let pit = find_visible(db, user, team_number).await?;
    Ok(response(&pit, user))
}

pub async fn edit_pit(
    db: &MongoDb,
    user: &User,
    team_number: i32,
    form: &PitScoutingForm,
) -> Result<PitScoutingResponse, AppError> {
    form.validate()?;

    let mut pit = find_visible(db, user, team_number).await?;
    let team = match user.team_number {
        Some(n) => db.get_team(n).await?,
        None => None,
    };
    if !may_edit(&pit, user, team.as_ref()) {
        return Err(AppError::Forbidden(
            "You don't have permission to edit this data".to_string(),
        ));
    }

    pit.entry.apply_form(form);
    pit.entry.updated_at = Some(bson::DateTime::now());
    if !db.replace_pit(&pit.entry).await? {
        return Err(AppError::NotFound("Pit scouting data not found".to_string()));
    }

    tracing::info!(team_number, edited_by = %user.id, "Updated pit scouting entry");
    Ok(response(&pit, user))
}

/// Delete the caller's own pit entry for `team_number`.
pub async fn delete_pit(db: &MongoDb, user: &User, team_number: i32) -> Result<(), AppError> {
    let pit = find_visible(db, user, team_number).await?;
    if pit.entry.scouter_id != user.id {
        return Err(AppError::Forbidden(
            "Only the original scouter can delete this data".to_string(),
        ));
    }

    db.delete_pit(&pit.entry.id).await?;
    tracing::info!(team_number, scouter = %user.id, "Deleted pit scouting entry");
    Ok(())
}
