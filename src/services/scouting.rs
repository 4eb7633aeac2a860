// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Match scouting entries, stats and leaderboards.

use bson::doc;
use bson::oid::ObjectId;
use serde::Serialize;
use validator::Validate;

use crate::db::{MongoDb, Viewer};
use crate::error::AppError;
use crate::models::scouting::{group_matches, AutoPath, MatchGroup, TeamPath};
use crate::models::{
    Alliance, LeaderboardEntry, LeaderboardSort, ScouterLeaderboardEntry, ScouterSort,
    ScoutingForm, Team, TeamData, TeamStats, User,
};

/// Robots on one alliance in a match.
pub const ALLIANCE_SIZE: usize = 3;

/// Check that `team_number` can be recorded on `alliance` given the entries
/// already scouted for the same event and match.
///
/// `editing` is the id of the entry being replaced, which doesn't count
/// against the limits.
pub fn check_match_slot(
    existing: &[TeamData],
    team_number: i32,
    alliance: Alliance,
    editing: Option<&ObjectId>,
) -> Result<(), AppError> {
    let others = existing.iter().filter(|e| Some(&e.id) != editing);

    let mut on_alliance = 0;
    for entry in others {
        if entry.team_number == team_number {
            return Err(AppError::Conflict(format!(
                "Team {} has already been scouted in match {}",
                team_number, entry.match_number
            )));
        }
        if entry.alliance == alliance {
            on_alliance += 1;
        }
    }

    if on_alliance >= ALLIANCE_SIZE {
        return Err(AppError::Conflict(format!(
            "The {} alliance already has {} robots in this match",
            alliance.as_str(),
            ALLIANCE_SIZE
        )));
    }
    Ok(())
}

/// Whether `caller` may delete `entry`.
///
/// The original scouter always may; otherwise the caller must administer
/// the team both they and the scouter belong to.
pub fn may_delete(
    entry: &TeamData,
    caller: &User,
    scouter_team: Option<i32>,
    team: Option<&Team>,
) -> bool {
    if entry.scouter_id == caller.id {
        return true;
    }
    match (caller.team_number, scouter_team, team) {
        (Some(mine), Some(theirs), Some(team)) => {
            mine == theirs && team.team_number == mine && team.is_admin(&caller.id)
        }
        _ => false,
    }
}

async fn match_entries(
    db: &MongoDb,
    viewer: &Viewer,
    event_code: &str,
    match_number: i32,
) -> Result<Vec<TeamData>, AppError> {
    db.visible_team_data(
        viewer,
        doc! { "event_code": event_code, "match_number": match_number },
        doc! { "created_at": 1 },
    )
    .await
}

pub async fn add_entry(
    db: &MongoDb,
    user: &User,
    form: &ScoutingForm,
) -> Result<TeamData, AppError> {
    form.validate()?;
    let viewer = Viewer::from(user);

    let entry = TeamData::from_form(
        form,
        user.id,
        &user.username,
        user.team_number,
        bson::DateTime::now(),
    );
    let existing = match_entries(db, &viewer, &entry.event_code, entry.match_number).await?;
    check_match_slot(&existing, entry.team_number, entry.alliance, None)?;

    db.insert_team_data(&entry).await?;
    tracing::info!(
        entry_id = %entry.id,
        team_number = entry.team_number,
        match_number = entry.match_number,
        event_code = %entry.event_code,
        scouter = %user.id,
        "Added scouting entry"
    );
    Ok(entry)
}

/// Every entry the user may see, newest first.
pub async fn list_entries(db: &MongoDb, user: &User) -> Result<Vec<TeamData>, AppError> {
    db.visible_team_data(&Viewer::from(user), doc! {}, doc! { "created_at": -1 })
        .await
}

pub async fn get_entry(db: &MongoDb, user: &User, id: &ObjectId) -> Result<TeamData, AppError> {
    db.visible_team_data(&Viewer::from(user), doc! { "_id": id }, doc! { "_id": 1 })
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Scouting entry not found".to_string()))
}

pub async fn edit_entry(
    db: &MongoDb,
    user: &User,
    id: &ObjectId,
    form: &ScoutingForm,
) -> Result<TeamData, AppError> {
    form.validate()?;
    let mut entry = db
        .get_team_data(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Scouting entry not found".to_string()))?;
    if entry.scouter_id != user.id {
        return Err(AppError::Forbidden(
            "Only the original scouter can edit this entry".to_string(),
        ));
    }

    entry.apply_form(form);
    let existing =
        match_entries(db, &Viewer::from(user), &entry.event_code, entry.match_number).await?;
    check_match_slot(&existing, entry.team_number, entry.alliance, Some(id))?;

    entry.updated_at = Some(bson::DateTime::now());
    if !db.replace_team_data(&entry).await? {
        return Err(AppError::NotFound("Scouting entry not found".to_string()));
    }

    tracing::info!(entry_id = %id, "Updated scouting entry");
    Ok(entry)
}

pub async fn delete_entry(db: &MongoDb, user: &User, id: &ObjectId) -> Result<(), AppError> {
    let entry = db
        .get_team_data(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Scouting entry not found".to_string()))?;

    let allowed = if entry.scouter_id == user.id {
        true
    } else {
        let scouter_team = db.get_user(&entry.scouter_id).await?.and_then(|u| u.team_number);
        let team = match user.team_number {
            Some(n) => db.get_team(n).await?,
            None => None,
        };
        may_delete(&entry, user, scouter_team, team.as_ref())
    };
    if !allowed {
        tracing::warn!(entry_id = %id, user_id = %user.id, "Denied scouting entry deletion");
        return Err(AppError::Forbidden(
            "You do not have permission to delete this entry".to_string(),
        ));
    }

    db.delete_team_data(id).await?;
    tracing::info!(entry_id = %id, deleted_by = %user.id, "Deleted scouting entry");
    Ok(())
}

/// Visible entries grouped by event and match.
pub async fn matches(db: &MongoDb, user: &User) -> Result<Vec<MatchGroup>, AppError> {
    let entries = db
        .visible_team_data(
            &Viewer::from(user),
            doc! {},
            doc! { "event_code": 1, "match_number": 1 },
        )
        .await?;
    Ok(group_matches(&entries, &user.id))
}

pub async fn team_stats(
    db: &MongoDb,
    user: &User,
    team_number: i32,
) -> Result<TeamStats, AppError> {
    let entries = db
        .visible_team_data(
            &Viewer::from(user),
            doc! { "team_number": team_number },
            doc! { "match_number": 1 },
        )
        .await?;
    Ok(TeamStats::from_entries(team_number, &entries))
}

/// Stats for two or three robots side by side.
pub async fn compare(db: &MongoDb, user: &User, teams: &[i32]) -> Result<Vec<TeamStats>, AppError> {
    let mut unique: Vec<i32> = Vec::with_capacity(teams.len());
    for team in teams {
        if !unique.contains(team) {
            unique.push(*team);
        }
    }
    if unique.len() < 2 {
        return Err(AppError::BadRequest("At least 2 teams are required".to_string()));
    }
    if unique.len() > 3 {
        return Err(AppError::BadRequest("At most 3 teams can be compared".to_string()));
    }

    let entries = db
        .visible_team_data(
            &Viewer::from(user),
            doc! { "team_number": { "$in": &unique } },
            doc! { "match_number": 1 },
        )
        .await?;
    Ok(unique
        .iter()
        .map(|team| TeamStats::from_entries(*team, &entries))
        .collect())
}

pub async fn leaderboard(
    db: &MongoDb,
    user: &User,
    sort: LeaderboardSort,
) -> Result<Vec<LeaderboardEntry>, AppError> {
    db.leaderboard(&Viewer::from(user), sort).await
}

/// Scouter rankings plus the values available for the filter menus.
#[derive(Debug, Serialize)]
pub struct ScouterLeaderboard {
    pub scouters: Vec<ScouterLeaderboardEntry>,
    pub events: Vec<String>,
    pub teams: Vec<i32>,
    pub sort: ScouterSort,
}

pub async fn scouter_leaderboard(
    db: &MongoDb,
    sort: ScouterSort,
    event: Option<&str>,
    team: Option<i32>,
) -> Result<ScouterLeaderboard, AppError> {
    Ok(ScouterLeaderboard {
        scouters: db.scouter_leaderboard(sort, event, team).await?,
        events: db.scouted_events().await?,
        teams: db.scouting_teams().await?,
        sort,
    })
}

/// Auto paths for a robot from visible entries, newest match first.
pub async fn team_paths(
    db: &MongoDb,
    user: &User,
    team_number: i32,
) -> Result<Vec<TeamPath>, AppError> {
    let entries = db
        .visible_team_data(
            &Viewer::from(user),
            doc! { "team_number": team_number, "auto_path": { "$exists": true, "$ne": "" } },
            doc! { "match_number": -1 },
        )
        .await?;
    Ok(entries.iter().map(TeamPath::from).collect())
}

pub async fn auto_paths(db: &MongoDb, team_number: i32) -> Result<Vec<AutoPath>, AppError> {
    Ok(db
        .auto_paths(team_number)
        .await?
        .into_iter()
        .map(|e| AutoPath {
            match_number: e.match_number,
            event_code: e.event_code,
            image_data: e.auto_path,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scouting::tests::sample_entry;

    fn user(team_number: Option<i32>) -> User {
        User {
            id: ObjectId::new(),
            username: "scout".to_string(),
            email: "scout@example.com".to_string(),
            team_number,
            password_hash: String::new(),
            created_at: bson::DateTime::now(),
            last_login: None,
            description: String::new(),
            failed_password_change_attempts: 0,
            last_failed_password_change: None,
            password_changed_at: None,
        }
    }

    fn team_with_admin(team_number: i32, admin: ObjectId) -> Team {
        Team {
            id: ObjectId::new(),
            team_number,
            team_join_code: "ABC123".to_string(),
            users: vec![admin],
            admins: vec![admin],
            owner_id: ObjectId::new(),
            created_at: bson::DateTime::now(),
            team_name: None,
            description: String::new(),
        }
    }

    #[test]
    fn test_fourth_robot_on_alliance_rejected() {
        let existing = vec![
            sample_entry(1, 5, Alliance::Red),
            sample_entry(2, 5, Alliance::Red),
            sample_entry(3, 5, Alliance::Red),
        ];
        let err = check_match_slot(&existing, 4, Alliance::Red, None).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // The other alliance still has room
        assert!(check_match_slot(&existing, 4, Alliance::Blue, None).is_ok());
    }

    #[test]
    fn test_duplicate_robot_rejected() {
        let existing = vec![sample_entry(254, 5, Alliance::Blue)];
        assert!(check_match_slot(&existing, 254, Alliance::Red, None).is_err());
    }

    #[test]
    fn test_edit_does_not_count_itself() {
        let existing = vec![
            sample_entry(1, 5, Alliance::Red),
            sample_entry(2, 5, Alliance::Red),
            sample_entry(3, 5, Alliance::Red),
        ];
        let editing = existing[2].id;
        assert!(check_match_slot(&existing, 3, Alliance::Red, Some(&editing)).is_ok());
        assert!(check_match_slot(&existing, 9, Alliance::Red, Some(&editing)).is_ok());
    }

    #[test]
    fn test_scouter_may_delete_own_entry() {
        let scouter = user(None);
        let mut entry = sample_entry(254, 1, Alliance::Red);
        entry.scouter_id = scouter.id;
        assert!(may_delete(&entry, &scouter, None, None));
    }

    #[test]
    fn test_admin_of_shared_team_may_delete() {
        let admin = user(Some(334));
        let team = team_with_admin(334, admin.id);
        let entry = sample_entry(254, 1, Alliance::Red);

        assert!(may_delete(&entry, &admin, Some(334), Some(&team)));
        // Scouter on a different team
        assert!(!may_delete(&entry, &admin, Some(1678), Some(&team)));
    }

    #[test]
    fn test_non_admin_may_not_delete() {
        let member = user(Some(334));
        let team = team_with_admin(334, ObjectId::new());
        let entry = sample_entry(254, 1, Alliance::Red);
        assert!(!may_delete(&entry, &member, Some(334), Some(&team)));
        assert!(!may_delete(&entry, &member, Some(334), None));
    }

    #[tokio::test]
    async fn test_compare_needs_two_distinct_teams() {
        let db = MongoDb::new_mock();
        let result = compare(&db, &user(Some(334)), &[254, 254]).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_add_entry_validates_before_db() {
        let db = MongoDb::new_mock();
        let mut form = crate::models::scouting::tests::sample_form();
        form.climb_level = 7;
        let result = add_entry(&db, &user(Some(334)), &form).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
