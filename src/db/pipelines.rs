// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Aggregation pipeline builders.
//!
//! Kept free of I/O so the stage layout can be unit tested.

use bson::oid::ObjectId;
use bson::{doc, Bson, Document};

use crate::db::collections;
use crate::models::{LeaderboardSort, ScouterSort, User};

/// Who is asking; decides which scouting data is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: ObjectId,
    pub team_number: Option<i32>,
}

impl From<&User> for Viewer {
    fn from(user: &User) -> Self {
        Viewer {
            user_id: user.id,
            team_number: user.team_number,
        }
    }
}

/// `$lookup` + `$unwind` joining each document with its scouter.
fn scouter_lookup() -> [Document; 2] {
    [
        doc! {
            "$lookup": {
                "from": collections::USERS,
                "localField": "scouter_id",
                "foreignField": "_id",
                "as": "scouter",
            }
        },
        doc! {
            "$unwind": {
                "path": "$scouter",
                "preserveNullAndEmptyArrays": true,
            }
        },
    ]
}

/// Filter for documents a viewer may see: anything scouted by a member of
/// their team, plus their own entries.
pub fn visibility_match(viewer: &Viewer) -> Document {
    match viewer.team_number {
        Some(team) => doc! {
            "$or": [
                { "scouter.teamNumber": team },
                { "scouter_id": viewer.user_id },
            ]
        },
        None => doc! { "scouter_id": viewer.user_id },
    }
}

/// Stages selecting `filter` documents visible to `viewer`.
///
/// The joined scouter is reduced to `scouter_username` and
/// `scouter_team_number` so the result still decodes as the stored model.
pub fn visible(viewer: &Viewer, filter: Document) -> Vec<Document> {
    let mut stages = Vec::with_capacity(6);
    if !filter.is_empty() {
        stages.push(doc! { "$match": filter });
    }
    stages.extend(scouter_lookup());
    stages.push(doc! { "$match": visibility_match(viewer) });
    stages.push(doc! {
        "$addFields": {
            "scouter_username": "$scouter.username",
            "scouter_team_number": "$scouter.teamNumber",
        }
    });
    stages.push(doc! { "$project": { "scouter": 0 } });
    stages
}

fn fuel(field: &str) -> Bson {
    Bson::Document(doc! { "$ifNull": [format!("${}", field), 0] })
}

fn teleop_fuel() -> Document {
    doc! {
        "$add": [
            fuel("teleop_shift_1_fuel"),
            fuel("teleop_shift_2_fuel"),
            fuel("teleop_shift_3_fuel"),
            fuel("teleop_shift_4_fuel"),
        ]
    }
}

fn total_fuel() -> Document {
    doc! {
        "$add": [
            fuel("auto_fuel"),
            fuel("transition_fuel"),
            teleop_fuel(),
            fuel("endgame_fuel"),
        ]
    }
}

/// Per-robot leaderboard over the entries visible to `viewer`.
pub fn leaderboard(viewer: &Viewer, sort: LeaderboardSort) -> Vec<Document> {
    let mut stages = visible(viewer, Document::new());
    stages.push(doc! {
        "$group": {
            "_id": "$team_number",
            "matches_scouted": { "$sum": 1 },
            "avg_auto_fuel": { "$avg": fuel("auto_fuel") },
            "avg_teleop_fuel": { "$avg": teleop_fuel() },
            "avg_total_fuel": { "$avg": total_fuel() },
            "max_total_fuel": { "$max": total_fuel() },
            "climbs": {
                "$sum": { "$cond": [{ "$eq": ["$climb_success", true] }, 1, 0] }
            },
            "avg_defense_rating": { "$avg": { "$ifNull": ["$defense_rating", 1] } },
        }
    });
    stages.push(doc! {
        "$project": {
            "matches_scouted": 1,
            "max_total_fuel": 1,
            "avg_auto_fuel": { "$round": ["$avg_auto_fuel", 2] },
            "avg_teleop_fuel": { "$round": ["$avg_teleop_fuel", 2] },
            "avg_total_fuel": { "$round": ["$avg_total_fuel", 2] },
            "avg_defense_rating": { "$round": ["$avg_defense_rating", 2] },
            "climb_success_rate": {
                "$round": [
                    { "$multiply": [{ "$divide": ["$climbs", "$matches_scouted"] }, 100] },
                    2,
                ]
            },
        }
    });
    let mut order = Document::new();
    order.insert(sort.field(), -1);
    order.insert("_id", 1);
    stages.push(doc! { "$sort": order });
    stages
}

/// Per-scouter entry counts across all scouting data.
///
/// `event` limits to one event code; `team` limits to scouters currently on
/// that team.
pub fn scouter_leaderboard(
    sort: ScouterSort,
    event: Option<&str>,
    team: Option<i32>,
) -> Vec<Document> {
    let mut stages = Vec::new();
    if let Some(event) = event {
        stages.push(doc! { "$match": { "event_code": event } });
    }
    stages.extend(scouter_lookup());
    // Entries whose scouter was deleted don't count
    stages.push(doc! { "$match": { "scouter._id": { "$exists": true } } });
    if let Some(team) = team {
        stages.push(doc! { "$match": { "scouter.teamNumber": team } });
    }
    stages.push(doc! {
        "$group": {
            "_id": "$scouter._id",
            "username": { "$first": "$scouter.username" },
            "teamNumber": { "$first": "$scouter.teamNumber" },
            "match_count": { "$sum": 1 },
            "unique_teams": { "$addToSet": "$team_number" },
        }
    });
    stages.push(doc! {
        "$project": {
            "username": 1,
            "teamNumber": 1,
            "match_count": 1,
            "unique_teams_count": { "$size": "$unique_teams" },
        }
    });
    let mut order = Document::new();
    order.insert(sort.field(), -1);
    order.insert("username", 1);
    stages.push(doc! { "$sort": order });
    stages
}

/// Distinct event codes, sorted.
pub fn scouted_events() -> Vec<Document> {
    vec![
        doc! { "$group": { "_id": "$event_code" } },
        doc! { "$sort": { "_id": 1 } },
    ]
}

/// Distinct teams of scouters who have entries, sorted.
pub fn scouting_teams() -> Vec<Document> {
    let mut stages: Vec<Document> = scouter_lookup().into();
    stages.push(doc! {
        "$match": { "scouter.teamNumber": { "$exists": true, "$ne": Bson::Null } }
    });
    stages.push(doc! { "$group": { "_id": "$scouter.teamNumber" } });
    stages.push(doc! { "$sort": { "_id": 1 } });
    stages
}
