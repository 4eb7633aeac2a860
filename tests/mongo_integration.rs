// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MongoDB integration tests.
//!
//! These tests require a reachable MongoDB server.
//! Run with: MONGODB_TEST_URI=mongodb://localhost:27017 cargo test
//!
//! Each test gets its own freshly named database.

use bson::oid::ObjectId;
use castle_scouting::config::Config;
use castle_scouting::db::MongoDb;
use castle_scouting::error::AppError;
use castle_scouting::models::assignment::AssignmentForm;
use castle_scouting::models::notification::{PushKeys, SubscribeRequest};
use castle_scouting::models::{
    AssignmentStatus, PitScoutingForm, PushSubscription, ScoutingForm, User,
};
use castle_scouting::services::accounts::{self, NewAccount};
use castle_scouting::services::{notifications, pit, scouting, teams};
use chrono::{Duration, Utc};
use serde_json::json;

mod common;

async fn register(db: &MongoDb, name: &str) -> User {
    let config = Config::test_default();
    let email = format!("{}@example.com", name);
    accounts::register(
        db,
        &config,
        NewAccount {
            email: &email,
            username: name,
            password: "password123",
            confirm_password: "password123",
            team_passcode: common::ACCESS_CODE,
        },
    )
    .await
    .unwrap()
}

async fn reload(db: &MongoDb, user: &User) -> User {
    accounts::current_user(db, &user.id).await.unwrap()
}

fn match_form(team_number: i32, match_number: i32, alliance: &str) -> ScoutingForm {
    serde_json::from_value(json!({
        "team_number": team_number,
        "match_number": match_number,
        "event_code": "2026test",
        "alliance": alliance,
        "auto_fuel": 4,
        "teleop_shift_1_fuel": 6,
        "climb_level": 2,
        "climb_success": true,
    }))
    .unwrap()
}

fn pit_form(team_number: i32) -> PitScoutingForm {
    serde_json::from_value(json!({ "team_number": team_number, "notes": "swerve" })).unwrap()
}

/// Owner and member of team 1234, plus a user without a team.
async fn setup_team(db: &MongoDb) -> (User, User, User) {
    let owner = register(db, "owner").await;
    let member = register(db, "member").await;
    let outsider = register(db, "outsider").await;

    let team = teams::create_team(db, &owner, 1234, Some("Robo".into()), None)
        .await
        .unwrap();
    teams::join_team(db, &member, &team.team_join_code.to_lowercase())
        .await
        .unwrap();

    (reload(db, &owner).await, reload(db, &member).await, outsider)
}

// ═══════════════════════════════════════════════════════════════════════════
// ACCOUNTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_register_and_login() {
    require_mongo!();
    let db = common::test_db().await;
    let config = Config::test_default();

    let user = register(&db, "scout").await;
    let logged_in = accounts::login(
        &db,
        &config,
        "SCOUT@example.com",
        "password123",
        common::ACCESS_CODE,
    )
    .await
    .unwrap();
    assert_eq!(logged_in.id, user.id);
    assert!(logged_in.last_login.is_some());

    let wrong = accounts::login(&db, &config, "scout", "password124", common::ACCESS_CODE).await;
    assert!(matches!(wrong, Err(AppError::InvalidCredentials)));

    let duplicate = accounts::register(
        &db,
        &config,
        NewAccount {
            email: "scout@example.com",
            username: "other",
            password: "password123",
            confirm_password: "password123",
            team_passcode: common::ACCESS_CODE,
        },
    )
    .await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    let same_username = accounts::register(
        &db,
        &config,
        NewAccount {
            email: "another@example.com",
            username: "scout",
            password: "password123",
            confirm_password: "password123",
            team_passcode: common::ACCESS_CODE,
        },
    )
    .await;
    assert!(matches!(same_username, Err(AppError::Conflict(_))));
}

// ═══════════════════════════════════════════════════════════════════════════
// TEAMS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_team_membership_rules() {
    require_mongo!();
    let db = common::test_db().await;
    let (owner, member, outsider) = setup_team(&db).await;
    assert_eq!(owner.team_number, Some(1234));
    assert_eq!(member.team_number, Some(1234));

    let taken = teams::create_team(&db, &outsider, 1234, None, None).await;
    assert!(matches!(taken, Err(AppError::Conflict(_))));

    let bad_code = teams::join_team(&db, &outsider, "ZZZZZZ").await;
    assert!(matches!(bad_code, Err(AppError::NotFound(_))));

    let owner_leaves = teams::leave_team(&db, &owner.id, 1234).await;
    assert!(matches!(owner_leaves, Err(AppError::Conflict(_))));

    let member_deletes = teams::delete_team(&db, &member.id, 1234).await;
    assert!(matches!(member_deletes, Err(AppError::Forbidden(_))));

    let team = teams::add_admin(&db, &owner.id, 1234, &member.id).await.unwrap();
    assert!(team.is_admin(&member.id));

    teams::delete_team(&db, &owner.id, 1234).await.unwrap();
    assert_eq!(reload(&db, &member).await.team_number, None);
    assert!(db.get_team(1234).await.unwrap().is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// SCOUTING
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_entries_visible_to_team_only() {
    require_mongo!();
    let db = common::test_db().await;
    let (owner, member, outsider) = setup_team(&db).await;

    let entry = scouting::add_entry(&db, &owner, &match_form(254, 1, "red"))
        .await
        .unwrap();

    let seen = scouting::list_entries(&db, &member).await.unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].id, entry.id);

    assert!(scouting::list_entries(&db, &outsider).await.unwrap().is_empty());
    let hidden = scouting::get_entry(&db, &outsider, &entry.id).await;
    assert!(matches!(hidden, Err(AppError::NotFound(_))));

    // Only the scouter may edit
    let edit = scouting::edit_entry(&db, &member, &entry.id, &match_form(254, 1, "red")).await;
    assert!(matches!(edit, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn test_match_slot_conflicts() {
    require_mongo!();
    let db = common::test_db().await;
    let (owner, member, _) = setup_team(&db).await;

    scouting::add_entry(&db, &owner, &match_form(254, 3, "red"))
        .await
        .unwrap();
    let duplicate = scouting::add_entry(&db, &member, &match_form(254, 3, "blue")).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    scouting::add_entry(&db, &member, &match_form(1678, 3, "red"))
        .await
        .unwrap();
    scouting::add_entry(&db, &member, &match_form(971, 3, "red"))
        .await
        .unwrap();
    let full = scouting::add_entry(&db, &owner, &match_form(118, 3, "red")).await;
    assert!(matches!(full, Err(AppError::Conflict(_))));

    let groups = scouting::matches(&db, &owner).await.unwrap();
    assert_eq!(groups.len(), 1);
}

#[tokio::test]
async fn test_team_stats_and_compare() {
    require_mongo!();
    let db = common::test_db().await;
    let (owner, member, _) = setup_team(&db).await;

    scouting::add_entry(&db, &owner, &match_form(254, 1, "red"))
        .await
        .unwrap();
    scouting::add_entry(&db, &member, &match_form(254, 2, "blue"))
        .await
        .unwrap();
    scouting::add_entry(&db, &member, &match_form(1678, 2, "red"))
        .await
        .unwrap();

    let stats = scouting::team_stats(&db, &owner, 254).await.unwrap();
    assert_eq!(stats.matches_scouted, 2);
    assert!((stats.avg_auto_fuel - 4.0).abs() < 1e-9);
    assert!((stats.avg_total_fuel - 10.0).abs() < 1e-9);
    assert!((stats.climb_success_rate - 100.0).abs() < 1e-9);

    let compared = scouting::compare(&db, &owner, &[254, 1678]).await.unwrap();
    assert_eq!(compared.len(), 2);
    assert_eq!(compared[1].matches_scouted, 1);
}

#[tokio::test]
async fn test_pit_one_visible_entry_per_team() {
    require_mongo!();
    let db = common::test_db().await;
    let (owner, member, outsider) = setup_team(&db).await;

    pit::add_pit(&db, &owner, &pit_form(254)).await.unwrap();
    let duplicate = pit::add_pit(&db, &member, &pit_form(254)).await;
    assert!(matches!(duplicate, Err(AppError::Conflict(_))));

    // Not visible to the outsider, so they may record their own
    pit::add_pit(&db, &outsider, &pit_form(254)).await.unwrap();

    assert_eq!(pit::list_pit(&db, &member).await.unwrap().len(), 1);
    let delete = pit::delete_pit(&db, &member, 254).await;
    assert!(delete.is_err());
}

// ═══════════════════════════════════════════════════════════════════════════
// ASSIGNMENTS / NOTIFICATIONS
// ═══════════════════════════════════════════════════════════════════════════

fn subscription() -> SubscribeRequest {
    SubscribeRequest {
        subscription: PushSubscription {
            endpoint: "https://push.example.com/send/abc".to_string(),
            keys: PushKeys {
                p256dh: "BAAA".to_string(),
                auth: "AAAA".to_string(),
            },
        },
    }
}

#[tokio::test]
async fn test_assignment_reminder_lifecycle() {
    require_mongo!();
    let db = common::test_db().await;
    let (owner, member, _) = setup_team(&db).await;

    let due = Utc::now() + Duration::days(2);
    let form = AssignmentForm {
        title: "Scout qualification matches".to_string(),
        description: String::new(),
        assigned_to: vec![member.id.to_hex()],
        due_date: Some(due.to_rfc3339()),
    };
    let assignment = teams::create_assignment(&db, &owner.id, 1234, &form)
        .await
        .unwrap();

    // Members cannot create assignments
    let denied = teams::create_assignment(&db, &member.id, 1234, &form).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    notifications::subscribe(&db, &member, &subscription()).await.unwrap();
    let scheduled = notifications::subscribe_assignment(&db, &member, &assignment.id, 60)
        .await
        .unwrap();
    assert!(scheduled);
    assert_eq!(
        db.pending_notifications_for_user(&member.id)
            .await
            .unwrap()
            .len(),
        1
    );

    // The owner is not an assignee
    let not_assigned = teams::update_assignment_status(
        &db,
        &owner.id,
        &assignment.id,
        AssignmentStatus::Completed,
    )
    .await;
    assert!(matches!(not_assigned, Err(AppError::Forbidden(_))));

    let done = teams::update_assignment_status(
        &db,
        &member.id,
        &assignment.id,
        AssignmentStatus::Completed,
    )
    .await
    .unwrap();
    assert!(done.completed_at.is_some());
    assert!(db
        .pending_notifications_for_user(&member.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_assignment_requires_team_members() {
    require_mongo!();
    let db = common::test_db().await;
    let (owner, _, outsider) = setup_team(&db).await;

    let form = AssignmentForm {
        title: "Pit interviews".to_string(),
        description: String::new(),
        assigned_to: vec![outsider.id.to_hex(), ObjectId::new().to_hex()],
        due_date: None,
    };
    let result = teams::create_assignment(&db, &owner.id, 1234, &form).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_subscription_filed_under_callers_team() {
    require_mongo!();
    let db = common::test_db().await;
    let (_, member, outsider) = setup_team(&db).await;

    // A team number in the body is not taken at face value
    let req: SubscribeRequest = serde_json::from_value(json!({
        "subscription": {
            "endpoint": "https://push.example.com/send/xyz",
            "keys": { "p256dh": "BAAA", "auth": "AAAA" },
        },
        "team_number": 1234,
    }))
    .unwrap();

    let sub = notifications::subscribe(&db, &outsider, &req).await.unwrap();
    assert_eq!(sub.team_number, None);

    let sub = notifications::subscribe(&db, &member, &req).await.unwrap();
    assert_eq!(sub.team_number, Some(1234));
}
