// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MongoDB client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users and teams (accounts, membership)
//! - Match and pit scouting entries
//! - Assignments
//! - Notification subscriptions and scheduled notifications

use std::future::IntoFuture;
use std::time::Duration;

use bson::oid::ObjectId;
use bson::{doc, Bson, Document};
use futures_util::TryStreamExt;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::pipelines::{self, Viewer};
use crate::db::retry::{with_retry, RetryPolicy};
use crate::db::collections;
use crate::error::AppError;
use crate::models::notification::{AssignmentReminder, SUBSCRIPTION_EXPIRED};
use crate::models::{
    Assignment, LeaderboardEntry, LeaderboardSort, NotificationStatus, NotificationSubscription,
    PitScouting, PushSubscription, ScheduledNotification, ScouterLeaderboardEntry, ScouterSort,
    Team, TeamData, User,
};

/// Duplicate key error code.
const DUPLICATE_KEY: i32 = 11000;

/// Map a driver error, turning unique index violations into conflicts.
fn map_write_error(err: mongodb::error::Error, what: &str) -> AppError {
    let duplicate = match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    };
    if duplicate {
        AppError::Conflict(format!("{} already exists", what))
    } else {
        AppError::from(err)
    }
}

/// A pit entry along with the scouter who recorded it.
#[derive(Debug, Clone)]
pub struct PitWithScouter {
    pub entry: PitScouting,
    pub scouter_name: Option<String>,
    pub scouter_team: Option<i32>,
}

/// MongoDB database handle.
#[derive(Clone)]
pub struct MongoDb {
    database: Option<Database>,
    retry: RetryPolicy,
}

impl MongoDb {
    /// Connect and verify the server is reachable.
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| AppError::Database(format!("Invalid MongoDB URI: {}", e)))?;
        options.app_name = Some("castle-scouting".to_string());
        options.max_pool_size = Some(50);
        options.min_pool_size = Some(5);
        options.server_selection_timeout = Some(Duration::from_secs(5));
        options.connect_timeout = Some(Duration::from_secs(5));
        options.retry_writes = Some(true);

        let client = Client::with_options(options)
            .map_err(|e| AppError::Database(format!("Failed to create MongoDB client: {}", e)))?;
        let database = client.database(database);

        let retry = RetryPolicy::default();
        with_retry(retry, "ping", || database.run_command(doc! { "ping": 1 }).into_future())
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        tracing::info!(database = database.name(), "Connected to MongoDB");

        Ok(Self {
            database: Some(database),
            retry,
        })
    }

    /// Create a mock client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self {
            database: None,
            retry: RetryPolicy::default(),
        }
    }

    fn get_database(&self) -> Result<&Database, AppError> {
        self.database
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    fn coll<T: Send + Sync>(&self, name: &str) -> Result<Collection<T>, AppError> {
        Ok(self.get_database()?.collection::<T>(name))
    }

    /// Insert one document; `what` names it in conflict errors.
    async fn insert<T: Serialize + Send + Sync>(
        &self,
        collection: &str,
        value: &T,
        what: &str,
        op_name: &str,
    ) -> Result<(), AppError> {
        let coll = self.coll::<T>(collection)?;
        with_retry(self.retry, op_name, || coll.insert_one(value).into_future())
            .await
            .map_err(|e| map_write_error(e, what))?;
        Ok(())
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: Document,
        op_name: &str,
    ) -> Result<u64, AppError> {
        let coll = self.coll::<Document>(collection)?;
        let result = with_retry(self.retry, op_name, || {
            coll.delete_one(filter.clone()).into_future()
        })
        .await?;
        Ok(result.deleted_count)
    }

    async fn delete_all(
        &self,
        collection: &str,
        filter: Document,
        op_name: &str,
    ) -> Result<u64, AppError> {
        let coll = self.coll::<Document>(collection)?;
        let result = with_retry(self.retry, op_name, || {
            coll.delete_many(filter.clone()).into_future()
        })
        .await?;
        Ok(result.deleted_count)
    }

    /// Run an aggregation and decode each result document.
    async fn aggregate<T: DeserializeOwned>(
        &self,
        collection: &str,
        pipeline: Vec<Document>,
        op_name: &str,
    ) -> Result<Vec<T>, AppError> {
        let coll = self.coll::<Document>(collection)?;
        let docs: Vec<Document> = with_retry(self.retry, op_name, || async {
            coll.aggregate(pipeline.clone()).await?.try_collect().await
        })
        .await?;
        docs.into_iter()
            .map(|d| bson::from_document(d).map_err(AppError::from))
            .collect()
    }

    /// Create indexes used by lookups and uniqueness checks.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        let unique = || IndexOptions::builder().unique(true).build();

        let users = self.coll::<Document>(collections::USERS)?;
        users
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "username": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder().keys(doc! { "teamNumber": 1 }).build(),
            ])
            .await?;

        let teams = self.coll::<Document>(collections::TEAMS)?;
        teams
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "team_number": 1 })
                    .options(unique())
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "team_join_code": 1 })
                    .options(unique())
                    .build(),
            ])
            .await?;

        let team_data = self.coll::<Document>(collections::TEAM_DATA)?;
        team_data
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "event_code": 1, "match_number": 1 })
                    .build(),
                IndexModel::builder().keys(doc! { "team_number": 1 }).build(),
                IndexModel::builder().keys(doc! { "scouter_id": 1 }).build(),
            ])
            .await?;

        let pit = self.coll::<Document>(collections::PIT_SCOUTING)?;
        pit.create_index(IndexModel::builder().keys(doc! { "team_number": 1 }).build())
            .await?;

        let assignments = self.coll::<Document>(collections::ASSIGNMENTS)?;
        assignments
            .create_indexes([
                IndexModel::builder().keys(doc! { "team_number": 1 }).build(),
                IndexModel::builder().keys(doc! { "due_date": 1 }).build(),
            ])
            .await?;

        let subs = self.coll::<Document>(collections::NOTIFICATION_SUBSCRIPTIONS)?;
        subs.create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1 })
                .options(unique())
                .build(),
        )
        .await?;

        let scheduled = self.coll::<Document>(collections::SCHEDULED_NOTIFICATIONS)?;
        scheduled
            .create_indexes([
                IndexModel::builder()
                    .keys(doc! { "sent": 1, "scheduled_time": 1 })
                    .build(),
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "assignment_id": 1 })
                    .build(),
            ])
            .await?;

        tracing::info!("MongoDB indexes ensured");
        Ok(())
    }

    // ─── User Operations ─────────────────────────────────────────

    async fn find_user(&self, filter: Document, op_name: &str) -> Result<Option<User>, AppError> {
        let coll = self.coll::<User>(collections::USERS)?;
        Ok(with_retry(self.retry, op_name, || coll.find_one(filter.clone()).into_future()).await?)
    }

    pub async fn get_user(&self, id: &ObjectId) -> Result<Option<User>, AppError> {
        self.find_user(doc! { "_id": id }, "get_user").await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.find_user(doc! { "username": username }, "get_user_by_username")
            .await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_user(doc! { "email": email.to_lowercase() }, "get_user_by_email")
            .await
    }

    /// Look up a user by username or email.
    pub async fn get_user_by_login(&self, login: &str) -> Result<Option<User>, AppError> {
        self.find_user(
            doc! { "$or": [{ "username": login }, { "email": login.to_lowercase() }] },
            "get_user_by_login",
        )
        .await
    }

    /// Whether a username belongs to someone other than `exclude`.
    pub async fn username_taken(
        &self,
        username: &str,
        exclude: Option<&ObjectId>,
    ) -> Result<bool, AppError> {
        let mut filter = doc! { "username": username };
        if let Some(id) = exclude {
            filter.insert("_id", doc! { "$ne": id });
        }
        let coll = self.coll::<Document>(collections::USERS)?;
        let count = with_retry(self.retry, "username_taken", || {
            coll.count_documents(filter.clone()).into_future()
        })
        .await?;
        Ok(count > 0)
    }

    pub async fn get_users(&self, ids: &[ObjectId]) -> Result<Vec<User>, AppError> {
        let coll = self.coll::<User>(collections::USERS)?;
        let filter = doc! { "_id": { "$in": ids } };
        Ok(with_retry(self.retry, "get_users", || async {
            coll.find(filter.clone())
                .sort(doc! { "username": 1 })
                .await?
                .try_collect()
                .await
        })
        .await?)
    }

    pub async fn insert_user(&self, user: &User) -> Result<(), AppError> {
        self.insert(collections::USERS, user, "User", "insert_user").await
    }

    /// Apply a `$set` to one user.
    pub async fn update_user(&self, id: &ObjectId, set: Document) -> Result<(), AppError> {
        let coll = self.coll::<User>(collections::USERS)?;
        with_retry(self.retry, "update_user", || {
            coll.update_one(doc! { "_id": id }, doc! { "$set": set.clone() })
                .into_future()
        })
        .await
        .map_err(|e| map_write_error(e, "Username"))?;
        Ok(())
    }

    /// Set or clear a user's team.
    pub async fn set_user_team(&self, id: &ObjectId, team: Option<i32>) -> Result<(), AppError> {
        let update = match team {
            Some(team) => doc! { "$set": { "teamNumber": team } },
            None => doc! { "$unset": { "teamNumber": "" } },
        };
        let coll = self.coll::<User>(collections::USERS)?;
        with_retry(self.retry, "set_user_team", || {
            coll.update_one(doc! { "_id": id }, update.clone()).into_future()
        })
        .await?;
        Ok(())
    }

    /// Clear `teamNumber` on every user currently on `team`.
    pub async fn clear_team_for_members(&self, team: i32) -> Result<u64, AppError> {
        let coll = self.coll::<User>(collections::USERS)?;
        let result = with_retry(self.retry, "clear_team_for_members", || {
            coll.update_many(
                doc! { "teamNumber": team },
                doc! { "$unset": { "teamNumber": "" } },
            )
            .into_future()
        })
        .await?;
        Ok(result.modified_count)
    }

    pub async fn delete_user(&self, id: &ObjectId) -> Result<bool, AppError> {
        let deleted = self.delete_one(collections::USERS, doc! { "_id": id }, "delete_user").await?;
        Ok(deleted > 0)
    }

    // ─── Team Operations ─────────────────────────────────────────

    async fn find_team(&self, filter: Document, op_name: &str) -> Result<Option<Team>, AppError> {
        let coll = self.coll::<Team>(collections::TEAMS)?;
        Ok(with_retry(self.retry, op_name, || coll.find_one(filter.clone()).into_future()).await?)
    }

    pub async fn get_team(&self, team_number: i32) -> Result<Option<Team>, AppError> {
        self.find_team(doc! { "team_number": team_number }, "get_team")
            .await
    }

    pub async fn get_team_by_join_code(&self, code: &str) -> Result<Option<Team>, AppError> {
        self.find_team(doc! { "team_join_code": code }, "get_team_by_join_code")
            .await
    }

    pub async fn join_code_exists(&self, code: &str) -> Result<bool, AppError> {
        Ok(self.get_team_by_join_code(code).await?.is_some())
    }

    pub async fn insert_team(&self, team: &Team) -> Result<(), AppError> {
        self.insert(collections::TEAMS, team, "Team", "insert_team").await
    }

    /// Apply an update to a team and return the updated document.
    async fn modify_team(
        &self,
        team_number: i32,
        update: Document,
        op_name: &str,
    ) -> Result<Option<Team>, AppError> {
        let coll = self.coll::<Team>(collections::TEAMS)?;
        Ok(with_retry(self.retry, op_name, || {
            coll.find_one_and_update(doc! { "team_number": team_number }, update.clone())
                .return_document(ReturnDocument::After)
                .into_future()
        })
        .await?)
    }

    pub async fn add_team_member(
        &self,
        team_number: i32,
        user: &ObjectId,
    ) -> Result<Option<Team>, AppError> {
        self.modify_team(team_number, doc! { "$addToSet": { "users": user } }, "add_team_member")
            .await
    }

    /// Remove a user from both the member and admin lists.
    pub async fn remove_team_member(
        &self,
        team_number: i32,
        user: &ObjectId,
    ) -> Result<Option<Team>, AppError> {
        self.modify_team(
            team_number,
            doc! { "$pull": { "users": user, "admins": user } },
            "remove_team_member",
        )
        .await
    }

    pub async fn add_team_admin(
        &self,
        team_number: i32,
        user: &ObjectId,
    ) -> Result<Option<Team>, AppError> {
        self.modify_team(team_number, doc! { "$addToSet": { "admins": user } }, "add_team_admin")
            .await
    }

    pub async fn remove_team_admin(
        &self,
        team_number: i32,
        user: &ObjectId,
    ) -> Result<Option<Team>, AppError> {
        self.modify_team(team_number, doc! { "$pull": { "admins": user } }, "remove_team_admin")
            .await
    }

    pub async fn update_team_info(
        &self,
        team_number: i32,
        set: Document,
    ) -> Result<Option<Team>, AppError> {
        self.modify_team(team_number, doc! { "$set": set }, "update_team_info")
            .await
    }

    pub async fn delete_team(&self, team_number: i32) -> Result<bool, AppError> {
        let deleted = self
            .delete_one(
                collections::TEAMS,
                doc! { "team_number": team_number },
                "delete_team",
            )
            .await?;
        Ok(deleted > 0)
    }

    // ─── Match Scouting Operations ───────────────────────────────

    pub async fn insert_team_data(&self, entry: &TeamData) -> Result<(), AppError> {
        self.insert(collections::TEAM_DATA, entry, "Scouting entry", "insert_team_data").await
    }

    pub async fn get_team_data(&self, id: &ObjectId) -> Result<Option<TeamData>, AppError> {
        let coll = self.coll::<TeamData>(collections::TEAM_DATA)?;
        Ok(with_retry(self.retry, "get_team_data", || {
            coll.find_one(doc! { "_id": id }).into_future()
        })
        .await?)
    }

    pub async fn replace_team_data(&self, entry: &TeamData) -> Result<bool, AppError> {
        let coll = self.coll::<TeamData>(collections::TEAM_DATA)?;
        let result = with_retry(self.retry, "replace_team_data", || {
            coll.replace_one(doc! { "_id": entry.id }, entry).into_future()
        })
        .await?;
        Ok(result.matched_count > 0)
    }

    pub async fn delete_team_data(&self, id: &ObjectId) -> Result<bool, AppError> {
        let deleted = self
            .delete_one(
                collections::TEAM_DATA,
                doc! { "_id": id },
                "delete_team_data",
            )
            .await?;
        Ok(deleted > 0)
    }

    /// Entries matching `filter` that `viewer` may see, sorted by `sort`.
    pub async fn visible_team_data(
        &self,
        viewer: &Viewer,
        filter: Document,
        sort: Document,
    ) -> Result<Vec<TeamData>, AppError> {
        let mut pipeline = pipelines::visible(viewer, filter);
        pipeline.push(doc! { "$sort": sort });
        self.aggregate(collections::TEAM_DATA, pipeline, "visible_team_data")
            .await
    }

    pub async fn leaderboard(
        &self,
        viewer: &Viewer,
        sort: LeaderboardSort,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        self.aggregate(
            collections::TEAM_DATA,
            pipelines::leaderboard(viewer, sort),
            "leaderboard",
        )
        .await
    }

    pub async fn scouter_leaderboard(
        &self,
        sort: ScouterSort,
        event: Option<&str>,
        team: Option<i32>,
    ) -> Result<Vec<ScouterLeaderboardEntry>, AppError> {
        self.aggregate(
            collections::TEAM_DATA,
            pipelines::scouter_leaderboard(sort, event, team),
            "scouter_leaderboard",
        )
        .await
    }

    /// Event codes present in the scouting data.
    pub async fn scouted_events(&self) -> Result<Vec<String>, AppError> {
        let docs: Vec<Document> = self
            .aggregate(collections::TEAM_DATA, pipelines::scouted_events(), "scouted_events")
            .await?;
        Ok(docs
            .iter()
            .filter_map(|d| d.get_str("_id").ok().map(str::to_string))
            .collect())
    }

    /// Teams whose members have recorded scouting data.
    pub async fn scouting_teams(&self) -> Result<Vec<i32>, AppError> {
        let docs: Vec<Document> = self
            .aggregate(collections::TEAM_DATA, pipelines::scouting_teams(), "scouting_teams")
            .await?;
        Ok(docs
            .iter()
            .filter_map(|d| match d.get("_id") {
                Some(Bson::Int32(n)) => Some(*n),
                Some(Bson::Int64(n)) => i32::try_from(*n).ok(),
                _ => None,
            })
            .collect())
    }

    /// Every entry for `team_number` with a recorded auto path, by match.
    pub async fn auto_paths(&self, team_number: i32) -> Result<Vec<TeamData>, AppError> {
        let coll = self.coll::<TeamData>(collections::TEAM_DATA)?;
        let filter = doc! {
            "team_number": team_number,
            "auto_path": { "$exists": true, "$ne": "" },
        };
        Ok(with_retry(self.retry, "auto_paths", || async {
            coll.find(filter.clone())
                .sort(doc! { "match_number": 1 })
                .await?
                .try_collect()
                .await
        })
        .await?)
    }

    // ─── Pit Scouting Operations ─────────────────────────────────

    pub async fn insert_pit(&self, entry: &PitScouting) -> Result<(), AppError> {
        self.insert(collections::PIT_SCOUTING, entry, "Pit scouting entry", "insert_pit").await
    }

    /// Pit entries matching `filter` that `viewer` may see, newest first.
    pub async fn visible_pit(
        &self,
        viewer: &Viewer,
        filter: Document,
    ) -> Result<Vec<PitWithScouter>, AppError> {
        let mut pipeline = pipelines::visible(viewer, filter);
        pipeline.push(doc! { "$sort": { "team_number": 1, "created_at": -1 } });
        let docs: Vec<Document> = self
            .aggregate(collections::PIT_SCOUTING, pipeline, "visible_pit")
            .await?;
        docs.into_iter()
            .map(|d| -> Result<PitWithScouter, AppError> {
                let scouter_name = d.get_str("scouter_username").ok().map(str::to_string);
                let scouter_team = d.get_i32("scouter_team_number").ok();
                Ok(PitWithScouter {
                    entry: bson::from_document(d)?,
                    scouter_name,
                    scouter_team,
                })
            })
            .collect()
    }

    pub async fn replace_pit(&self, entry: &PitScouting) -> Result<bool, AppError> {
        let coll = self.coll::<PitScouting>(collections::PIT_SCOUTING)?;
        let result = with_retry(self.retry, "replace_pit", || {
            coll.replace_one(doc! { "_id": entry.id }, entry).into_future()
        })
        .await?;
        Ok(result.matched_count > 0)
    }

    pub async fn delete_pit(&self, id: &ObjectId) -> Result<bool, AppError> {
        let deleted = self
            .delete_one(
                collections::PIT_SCOUTING,
                doc! { "_id": id },
                "delete_pit",
            )
            .await?;
        Ok(deleted > 0)
    }

    // ─── Assignment Operations ───────────────────────────────────

    pub async fn insert_assignment(&self, assignment: &Assignment) -> Result<(), AppError> {
        self.insert(collections::ASSIGNMENTS, assignment, "Assignment", "insert_assignment").await
    }

    pub async fn get_assignment(&self, id: &ObjectId) -> Result<Option<Assignment>, AppError> {
        let coll = self.coll::<Assignment>(collections::ASSIGNMENTS)?;
        Ok(with_retry(self.retry, "get_assignment", || {
            coll.find_one(doc! { "_id": id }).into_future()
        })
        .await?)
    }

    async fn find_assignments(
        &self,
        filter: Document,
        op_name: &str,
    ) -> Result<Vec<Assignment>, AppError> {
        let coll = self.coll::<Assignment>(collections::ASSIGNMENTS)?;
        Ok(with_retry(self.retry, op_name, || async {
            coll.find(filter.clone())
                .sort(doc! { "due_date": 1, "created_at": 1 })
                .await?
                .try_collect()
                .await
        })
        .await?)
    }

    pub async fn list_assignments(&self, team_number: i32) -> Result<Vec<Assignment>, AppError> {
        self.find_assignments(doc! { "team_number": team_number }, "list_assignments")
            .await
    }

    /// Assignments with a due date after `now`.
    pub async fn assignments_due_after(
        &self,
        now: bson::DateTime,
    ) -> Result<Vec<Assignment>, AppError> {
        self.find_assignments(doc! { "due_date": { "$gt": now } }, "assignments_due_after")
            .await
    }

    /// A user's assignments in one team that are due after `now`.
    pub async fn upcoming_assignments_for_user(
        &self,
        team_number: i32,
        user: &ObjectId,
        now: bson::DateTime,
    ) -> Result<Vec<Assignment>, AppError> {
        self.find_assignments(
            doc! { "team_number": team_number, "assigned_to": user, "due_date": { "$gt": now } },
            "upcoming_assignments_for_user",
        )
        .await
    }

    /// Apply a `$set` to an assignment and return the updated document.
    pub async fn update_assignment(
        &self,
        id: &ObjectId,
        set: Document,
    ) -> Result<Option<Assignment>, AppError> {
        let coll = self.coll::<Assignment>(collections::ASSIGNMENTS)?;
        Ok(with_retry(self.retry, "update_assignment", || {
            coll.find_one_and_update(doc! { "_id": id }, doc! { "$set": set.clone() })
                .return_document(ReturnDocument::After)
                .into_future()
        })
        .await?)
    }

    pub async fn delete_assignment(&self, id: &ObjectId) -> Result<bool, AppError> {
        let deleted = self
            .delete_one(
                collections::ASSIGNMENTS,
                doc! { "_id": id },
                "delete_assignment",
            )
            .await?;
        Ok(deleted > 0)
    }

    pub async fn delete_team_assignments(&self, team_number: i32) -> Result<u64, AppError> {
        self.delete_all(
            collections::ASSIGNMENTS,
            doc! { "team_number": team_number },
            "delete_team_assignments",
        )
        .await
    }

    // ─── Notification Subscription Operations ────────────────────

    pub async fn get_subscription(
        &self,
        user: &ObjectId,
    ) -> Result<Option<NotificationSubscription>, AppError> {
        let coll = self.coll::<NotificationSubscription>(collections::NOTIFICATION_SUBSCRIPTIONS)?;
        Ok(with_retry(self.retry, "get_subscription", || {
            coll.find_one(doc! { "user_id": user }).into_future()
        })
        .await?)
    }

    /// Subscriptions for several users at once.
    pub async fn get_subscriptions(
        &self,
        users: &[ObjectId],
    ) -> Result<Vec<NotificationSubscription>, AppError> {
        let coll = self.coll::<NotificationSubscription>(collections::NOTIFICATION_SUBSCRIPTIONS)?;
        let filter = doc! { "user_id": { "$in": users } };
        Ok(with_retry(self.retry, "get_subscriptions", || async {
            coll.find(filter.clone()).await?.try_collect().await
        })
        .await?)
    }

    /// Update the user's subscription document, creating it if missing.
    async fn upsert_subscription(
        &self,
        user: &ObjectId,
        set: Document,
        now: bson::DateTime,
        op_name: &str,
    ) -> Result<NotificationSubscription, AppError> {
        let coll = self.coll::<NotificationSubscription>(collections::NOTIFICATION_SUBSCRIPTIONS)?;
        let mut set = set;
        set.insert("updated_at", now);
        let update = doc! {
            "$set": set,
            "$setOnInsert": {
                "_id": ObjectId::new(),
                "created_at": now,
            },
        };
        let updated = with_retry(self.retry, op_name, || {
            coll.find_one_and_update(doc! { "user_id": user }, update.clone())
                .upsert(true)
                .return_document(ReturnDocument::After)
                .into_future()
        })
        .await?;
        updated.ok_or_else(|| {
            AppError::Database(format!("{}: upsert returned no document", op_name))
        })
    }

    /// Store a browser push subscription.
    pub async fn save_push_subscription(
        &self,
        user: &ObjectId,
        team_number: Option<i32>,
        push: &PushSubscription,
        now: bson::DateTime,
    ) -> Result<NotificationSubscription, AppError> {
        let mut set = doc! { "subscription_json": bson::to_bson(push)? };
        if let Some(team) = team_number {
            set.insert("team_number", team);
        }
        self.upsert_subscription(user, set, now, "save_push_subscription")
            .await
    }

    pub async fn update_notification_settings(
        &self,
        user: &ObjectId,
        team_number: i32,
        default_reminder_time: i32,
        enable_all: bool,
        now: bson::DateTime,
    ) -> Result<NotificationSubscription, AppError> {
        self.upsert_subscription(
            user,
            doc! {
                "team_number": team_number,
                "default_reminder_time": default_reminder_time,
                "enable_all_notifications": enable_all,
            },
            now,
            "update_notification_settings",
        )
        .await
    }

    /// Replace the user's reminder list.
    pub async fn set_assignment_reminders(
        &self,
        user: &ObjectId,
        reminders: &[AssignmentReminder],
        now: bson::DateTime,
    ) -> Result<NotificationSubscription, AppError> {
        self.upsert_subscription(
            user,
            doc! { "assignment_subscriptions": bson::to_bson(reminders)? },
            now,
            "set_assignment_reminders",
        )
        .await
    }

    /// Forget a push subscription the push service rejected.
    pub async fn clear_push_subscription(&self, user: &ObjectId) -> Result<(), AppError> {
        let coll = self.coll::<Document>(collections::NOTIFICATION_SUBSCRIPTIONS)?;
        with_retry(self.retry, "clear_push_subscription", || {
            coll.update_one(
                doc! { "user_id": user },
                doc! { "$set": { "subscription_json": Bson::Null } },
            )
            .into_future()
        })
        .await?;
        Ok(())
    }

    pub async fn delete_subscription(&self, user: &ObjectId) -> Result<(), AppError> {
        self.delete_one(
            collections::NOTIFICATION_SUBSCRIPTIONS,
            doc! { "user_id": user },
            "delete_subscription",
        )
        .await?;
        Ok(())
    }

    // ─── Scheduled Notification Operations ───────────────────────

    pub async fn insert_notification(
        &self,
        notification: &ScheduledNotification,
    ) -> Result<(), AppError> {
        self.insert(
            collections::SCHEDULED_NOTIFICATIONS,
            notification,
            "Notification",
            "insert_notification",
        )
        .await
    }

    async fn find_notifications(
        &self,
        filter: Document,
        sort: Document,
        limit: Option<i64>,
        op_name: &str,
    ) -> Result<Vec<ScheduledNotification>, AppError> {
        let coll = self.coll::<ScheduledNotification>(collections::SCHEDULED_NOTIFICATIONS)?;
        Ok(with_retry(self.retry, op_name, || async {
            let mut find = coll.find(filter.clone()).sort(sort.clone());
            if let Some(limit) = limit {
                find = find.limit(limit);
            }
            find.await?.try_collect().await
        })
        .await?)
    }

    /// Unsent notifications whose time has come.
    pub async fn due_notifications(
        &self,
        now: bson::DateTime,
    ) -> Result<Vec<ScheduledNotification>, AppError> {
        self.find_notifications(
            doc! { "scheduled_time": { "$lte": now }, "sent": false },
            doc! { "scheduled_time": 1 },
            None,
            "due_notifications",
        )
        .await
    }

    pub async fn pending_notifications_for_user(
        &self,
        user: &ObjectId,
    ) -> Result<Vec<ScheduledNotification>, AppError> {
        self.find_notifications(
            doc! { "user_id": user, "sent": false },
            doc! { "scheduled_time": 1 },
            None,
            "pending_notifications_for_user",
        )
        .await
    }

    pub async fn recent_sent_notifications_for_user(
        &self,
        user: &ObjectId,
        limit: i64,
    ) -> Result<Vec<ScheduledNotification>, AppError> {
        self.find_notifications(
            doc! { "user_id": user, "sent": true },
            doc! { "sent_at": -1 },
            Some(limit),
            "recent_sent_notifications_for_user",
        )
        .await
    }

    /// Whether an unsent reminder already exists for (user, assignment).
    pub async fn pending_notification_exists(
        &self,
        user: &ObjectId,
        assignment: &ObjectId,
    ) -> Result<bool, AppError> {
        let coll = self.coll::<Document>(collections::SCHEDULED_NOTIFICATIONS)?;
        let filter = doc! { "user_id": user, "assignment_id": assignment, "sent": false };
        let count = with_retry(self.retry, "pending_notification_exists", || {
            coll.count_documents(filter.clone()).into_future()
        })
        .await?;
        Ok(count > 0)
    }

    pub async fn mark_notification_sent(
        &self,
        id: &ObjectId,
        now: bson::DateTime,
    ) -> Result<(), AppError> {
        self.set_notification(
            id,
            doc! {
                "sent": true,
                "sent_at": now,
                "status": bson::to_bson(&NotificationStatus::Sent)?,
                "error": Bson::Null,
            },
            "mark_notification_sent",
        )
        .await
    }

    /// Retire a notification whose subscription is gone.
    pub async fn mark_notification_expired(
        &self,
        id: &ObjectId,
        now: bson::DateTime,
    ) -> Result<(), AppError> {
        self.set_notification(
            id,
            doc! {
                "sent": true,
                "sent_at": now,
                "status": bson::to_bson(&NotificationStatus::Failed)?,
                "error": SUBSCRIPTION_EXPIRED,
            },
            "mark_notification_expired",
        )
        .await
    }

    async fn set_notification(
        &self,
        id: &ObjectId,
        set: Document,
        op_name: &str,
    ) -> Result<(), AppError> {
        let coll = self.coll::<Document>(collections::SCHEDULED_NOTIFICATIONS)?;
        with_retry(self.retry, op_name, || {
            coll.update_one(doc! { "_id": id }, doc! { "$set": set.clone() })
                .into_future()
        })
        .await?;
        Ok(())
    }

    /// Requeue notifications that failed because the subscription expired
    /// at or after `since`, to be sent at `send_at`.
    pub async fn reschedule_expired_notifications(
        &self,
        user: &ObjectId,
        since: bson::DateTime,
        send_at: bson::DateTime,
    ) -> Result<u64, AppError> {
        let coll = self.coll::<Document>(collections::SCHEDULED_NOTIFICATIONS)?;
        let filter = doc! {
            "user_id": user,
            "status": bson::to_bson(&NotificationStatus::Failed)?,
            "error": SUBSCRIPTION_EXPIRED,
            "sent_at": { "$gte": since },
        };
        let update = doc! {
            "$set": {
                "sent": false,
                "status": bson::to_bson(&NotificationStatus::Pending)?,
                "scheduled_time": send_at,
                "error": Bson::Null,
            },
            "$unset": { "sent_at": "" },
        };
        let result = with_retry(self.retry, "reschedule_expired_notifications", || {
            coll.update_many(filter.clone(), update.clone()).into_future()
        })
        .await?;
        Ok(result.modified_count)
    }

    pub async fn delete_pending_notifications_for_user(
        &self,
        user: &ObjectId,
    ) -> Result<u64, AppError> {
        self.delete_all(
            collections::SCHEDULED_NOTIFICATIONS,
            doc! { "user_id": user, "sent": false },
            "delete_pending_notifications_for_user",
        )
        .await
    }

    /// Drop unsent reminders for an assignment, optionally for one user.
    pub async fn delete_pending_notifications_for_assignment(
        &self,
        assignment: &ObjectId,
        user: Option<&ObjectId>,
    ) -> Result<u64, AppError> {
        let mut filter = doc! { "assignment_id": assignment, "sent": false };
        if let Some(user) = user {
            filter.insert("user_id", user);
        }
        self.delete_all(
            collections::SCHEDULED_NOTIFICATIONS,
            filter,
            "delete_pending_notifications_for_assignment",
        )
        .await
    }
}
