// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Database layer (MongoDB).

pub mod mongo;
pub mod pipelines;
pub mod retry;

pub use mongo::{MongoDb, PitWithScouter};
pub use pipelines::Viewer;
pub use retry::RetryPolicy;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const TEAMS: &str = "teams";
    /// Match scouting entries
    pub const TEAM_DATA: &str = "team_data";
    pub const PIT_SCOUTING: &str = "pit_scouting";
    pub const ASSIGNMENTS: &str = "assignments";
    pub const NOTIFICATION_SUBSCRIPTIONS: &str = "notification_subscriptions";
    pub const SCHEDULED_NOTIFICATIONS: &str = "scheduled_notifications";
}
