// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod assignment;
pub mod notification;
pub mod pit;
pub mod scouting;
pub mod stats;
pub mod team;
pub mod user;

pub use assignment::{Assignment, AssignmentResponse, AssignmentStatus};
pub use notification::{
    NotificationStatus, NotificationSubscription, PushSubscription, ScheduledNotification,
};
pub use pit::{PitScouting, PitScoutingForm, PitScoutingResponse};
pub use scouting::{Alliance, RobotDisabled, ScoutingEntryResponse, ScoutingForm, TeamData};
pub use stats::{LeaderboardEntry, LeaderboardSort, ScouterLeaderboardEntry, ScouterSort, TeamStats};
pub use team::{Team, TeamDetails, TeamMember, TeamRole, TeamSummary};
pub use user::{PublicProfile, User, UserResponse};
