// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User model for storage and API.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::time_utils::format_bson_rfc3339;

/// User account stored in MongoDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Unique login name
    pub username: String,
    /// Unique, lowercased email address
    pub email: String,
    /// Team the user belongs to, if any
    #[serde(rename = "teamNumber", default, skip_serializing_if = "Option::is_none")]
    pub team_number: Option<i32>,
    /// Argon2 PHC string
    pub password_hash: String,
    pub created_at: bson::DateTime,
    #[serde(default)]
    pub last_login: Option<bson::DateTime>,
    #[serde(default)]
    pub description: String,

    // ─── Password change lockout ─────────────────────────────────
    #[serde(default)]
    pub failed_password_change_attempts: i32,
    #[serde(default)]
    pub last_failed_password_change: Option<bson::DateTime>,
    #[serde(default)]
    pub password_changed_at: Option<bson::DateTime>,
}

/// Current user response (includes private fields).
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub team_number: Option<i32>,
    pub description: String,
    pub created_at: String,
    pub last_login: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username.clone(),
            email: user.email.clone(),
            team_number: user.team_number,
            description: user.description.clone(),
            created_at: format_bson_rfc3339(user.created_at),
            last_login: user.last_login.map(format_bson_rfc3339),
        }
    }
}

/// Public profile, as seen by other users.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct PublicProfile {
    pub id: String,
    pub username: String,
    pub team_number: Option<i32>,
    pub description: String,
    pub created_at: String,
}

impl From<&User> for PublicProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_hex(),
            username: user.username.clone(),
            team_number: user.team_number,
            description: user.description.clone(),
            created_at: format_bson_rfc3339(user.created_at),
        }
    }
}
