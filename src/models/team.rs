// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Team model and membership roles.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::time_utils::format_bson_rfc3339;

/// A scouting team (an FRC team using the app).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// FRC team number (unique)
    pub team_number: i32,
    /// 6-character code members use to join
    pub team_join_code: String,
    /// Member user ids (includes admins and owner)
    #[serde(default)]
    pub users: Vec<ObjectId>,
    /// Admin user ids (owner is implicitly an admin)
    #[serde(default)]
    pub admins: Vec<ObjectId>,
    pub owner_id: ObjectId,
    pub created_at: bson::DateTime,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub description: String,
}

impl Team {
    pub fn is_owner(&self, user_id: &ObjectId) -> bool {
        self.owner_id == *user_id
    }

    /// Owners count as admins.
    pub fn is_admin(&self, user_id: &ObjectId) -> bool {
        self.admins.contains(user_id) || self.is_owner(user_id)
    }

    pub fn is_member(&self, user_id: &ObjectId) -> bool {
        self.users.contains(user_id)
    }

    pub fn role_of(&self, user_id: &ObjectId) -> Option<TeamRole> {
        if self.is_owner(user_id) {
            Some(TeamRole::Owner)
        } else if self.admins.contains(user_id) {
            Some(TeamRole::Admin)
        } else if self.is_member(user_id) {
            Some(TeamRole::Member)
        } else {
            None
        }
    }
}

/// A member's role within a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum TeamRole {
    Owner,
    Admin,
    Member,
}

/// Team info visible to anyone.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TeamSummary {
    pub team_number: i32,
    pub team_name: Option<String>,
    pub description: String,
    pub member_count: u32,
    pub created_at: String,
}

impl From<&Team> for TeamSummary {
    fn from(team: &Team) -> Self {
        Self {
            team_number: team.team_number,
            team_name: team.team_name.clone(),
            description: team.description.clone(),
            member_count: team.users.len() as u32,
            created_at: format_bson_rfc3339(team.created_at),
        }
    }
}

/// Team details for members (includes the join code).
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TeamDetails {
    #[serde(flatten)]
    pub summary: TeamSummary,
    pub team_join_code: String,
    pub owner_id: String,
    pub admins: Vec<String>,
    pub your_role: Option<TeamRole>,
}

impl TeamDetails {
    pub fn for_viewer(team: &Team, viewer: &ObjectId) -> Self {
        Self {
            summary: TeamSummary::from(team),
            team_join_code: team.team_join_code.clone(),
            owner_id: team.owner_id.to_hex(),
            admins: team.admins.iter().map(|id| id.to_hex()).collect(),
            your_role: team.role_of(viewer),
        }
    }
}

/// One row in a team member listing.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TeamMember {
    pub id: String,
    pub username: String,
    pub description: String,
    pub role: TeamRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn team_with(owner: ObjectId, admins: Vec<ObjectId>, users: Vec<ObjectId>) -> Team {
        Team {
            id: ObjectId::new(),
            team_number: 334,
            team_join_code: "ABC123".to_string(),
            users,
            admins,
            owner_id: owner,
            created_at: bson::DateTime::now(),
            team_name: Some("TechKnights".to_string()),
            description: String::new(),
        }
    }

    #[test]
    fn test_owner_is_admin_even_if_not_listed() {
        let owner = ObjectId::new();
        let team = team_with(owner, vec![], vec![owner]);

        assert!(team.is_owner(&owner));
        assert!(team.is_admin(&owner));
        assert_eq!(team.role_of(&owner), Some(TeamRole::Owner));
    }

    #[test]
    fn test_roles() {
        let owner = ObjectId::new();
        let admin = ObjectId::new();
        let member = ObjectId::new();
        let outsider = ObjectId::new();
        let team = team_with(owner, vec![owner, admin], vec![owner, admin, member]);

        assert_eq!(team.role_of(&admin), Some(TeamRole::Admin));
        assert_eq!(team.role_of(&member), Some(TeamRole::Member));
        assert_eq!(team.role_of(&outsider), None);
        assert!(!team.is_admin(&member));
        assert!(!team.is_member(&outsider));
    }

    #[test]
    fn test_details_expose_ids_as_hex() {
        let owner = ObjectId::new();
        let admin = ObjectId::new();
        let team = team_with(owner, vec![admin], vec![owner, admin]);

        let details = TeamDetails::for_viewer(&team, &admin);

        assert_eq!(details.owner_id, owner.to_hex());
        assert_eq!(details.admins, vec![admin.to_hex()]);
        assert_eq!(details.your_role, Some(TeamRole::Admin));
        assert_eq!(details.summary.member_count, 2);
    }
}
