// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Team task assignments.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::time_utils::format_bson_rfc3339;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum AssignmentStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentStatus::Pending => "pending",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
        }
    }
}

/// Assignment stored in the `assignments` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub team_number: i32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assigned_to: Vec<ObjectId>,
    #[serde(default)]
    pub status: AssignmentStatus,
    #[serde(default)]
    pub due_date: Option<bson::DateTime>,
    pub created_by: ObjectId,
    pub created_at: bson::DateTime,
    #[serde(default)]
    pub completed_at: Option<bson::DateTime>,
    #[serde(default)]
    pub updated_at: Option<bson::DateTime>,
    #[serde(default)]
    pub updated_by: Option<ObjectId>,
}

impl Assignment {
    pub fn is_assigned(&self, user_id: &ObjectId) -> bool {
        self.assigned_to.contains(user_id)
    }
}

/// Request body for creating or updating an assignment.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AssignmentForm {
    #[validate(length(min = 1, max = 200, message = "Title is required"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    /// User ids (hex)
    #[serde(default)]
    pub assigned_to: Vec<String>,
    /// RFC3339 or a naive date-time from a date picker
    #[serde(default)]
    pub due_date: Option<String>,
}

/// Request body for changing an assignment's status.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignmentStatusForm {
    pub status: AssignmentStatus,
}

/// Assignment as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AssignmentResponse {
    pub id: String,
    pub team_number: i32,
    pub title: String,
    pub description: String,
    pub assigned_to: Vec<String>,
    pub status: AssignmentStatus,
    pub due_date: Option<String>,
    pub created_by: String,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub updated_at: Option<String>,
}

impl From<&Assignment> for AssignmentResponse {
    fn from(a: &Assignment) -> Self {
        Self {
            id: a.id.to_hex(),
            team_number: a.team_number,
            title: a.title.clone(),
            description: a.description.clone(),
            assigned_to: a.assigned_to.iter().map(|id| id.to_hex()).collect(),
            status: a.status,
            due_date: a.due_date.map(format_bson_rfc3339),
            created_by: a.created_by.to_hex(),
            created_at: format_bson_rfc3339(a.created_at),
            completed_at: a.completed_at.map(format_bson_rfc3339),
            updated_at: a.updated_at.map(format_bson_rfc3339),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let status: AssignmentStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(status, AssignmentStatus::InProgress);
        assert_eq!(
            serde_json::to_string(&AssignmentStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert!(serde_json::from_str::<AssignmentStatus>("\"done\"").is_err());
    }

    #[test]
    fn test_missing_status_defaults_to_pending() {
        let doc = bson::doc! {
            "_id": ObjectId::new(),
            "team_number": 334,
            "title": "Scout Q12",
            "created_by": ObjectId::new(),
            "created_at": bson::DateTime::now(),
        };
        let assignment: Assignment = bson::from_document(doc).unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Pending);
        assert!(assignment.assigned_to.is_empty());
    }

    #[test]
    fn test_response_lists_assignees_as_hex() {
        let first = ObjectId::new();
        let second = ObjectId::new();
        let doc = bson::doc! {
            "_id": ObjectId::new(),
            "team_number": 334,
            "title": "Pit interviews",
            "assigned_to": [first, second],
            "created_by": ObjectId::new(),
            "created_at": bson::DateTime::now(),
        };
        let assignment: Assignment = bson::from_document(doc).unwrap();

        let response = AssignmentResponse::from(&assignment);

        assert_eq!(response.assigned_to, vec![first.to_hex(), second.to_hex()]);
        assert_eq!(response.status, AssignmentStatus::Pending);
    }
}
