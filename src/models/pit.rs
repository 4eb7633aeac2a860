// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pit scouting entries (robot design data collected before matches).

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

use crate::time_utils::format_bson_rfc3339;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DriveType {
    #[serde(default)]
    pub swerve: bool,
    #[serde(default)]
    pub tank: bool,
    #[serde(default)]
    pub other: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MotorDetails {
    #[serde(default)]
    pub falcons: bool,
    #[serde(default)]
    pub neos: bool,
    #[serde(default)]
    pub krakens: bool,
    #[serde(default)]
    pub vortex: bool,
    #[serde(default)]
    pub other: String,
}

/// Robot frame dimensions in inches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Dimensions {
    #[serde(default)]
    #[validate(range(min = 0.0, max = 200.0, message = "Invalid length"))]
    pub length: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 200.0, message = "Invalid width"))]
    pub width: f64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 200.0, message = "Invalid height"))]
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AutonomousCapabilities {
    #[serde(default)]
    pub has_auto: bool,
    #[serde(default)]
    #[validate(range(min = 0, max = 50, message = "Invalid number of auto routes"))]
    pub num_routes: i32,
    #[serde(default)]
    pub preferred_start: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DriverExperience {
    #[serde(default)]
    #[validate(range(min = 0, max = 30, message = "Invalid driver experience"))]
    pub years: i32,
    #[serde(default)]
    pub notes: String,
}

/// Pit scouting entry stored in the `pit_scouting` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PitScouting {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Scouted robot
    pub team_number: i32,
    pub scouter_id: ObjectId,
    #[serde(default)]
    pub drive_type: DriveType,
    #[serde(default)]
    pub swerve_modules: String,
    #[serde(default)]
    pub motor_details: MotorDetails,
    #[serde(default)]
    pub motor_count: i32,
    #[serde(default)]
    pub dimensions: Dimensions,
    /// Game-specific mechanism details; shape changes every season
    #[serde(default)]
    pub mechanisms: bson::Document,
    #[serde(default)]
    pub programming_language: String,
    #[serde(default)]
    pub autonomous_capabilities: AutonomousCapabilities,
    #[serde(default)]
    pub driver_experience: DriverExperience,
    #[serde(default)]
    pub notes: String,
    pub created_at: bson::DateTime,
    #[serde(default)]
    pub updated_at: Option<bson::DateTime>,
}

impl PitScouting {
    pub fn from_form(form: &PitScoutingForm, scouter_id: ObjectId, now: bson::DateTime) -> Self {
        let mut entry = Self {
            id: ObjectId::new(),
            team_number: form.team_number,
            scouter_id,
            drive_type: DriveType::default(),
            swerve_modules: String::new(),
            motor_details: MotorDetails::default(),
            motor_count: 0,
            dimensions: Dimensions::default(),
            mechanisms: bson::Document::new(),
            programming_language: String::new(),
            autonomous_capabilities: AutonomousCapabilities::default(),
            driver_experience: DriverExperience::default(),
            notes: String::new(),
            created_at: now,
            updated_at: None,
        };
        entry.apply_form(form);
        entry
    }

    /// Overwrite the robot details with values from a form.
    ///
    /// The scouted team number is kept; an entry can't be moved to another
    /// robot.
    pub fn apply_form(&mut self, form: &PitScoutingForm) {
        self.drive_type = form.drive_type.clone();
        self.swerve_modules = form.swerve_modules.clone();
        self.motor_details = form.motor_details.clone();
        self.motor_count = form.motor_count;
        self.dimensions = form.dimensions.clone();
        self.mechanisms = form.mechanisms.clone();
        self.programming_language = form.programming_language.clone();
        self.autonomous_capabilities = form.autonomous_capabilities.clone();
        self.driver_experience = form.driver_experience.clone();
        self.notes = form.notes.clone();
    }
}

/// Request body for adding or editing a pit entry.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PitScoutingForm {
    #[validate(range(min = 1, max = 99999, message = "Invalid team number"))]
    pub team_number: i32,
    #[serde(default)]
    pub drive_type: DriveType,
    #[serde(default)]
    pub swerve_modules: String,
    #[serde(default)]
    pub motor_details: MotorDetails,
    #[serde(default)]
    #[validate(range(min = 0, max = 40, message = "Invalid motor count"))]
    pub motor_count: i32,
    #[serde(default)]
    #[validate(nested)]
    pub dimensions: Dimensions,
    #[serde(default)]
    pub mechanisms: bson::Document,
    #[serde(default)]
    pub programming_language: String,
    #[serde(default)]
    #[validate(nested)]
    pub autonomous_capabilities: AutonomousCapabilities,
    #[serde(default)]
    #[validate(nested)]
    pub driver_experience: DriverExperience,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub notes: String,
}

/// Pit entry as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct PitScoutingResponse {
    pub id: String,
    pub team_number: i32,
    pub scouter_id: String,
    pub scouter_name: Option<String>,
    pub scouter_team: Option<i32>,
    pub drive_type: DriveType,
    pub swerve_modules: String,
    pub motor_details: MotorDetails,
    pub motor_count: i32,
    pub dimensions: Dimensions,
    pub mechanisms: serde_json::Value,
    pub programming_language: String,
    pub autonomous_capabilities: AutonomousCapabilities,
    pub driver_experience: DriverExperience,
    pub notes: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub is_owner: bool,
}

impl PitScoutingResponse {
    pub fn new(
        entry: &PitScouting,
        scouter_name: Option<String>,
        scouter_team: Option<i32>,
        viewer: &ObjectId,
    ) -> Self {
        Self {
            id: entry.id.to_hex(),
            team_number: entry.team_number,
            scouter_id: entry.scouter_id.to_hex(),
            scouter_name,
            scouter_team,
            drive_type: entry.drive_type.clone(),
            swerve_modules: entry.swerve_modules.clone(),
            motor_details: entry.motor_details.clone(),
            motor_count: entry.motor_count,
            dimensions: entry.dimensions.clone(),
            mechanisms: bson::Bson::Document(entry.mechanisms.clone()).into_relaxed_extjson(),
            programming_language: entry.programming_language.clone(),
            autonomous_capabilities: entry.autonomous_capabilities.clone(),
            driver_experience: entry.driver_experience.clone(),
            notes: entry.notes.clone(),
            created_at: format_bson_rfc3339(entry.created_at),
            updated_at: entry.updated_at.map(format_bson_rfc3339),
            is_owner: entry.scouter_id == *viewer,
        }
    }
}
