// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Match scouting entries.
//!
//! One [`TeamData`] document records how a single robot performed in a
//! single match, as observed by one scouter.

use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidationError};

use crate::time_utils::format_bson_rfc3339;

/// Alliance color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum Alliance {
    Red,
    Blue,
}

impl Alliance {
    pub fn as_str(self) -> &'static str {
        match self {
            Alliance::Red => "red",
            Alliance::Blue => "blue",
        }
    }
}

/// How much of the match the robot spent disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum RobotDisabled {
    #[default]
    None,
    Partially,
    Full,
}

/// Match scouting entry stored in the `team_data` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamData {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    /// Scouted robot
    pub team_number: i32,
    pub match_number: i32,
    pub event_code: String,
    pub alliance: Alliance,

    // ─── Fuel ────────────────────────────────────────────────────
    #[serde(default)]
    pub auto_fuel: i32,
    #[serde(default)]
    pub transition_fuel: i32,
    #[serde(default)]
    pub teleop_shift_1_fuel: i32,
    #[serde(default)]
    pub teleop_shift_2_fuel: i32,
    #[serde(default)]
    pub teleop_shift_3_fuel: i32,
    #[serde(default)]
    pub teleop_shift_4_fuel: i32,
    #[serde(default)]
    pub endgame_fuel: i32,
    #[serde(default)]
    pub ferried_fuel: i32,

    // ─── Climb ───────────────────────────────────────────────────
    #[serde(default)]
    pub auto_climb: bool,
    /// 0 = no climb, 1..=3 = level reached
    #[serde(default)]
    pub climb_level: i32,
    #[serde(default)]
    pub climb_success: bool,

    // ─── Defense ─────────────────────────────────────────────────
    /// 1..=5
    #[serde(default = "default_defense_rating")]
    pub defense_rating: i32,
    #[serde(default)]
    pub defense_notes: String,

    // ─── Auto / notes ────────────────────────────────────────────
    /// Drawn autonomous path (opaque client data)
    #[serde(default)]
    pub auto_path: String,
    #[serde(default)]
    pub auto_notes: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub robot_disabled: RobotDisabled,

    // ─── Scouter ─────────────────────────────────────────────────
    pub scouter_id: ObjectId,
    pub scouter_name: String,
    /// Scouter's team at the time of entry
    #[serde(default)]
    pub scouter_team: Option<i32>,

    pub created_at: bson::DateTime,
    #[serde(default)]
    pub updated_at: Option<bson::DateTime>,
}

fn default_defense_rating() -> i32 {
    1
}

impl TeamData {
    /// Fuel scored across the four teleop shifts.
    pub fn teleop_fuel(&self) -> i32 {
        self.teleop_shift_1_fuel
            + self.teleop_shift_2_fuel
            + self.teleop_shift_3_fuel
            + self.teleop_shift_4_fuel
    }

    /// All fuel scored in the match (ferried fuel is not scored).
    pub fn total_fuel(&self) -> i32 {
        self.auto_fuel + self.transition_fuel + self.teleop_fuel() + self.endgame_fuel
    }

    /// Build a new entry from a validated form.
    pub fn from_form(
        form: &ScoutingForm,
        scouter_id: ObjectId,
        scouter_name: &str,
        scouter_team: Option<i32>,
        now: bson::DateTime,
    ) -> Self {
        let mut entry = Self {
            id: ObjectId::new(),
            team_number: form.team_number,
            match_number: form.match_number,
            event_code: String::new(),
            alliance: form.alliance,
            auto_fuel: 0,
            transition_fuel: 0,
            teleop_shift_1_fuel: 0,
            teleop_shift_2_fuel: 0,
            teleop_shift_3_fuel: 0,
            teleop_shift_4_fuel: 0,
            endgame_fuel: 0,
            ferried_fuel: 0,
            auto_climb: false,
            climb_level: 0,
            climb_success: false,
            defense_rating: 1,
            defense_notes: String::new(),
            auto_path: String::new(),
            auto_notes: String::new(),
            notes: String::new(),
            robot_disabled: RobotDisabled::None,
            scouter_id,
            scouter_name: scouter_name.to_string(),
            scouter_team,
            created_at: now,
            updated_at: None,
        };
        entry.apply_form(form);
        entry
    }

    /// Overwrite the observed fields with values from a form.
    pub fn apply_form(&mut self, form: &ScoutingForm) {
        self.team_number = form.team_number;
        self.match_number = form.match_number;
        self.event_code = form.event_code.trim().to_string();
        self.alliance = form.alliance;
        self.auto_fuel = form.auto_fuel;
        self.transition_fuel = form.transition_fuel;
        self.teleop_shift_1_fuel = form.teleop_shift_1_fuel;
        self.teleop_shift_2_fuel = form.teleop_shift_2_fuel;
        self.teleop_shift_3_fuel = form.teleop_shift_3_fuel;
        self.teleop_shift_4_fuel = form.teleop_shift_4_fuel;
        self.endgame_fuel = form.endgame_fuel;
        self.ferried_fuel = form.ferried_fuel;
        self.auto_climb = form.auto_climb;
        self.climb_level = form.climb_level;
        // A failed attempt can't count as a success
        self.climb_success = form.climb_success && form.climb_level > 0;
        self.defense_rating = form.defense_rating;
        self.defense_notes = form.defense_notes.clone();
        self.auto_path = form.auto_path.clone();
        self.auto_notes = form.auto_notes.clone();
        self.notes = form.notes.clone();
        self.robot_disabled = form.robot_disabled;
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Request body for adding or editing a match entry.
#[derive(Debug, Clone, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ScoutingForm {
    #[validate(range(min = 1, max = 99999, message = "Invalid team number"))]
    pub team_number: i32,
    #[validate(range(min = 1, max = 999, message = "Invalid match number"))]
    pub match_number: i32,
    #[validate(
        length(max = 32, message = "Event code is too long"),
        custom(function = "not_blank", message = "Event code is required")
    )]
    pub event_code: String,
    pub alliance: Alliance,

    #[serde(default)]
    #[validate(range(min = 0, max = 500))]
    pub auto_fuel: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 500))]
    pub transition_fuel: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 500))]
    pub teleop_shift_1_fuel: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 500))]
    pub teleop_shift_2_fuel: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 500))]
    pub teleop_shift_3_fuel: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 500))]
    pub teleop_shift_4_fuel: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 500))]
    pub endgame_fuel: i32,
    #[serde(default)]
    #[validate(range(min = 0, max = 500))]
    pub ferried_fuel: i32,

    #[serde(default)]
    pub auto_climb: bool,
    #[serde(default)]
    #[validate(range(min = 0, max = 3, message = "Climb level must be 0-3"))]
    pub climb_level: i32,
    #[serde(default)]
    pub climb_success: bool,

    #[serde(default = "default_defense_rating")]
    #[validate(range(min = 1, max = 5, message = "Defense rating must be 1-5"))]
    pub defense_rating: i32,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub defense_notes: String,

    #[serde(default)]
    pub auto_path: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub auto_notes: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub notes: String,
    #[serde(default)]
    pub robot_disabled: RobotDisabled,
}

/// Match entry as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ScoutingEntryResponse {
    pub id: String,
    pub team_number: i32,
    pub match_number: i32,
    pub event_code: String,
    pub alliance: Alliance,
    pub auto_fuel: i32,
    pub transition_fuel: i32,
    pub teleop_shift_1_fuel: i32,
    pub teleop_shift_2_fuel: i32,
    pub teleop_shift_3_fuel: i32,
    pub teleop_shift_4_fuel: i32,
    pub endgame_fuel: i32,
    pub ferried_fuel: i32,
    pub teleop_fuel: i32,
    pub total_fuel: i32,
    pub auto_climb: bool,
    pub climb_level: i32,
    pub climb_success: bool,
    pub defense_rating: i32,
    pub defense_notes: String,
    pub auto_path: String,
    pub auto_notes: String,
    pub notes: String,
    pub robot_disabled: RobotDisabled,
    pub scouter_id: String,
    pub scouter_name: String,
    pub scouter_team: Option<i32>,
    pub created_at: String,
    pub updated_at: Option<String>,
    /// Whether the requesting user recorded this entry
    pub is_owner: bool,
}

impl ScoutingEntryResponse {
    pub fn for_viewer(entry: &TeamData, viewer: &ObjectId) -> Self {
        Self {
            id: entry.id.to_hex(),
            team_number: entry.team_number,
            match_number: entry.match_number,
            event_code: entry.event_code.clone(),
            alliance: entry.alliance,
            auto_fuel: entry.auto_fuel,
            transition_fuel: entry.transition_fuel,
            teleop_shift_1_fuel: entry.teleop_shift_1_fuel,
            teleop_shift_2_fuel: entry.teleop_shift_2_fuel,
            teleop_shift_3_fuel: entry.teleop_shift_3_fuel,
            teleop_shift_4_fuel: entry.teleop_shift_4_fuel,
            endgame_fuel: entry.endgame_fuel,
            ferried_fuel: entry.ferried_fuel,
            teleop_fuel: entry.teleop_fuel(),
            total_fuel: entry.total_fuel(),
            auto_climb: entry.auto_climb,
            climb_level: entry.climb_level,
            climb_success: entry.climb_success,
            defense_rating: entry.defense_rating,
            defense_notes: entry.defense_notes.clone(),
            auto_path: entry.auto_path.clone(),
            auto_notes: entry.auto_notes.clone(),
            notes: entry.notes.clone(),
            robot_disabled: entry.robot_disabled,
            scouter_id: entry.scouter_id.to_hex(),
            scouter_name: entry.scouter_name.clone(),
            scouter_team: entry.scouter_team,
            created_at: format_bson_rfc3339(entry.created_at),
            updated_at: entry.updated_at.map(format_bson_rfc3339),
            is_owner: entry.scouter_id == *viewer,
        }
    }
}

/// Entries for one match, grouped for the matches view.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MatchGroup {
    pub event_code: String,
    pub match_number: i32,
    pub red: Vec<ScoutingEntryResponse>,
    pub blue: Vec<ScoutingEntryResponse>,
    pub red_total_fuel: i32,
    pub blue_total_fuel: i32,
}

/// Group visible entries by `(event_code, match_number)`.
///
/// Groups are ordered by event then match number; entries keep the order
/// they were given in.
pub fn group_matches(entries: &[TeamData], viewer: &ObjectId) -> Vec<MatchGroup> {
    let mut groups: std::collections::BTreeMap<(String, i32), MatchGroup> =
        std::collections::BTreeMap::new();

    for entry in entries {
        let group = groups
            .entry((entry.event_code.clone(), entry.match_number))
            .or_insert_with(|| MatchGroup {
                event_code: entry.event_code.clone(),
                match_number: entry.match_number,
                red: Vec::new(),
                blue: Vec::new(),
                red_total_fuel: 0,
                blue_total_fuel: 0,
            });
        let response = ScoutingEntryResponse::for_viewer(entry, viewer);
        match entry.alliance {
            Alliance::Red => {
                group.red_total_fuel += response.total_fuel;
                group.red.push(response);
            }
            Alliance::Blue => {
                group.blue_total_fuel += response.total_fuel;
                group.blue.push(response);
            }
        }
    }

    groups.into_values().collect()
}

/// Auto path from a visible entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TeamPath {
    pub id: String,
    pub team_number: i32,
    pub match_number: i32,
    pub event_code: String,
    pub alliance: Alliance,
    pub auto_path: String,
    pub auto_notes: String,
    pub scouter_name: String,
    pub scouter_id: String,
}

impl From<&TeamData> for TeamPath {
    fn from(entry: &TeamData) -> Self {
        Self {
            id: entry.id.to_hex(),
            team_number: entry.team_number,
            match_number: entry.match_number,
            event_code: entry.event_code.clone(),
            alliance: entry.alliance,
            auto_path: entry.auto_path.clone(),
            auto_notes: entry.auto_notes.clone(),
            scouter_name: entry.scouter_name.clone(),
            scouter_id: entry.scouter_id.to_hex(),
        }
    }
}

/// Recorded auto path, without scouter details.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AutoPath {
    pub match_number: i32,
    pub event_code: String,
    pub image_data: String,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_form() -> ScoutingForm {
        ScoutingForm {
            team_number: 254,
            match_number: 12,
            event_code: "2026cave".to_string(),
            alliance: Alliance::Red,
            auto_fuel: 4,
            transition_fuel: 2,
            teleop_shift_1_fuel: 5,
            teleop_shift_2_fuel: 6,
            teleop_shift_3_fuel: 7,
            teleop_shift_4_fuel: 8,
            endgame_fuel: 3,
            ferried_fuel: 10,
            auto_climb: false,
            climb_level: 2,
            climb_success: true,
            defense_rating: 3,
            defense_notes: String::new(),
            auto_path: String::new(),
            auto_notes: String::new(),
            notes: "fast cycles".to_string(),
            robot_disabled: RobotDisabled::None,
        }
    }

    pub(crate) fn sample_entry(
        team_number: i32,
        match_number: i32,
        alliance: Alliance,
    ) -> TeamData {
        let mut form = sample_form();
        form.team_number = team_number;
        form.match_number = match_number;
        form.alliance = alliance;
        TeamData::from_form(
            &form,
            ObjectId::new(),
            "scout",
            Some(334),
            bson::DateTime::now(),
        )
    }

    #[test]
    fn test_fuel_totals() {
        let entry = sample_entry(254, 1, Alliance::Red);
        assert_eq!(entry.teleop_fuel(), 26);
        // ferried fuel excluded
        assert_eq!(entry.total_fuel(), 4 + 2 + 26 + 3);
    }

    #[test]
    fn test_climb_success_requires_level() {
        let mut form = sample_form();
        form.climb_level = 0;
        form.climb_success = true;
        let entry = TeamData::from_form(&form, ObjectId::new(), "s", None, bson::DateTime::now());
        assert!(!entry.climb_success);
    }

    #[test]
    fn test_form_validation_ranges() {
        let mut form = sample_form();
        assert!(form.validate().is_ok());

        form.climb_level = 4;
        assert!(form.validate().is_err());

        let mut form = sample_form();
        form.defense_rating = 0;
        assert!(form.validate().is_err());

        let mut form = sample_form();
        form.auto_fuel = -1;
        assert!(form.validate().is_err());

        let mut form = sample_form();
        form.event_code = String::new();
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_blank_event_code_rejected() {
        let mut form = sample_form();
        form.event_code = "   ".to_string();
        assert!(form.validate().is_err());

        form.event_code = " 2026cave ".to_string();
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_robot_disabled_wire_format() {
        let json = serde_json::to_string(&RobotDisabled::Partially).unwrap();
        assert_eq!(json, "\"Partially\"");
        let alliance: Alliance = serde_json::from_str("\"blue\"").unwrap();
        assert_eq!(alliance, Alliance::Blue);
    }

    #[test]
    fn test_group_matches() {
        let viewer = ObjectId::new();
        let entries = vec![
            sample_entry(254, 2, Alliance::Red),
            sample_entry(1678, 1, Alliance::Blue),
            sample_entry(971, 1, Alliance::Red),
            sample_entry(118, 1, Alliance::Blue),
        ];

        let groups = group_matches(&entries, &viewer);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].match_number, 1);
        assert_eq!(groups[0].red.len(), 1);
        assert_eq!(groups[0].blue.len(), 2);
        assert_eq!(groups[0].blue_total_fuel, 2 * 35);
        assert_eq!(groups[1].match_number, 2);
        assert!(!groups[1].red[0].is_owner);
    }
}
