//! Per-robot performance aggregates.
//!
//! [`TeamStats`] is computed in-process from the entries a caller can see
//! (team stats and compare views). The leaderboards are computed by the
//! database; [`LeaderboardEntry`] and [`ScouterLeaderboardEntry`] are the
//! shapes those pipelines produce.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::{RobotDisabled, TeamData};

/// Averages for one robot over the entries provided.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TeamStats {
    pub team_number: i32,
    pub matches_scouted: u32,

    // ─── Fuel ────────────────────────────────────────────────────
    pub avg_auto_fuel: f64,
    pub avg_transition_fuel: f64,
    pub avg_teleop_fuel: f64,
    pub avg_endgame_fuel: f64,
    pub avg_ferried_fuel: f64,
    pub avg_total_fuel: f64,
    pub max_total_fuel: i32,

    // ─── Climb ───────────────────────────────────────────────────
    /// Percent of matches with a successful climb
    pub climb_success_rate: f64,
    /// Average level over successful climbs
    pub avg_climb_level: f64,
    /// Percent of matches with an auto climb
    pub auto_climb_rate: f64,

    // ─── Defense / reliability ───────────────────────────────────
    pub avg_defense_rating: f64,
    pub disabled_matches: u32,
    pub partially_disabled_matches: u32,
}

impl TeamStats {
    /// Compute stats for `team_number` from `entries`.
    ///
    /// Entries for other robots are ignored. With no matching entries every
    /// average is zero.
    pub fn from_entries(team_number: i32, entries: &[TeamData]) -> Self {
        let mut stats = TeamStats {
            team_number,
            ..Default::default()
        };

        let mut sums = [0i64; 6];
        let mut defense_sum = 0i64;
        let mut climbs = 0u32;
        let mut climb_level_sum = 0i64;
        let mut auto_climbs = 0u32;

        for entry in entries.iter().filter(|e| e.team_number == team_number) {
            stats.matches_scouted += 1;
            sums[0] += i64::from(entry.auto_fuel);
            sums[1] += i64::from(entry.transition_fuel);
            sums[2] += i64::from(entry.teleop_fuel());
            sums[3] += i64::from(entry.endgame_fuel);
            sums[4] += i64::from(entry.ferried_fuel);
            sums[5] += i64::from(entry.total_fuel());
            stats.max_total_fuel = stats.max_total_fuel.max(entry.total_fuel());
            defense_sum += i64::from(entry.defense_rating);

            if entry.climb_success {
                climbs += 1;
                climb_level_sum += i64::from(entry.climb_level);
            }
            if entry.auto_climb {
                auto_climbs += 1;
            }
            match entry.robot_disabled {
                RobotDisabled::None => {}
                RobotDisabled::Partially => stats.partially_disabled_matches += 1,
                RobotDisabled::Full => stats.disabled_matches += 1,
            }
        }

        if stats.matches_scouted == 0 {
            return stats;
        }

        let n = f64::from(stats.matches_scouted);
        stats.avg_auto_fuel = round2(sums[0] as f64 / n);
        stats.avg_transition_fuel = round2(sums[1] as f64 / n);
        stats.avg_teleop_fuel = round2(sums[2] as f64 / n);
        stats.avg_endgame_fuel = round2(sums[3] as f64 / n);
        stats.avg_ferried_fuel = round2(sums[4] as f64 / n);
        stats.avg_total_fuel = round2(sums[5] as f64 / n);
        stats.avg_defense_rating = round2(defense_sum as f64 / n);
        stats.climb_success_rate = round2(f64::from(climbs) * 100.0 / n);
        stats.auto_climb_rate = round2(f64::from(auto_climbs) * 100.0 / n);
        if climbs > 0 {
            stats.avg_climb_level = round2(climb_level_sum as f64 / f64::from(climbs));
        }

        stats
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Leaderboard sort keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardSort {
    #[default]
    TotalFuel,
    AutoFuel,
    TeleopFuel,
    ClimbRate,
    DefenseRating,
    MatchesScouted,
}

impl LeaderboardSort {
    /// Field of [`LeaderboardEntry`] the pipeline sorts on.
    pub fn field(self) -> &'static str {
        match self {
            LeaderboardSort::TotalFuel => "avg_total_fuel",
            LeaderboardSort::AutoFuel => "avg_auto_fuel",
            LeaderboardSort::TeleopFuel => "avg_teleop_fuel",
            LeaderboardSort::ClimbRate => "climb_success_rate",
            LeaderboardSort::DefenseRating => "avg_defense_rating",
            LeaderboardSort::MatchesScouted => "matches_scouted",
        }
    }
}

/// One robot on the leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    #[serde(rename(deserialize = "_id"))]
    pub team_number: i32,
    pub matches_scouted: i32,
    pub avg_auto_fuel: f64,
    pub avg_teleop_fuel: f64,
    pub avg_total_fuel: f64,
    pub max_total_fuel: i32,
    pub climb_success_rate: f64,
    pub avg_defense_rating: f64,
}

/// Scouter leaderboard sort keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScouterSort {
    #[default]
    MatchCount,
    UniqueTeams,
}

impl ScouterSort {
    pub fn field(self) -> &'static str {
        match self {
            ScouterSort::MatchCount => "match_count",
            ScouterSort::UniqueTeams => "unique_teams_count",
        }
    }
}

/// One scouter on the scouter leaderboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ScouterLeaderboardEntry {
    pub username: String,
    #[serde(rename = "teamNumber", default)]
    pub team_number: Option<i32>,
    pub match_count: i32,
    pub unique_teams_count: i32,
}
