//! Trip model and its two goal stacks.
//!
//! Goal stacks are append-only: earlier entries are immutable history, only
//! the last entry is live. Accessors below keep that convention in one place.

use serde::{Deserialize, Serialize};

/// Progression state of a single goal entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GoalStatus {
    InProgress,
    Success,
}

impl Default for GoalStatus {
    fn default() -> Self {
        GoalStatus::InProgress
    }
}

/// A goal targeting one specific species.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpecificGoal {
    pub species_id: String,
    pub species_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// 1..=3, never exceeds the cap.
    pub level: i64,
    #[serde(default)]
    pub status: GoalStatus,
}

/// A goal counting birds found regardless of species.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CountGoal {
    /// Target count, always level * 3.
    pub count: i64,
    /// 1..=5, never exceeds the cap.
    pub level: i64,
    #[serde(default)]
    pub birds_found: i64,
    #[serde(default)]
    pub status: GoalStatus,
}

/// A bounded outdoor session during which a user uploads bird photos.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub id: String,
    pub user_id: String,
    pub is_active: bool,
    pub is_edugaming: bool,
    #[serde(default)]
    pub specific_goals: Vec<SpecificGoal>,
    #[serde(default)]
    pub count_goals: Vec<CountGoal>,
    /// Ids of images captured during this trip, in upload order.
    #[serde(default)]
    pub images: Vec<String>,
    pub started_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<String>,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

impl Trip {
    /// The live specific goal, if any.
    pub fn live_specific_goal(&self) -> Option<&SpecificGoal> {
        self.specific_goals.last()
    }

    /// The live count goal, if any.
    pub fn live_count_goal(&self) -> Option<&CountGoal> {
        self.count_goals.last()
    }
}

/// Request body for starting a new trip.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTripRequest {
    #[serde(default = "default_edugaming")]
    pub is_edugaming: bool,
}

fn default_edugaming() -> bool {
    true
}
