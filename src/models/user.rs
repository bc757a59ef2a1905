//! User model with the collected-species set.

use serde::{Deserialize, Serialize};

/// An application user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub display_name: String,
    /// Distinct species ids ever identified for this user. Membership is by
    /// id equality; insertion order carries no meaning.
    #[serde(default)]
    pub my_birds: Vec<String>,
    pub created_at: String,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

impl User {
    pub fn has_bird(&self, species_id: &str) -> bool {
        self.my_birds.iter().any(|id| id == species_id)
    }
}

/// Request body for creating a new user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub display_name: String,
}
