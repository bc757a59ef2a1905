//! Species catalog entry matching the frontend Bird interface.

use serde::{Deserialize, Serialize};

/// A bird species in the rarity catalog. Immutable reference data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Species {
    pub id: String,
    pub name: String,
    /// Rarity tier; higher means rarer. Goal difficulty scales with this.
    pub rarity: i64,
    /// Representative image references, first entry is the display image.
    #[serde(default)]
    pub images: Vec<String>,
}

impl Species {
    /// Display image shown next to a goal targeting this species.
    pub fn display_image(&self) -> Option<&str> {
        self.images.first().map(|s| s.as_str())
    }
}

/// Request body for adding a species to the catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSpeciesRequest {
    pub name: String,
    pub rarity: i64,
    #[serde(default)]
    pub images: Vec<String>,
}
