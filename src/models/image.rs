//! Image record created once per ingestion event.

use serde::{Deserialize, Serialize};

/// Where a photo was taken.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// A stored photo with its identified species. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: String,
    pub user_id: String,
    pub trip_id: String,
    /// Opaque key into the object store; the backend never inspects the
    /// payload beyond handing it to the identifier.
    pub storage_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Geolocation>,
    /// Client-reported capture time.
    pub taken_at: String,
    pub species_id: String,
    pub created_at: String,
}
