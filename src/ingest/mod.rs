//! Ingestion orchestration.
//!
//! `ProgressionCoordinator` turns one uploaded observation into an identified
//! species, advanced goal stacks, and consistent writes across the trip, the
//! image record, and the user's collected-species set.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::catalog::RarityCatalog;
use crate::db::Repository;
use crate::errors::AppError;
use crate::goals::{self, LevelUp};
use crate::identify::{Identifier, Observation};
use crate::models::{Geolocation, Image, Species};

/// Attempts for the trip commit before a version conflict becomes fatal.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Outcome of one ingestion event, relayed to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionOutcome {
    pub image_id: String,
    pub trip_id: String,
    pub species: Species,
    pub level_ups: Vec<LevelUp>,
}

/// Orchestrates one ingestion event end-to-end.
pub struct ProgressionCoordinator {
    repo: Arc<Repository>,
    catalog: Arc<RarityCatalog>,
    identifier: Arc<dyn Identifier>,
}

impl ProgressionCoordinator {
    pub fn new(
        repo: Arc<Repository>,
        catalog: Arc<RarityCatalog>,
        identifier: Arc<dyn Identifier>,
    ) -> Self {
        Self {
            repo,
            catalog,
            identifier,
        }
    }

    /// Ingest one observation for the user's active trip.
    ///
    /// Validation happens before any write. The trip commit uses an
    /// optimistic version check; a conflict reloads the trip and recomputes
    /// the goal advance, bounded by `MAX_COMMIT_ATTEMPTS`. Image and
    /// collection writes happen strictly after the trip commit and surface
    /// `PartialCommit` on failure rather than being retried — a retry could
    /// double-advance the goals.
    pub async fn ingest(
        &self,
        user_id: &str,
        storage_key: &str,
        location: Option<Geolocation>,
        taken_at: &str,
        payload: &[u8],
    ) -> Result<IngestionOutcome, AppError> {
        // Validation, no side effects yet
        self.repo
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let mut trip = self
            .repo
            .find_active_trip(user_id)
            .await?
            .ok_or(AppError::NoActiveTrip)?;

        if !trip.is_edugaming {
            return Err(AppError::FeatureDisabled);
        }

        let observation = Observation {
            payload,
            taken_at,
            location: location.as_ref(),
        };
        let species = self.identifier.identify(&observation)?;

        tracing::debug!(
            trip_id = %trip.id,
            species_id = %species.id,
            live_target = ?trip.live_specific_goal().map(|g| g.species_id.as_str()),
            birds_found = ?trip.live_count_goal().map(|g| g.birds_found),
            "identified species for observation"
        );

        let image_id = uuid::Uuid::new_v4().to_string();

        // Trip commit with bounded recompute-and-retry on version conflicts
        let mut attempt = 0;
        let advance = loop {
            let advance = goals::advance(
                &trip.specific_goals,
                &trip.count_goals,
                &species,
                &self.catalog,
            )?;

            let mut images = trip.images.clone();
            images.push(image_id.clone());

            match self
                .repo
                .save_trip_progress(
                    &trip.id,
                    trip.version,
                    &advance.specific_goals,
                    &advance.count_goals,
                    &images,
                )
                .await
            {
                Ok(_) => break advance,
                Err(AppError::Conflict { .. }) if attempt + 1 < MAX_COMMIT_ATTEMPTS => {
                    attempt += 1;
                    tracing::debug!(trip_id = %trip.id, attempt, "trip version conflict, retrying");
                    trip = self
                        .repo
                        .get_trip(&trip.id)
                        .await?
                        .ok_or(AppError::NoActiveTrip)?;
                    if !trip.is_active {
                        // Trip ended while we were in flight
                        return Err(AppError::NoActiveTrip);
                    }
                }
                Err(e) => return Err(e),
            }
        };

        // Post-commit writes; failures here must not be retried
        let image = Image {
            id: image_id.clone(),
            user_id: user_id.to_string(),
            trip_id: trip.id.clone(),
            storage_key: storage_key.to_string(),
            location,
            taken_at: taken_at.to_string(),
            species_id: species.id.clone(),
            created_at: Utc::now().to_rfc3339(),
        };

        if let Err(e) = self.repo.create_image(&image).await {
            tracing::error!(trip_id = %trip.id, image_id = %image_id, "image write failed after trip commit: {}", e);
            return Err(AppError::PartialCommit {
                message: format!(
                    "Trip {} updated but image record creation failed: {}",
                    trip.id, e
                ),
                image_committed: false,
                collection_updated: false,
            });
        }

        if let Err(e) = self.repo.add_bird(user_id, &species.id).await {
            tracing::error!(user_id, species_id = %species.id, "collection update failed after trip commit: {}", e);
            return Err(AppError::PartialCommit {
                message: format!(
                    "Trip {} and image updated but collection update failed: {}",
                    trip.id, e
                ),
                image_committed: true,
                collection_updated: false,
            });
        }

        Ok(IngestionOutcome {
            image_id,
            trip_id: trip.id,
            species,
            level_ups: advance.level_ups,
        })
    }
}
