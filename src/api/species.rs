//! Species catalog API endpoints.

use axum::{extract::State, Json};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{CreateSpeciesRequest, Species};
use crate::AppState;

/// GET /api/species - List the rarity catalog.
pub async fn list_species(State(state): State<AppState>) -> ApiResult<Vec<Species>> {
    let species = state.repo.list_species().await?;
    success(species)
}

/// POST /api/species - Add a species to the catalog.
pub async fn create_species(
    State(state): State<AppState>,
    Json(request): Json<CreateSpeciesRequest>,
) -> ApiResult<Species> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Species name is required".to_string()));
    }
    if request.rarity < 1 {
        return Err(AppError::Validation(
            "Rarity tier must be at least 1".to_string(),
        ));
    }

    let species = state.repo.create_species(&request).await?;

    // Refresh the in-memory sampling snapshot
    let all = state.repo.list_species().await?;
    state.catalog.reload(all);

    success(species)
}
