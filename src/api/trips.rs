//! Trip lifecycle API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::goals;
use crate::models::{StartTripRequest, Trip};
use crate::AppState;

/// POST /api/trips - Start a new trip for the caller.
///
/// An edugaming trip is seeded with a level-1 specific goal and a level-1
/// count goal so it is immediately playable.
pub async fn start_trip(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(request): Json<StartTripRequest>,
) -> ApiResult<Trip> {
    state
        .repo
        .get_user(&user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

    let (specific_goals, count_goals) = if request.is_edugaming {
        goals::initial_goals(&state.catalog)?
    } else {
        (Vec::new(), Vec::new())
    };

    let trip = state
        .repo
        .create_trip(&user_id, request.is_edugaming, &specific_goals, &count_goals)
        .await?;

    tracing::info!(trip_id = %trip.id, user_id = %user_id, "trip started");
    success(trip)
}

/// GET /api/trips/active - The caller's currently active trip.
pub async fn active_trip(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Trip> {
    let trip = state
        .repo
        .find_active_trip(&user_id)
        .await?
        .ok_or(AppError::NoActiveTrip)?;
    success(trip)
}

/// GET /api/trips/:id - Get one of the caller's trips.
pub async fn get_trip(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Trip> {
    let trip = state
        .repo
        .get_trip(&id)
        .await?
        .filter(|t| t.user_id == user_id)
        .ok_or_else(|| AppError::NotFound(format!("Trip {} not found", id)))?;
    success(trip)
}

/// POST /api/trips/:id/end - End the caller's trip.
pub async fn end_trip(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Trip> {
    let trip = state.repo.end_trip(&id, &user_id).await?;
    tracing::info!(trip_id = %trip.id, user_id = %user_id, "trip ended");
    success(trip)
}
