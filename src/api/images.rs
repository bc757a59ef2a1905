//! Image upload, retrieval, and media-serving endpoints.
//!
//! Upload is the ingestion entry point: the photo is stored, then the
//! progression coordinator identifies a species and advances the trip goals.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::auth::CurrentUser;
use crate::errors::AppError;
use crate::ingest::IngestionOutcome;
use crate::models::{Geolocation, Image};
use crate::storage::SIGNED_URL_TTL_SECS;
use crate::AppState;

/// POST /api/images - Upload a photo and run the ingestion flow.
///
/// Multipart fields: `photo` (required, image/*), `location` (optional JSON
/// with latitude/longitude), `timestamp` (optional RFC 3339, defaults to now).
pub async fn upload_image(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    mut multipart: Multipart,
) -> ApiResult<IngestionOutcome> {
    let mut photo: Option<(String, Vec<u8>)> = None;
    let mut location: Option<Geolocation> = None;
    let mut taken_at: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        match field.name() {
            Some("photo") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                if !content_type.starts_with("image/") {
                    return Err(AppError::Validation(
                        "Not an image! Please upload an image.".to_string(),
                    ));
                }
                let file_name = field.file_name().unwrap_or("photo").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read photo: {}", e)))?;
                photo = Some((file_name, bytes.to_vec()));
            }
            Some("location") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read location: {}", e)))?;
                location = Some(serde_json::from_str(&text)?);
            }
            Some("timestamp") => {
                let text = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read timestamp: {}", e))
                })?;
                taken_at = Some(text);
            }
            _ => {}
        }
    }

    let (file_name, bytes) =
        photo.ok_or_else(|| AppError::Validation("No file uploaded".to_string()))?;
    let taken_at = taken_at.unwrap_or_else(|| Utc::now().to_rfc3339());

    let storage_key = state.store.put(&file_name, &bytes).await?;

    let outcome = state
        .coordinator
        .ingest(&user_id, &storage_key, location, &taken_at, &bytes)
        .await?;

    tracing::info!(
        image_id = %outcome.image_id,
        species_id = %outcome.species.id,
        level_ups = outcome.level_ups.len(),
        "image ingested"
    );
    success(outcome)
}

/// GET /api/images/:id - Get one of the caller's image records.
pub async fn get_image(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Image> {
    let image = state
        .repo
        .get_image(&id)
        .await?
        .filter(|i| i.user_id == user_id)
        .ok_or_else(|| {
            AppError::NotFound("Image not found or you do not have permission to view it.".to_string())
        })?;
    success(image)
}

/// GET /api/images - List the caller's images, newest first.
pub async fn list_images(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Vec<Image>> {
    let images = state.repo.list_user_images(&user_id).await?;
    success(images)
}

/// A time-limited link to the stored photo bytes.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub url: String,
    pub expires: i64,
}

/// GET /api/images/:id/url - Generate a pre-signed URL for the image.
pub async fn image_url(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<SignedUrlResponse> {
    let image = state
        .repo
        .get_image(&id)
        .await?
        .filter(|i| i.user_id == user_id)
        .ok_or_else(|| {
            AppError::NotFound("Image not found or you do not have permission to view it.".to_string())
        })?;

    let expires = Utc::now().timestamp() + SIGNED_URL_TTL_SECS;
    let url = state.store.signed_url(&image.storage_key, expires);
    success(SignedUrlResponse { url, expires })
}

/// Query parameters carried by a signed media URL.
#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub expires: i64,
    pub sig: String,
}

/// GET /media/:key - Serve stored bytes; the signature is the capability.
pub async fn serve_media(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<MediaQuery>,
) -> Result<Response, AppError> {
    let now = Utc::now().timestamp();
    if !state.store.verify(&key, params.expires, &params.sig, now) {
        return Err(AppError::Unauthorized(
            "Invalid or expired media signature".to_string(),
        ));
    }

    let bytes = state.store.get(&key).await?;
    let content_type = content_type_for(&key);
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
