//! Error handling module for the BirdQuest backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
#[allow(dead_code)]
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const NO_ACTIVE_TRIP: &str = "NO_ACTIVE_TRIP";
    pub const FEATURE_DISABLED: &str = "FEATURE_DISABLED";
    pub const EMPTY_CATALOG: &str = "EMPTY_CATALOG";
    pub const NO_SPECIES_AT_TIER: &str = "NO_SPECIES_AT_TIER";
    pub const VERSION_MISMATCH: &str = "VERSION_MISMATCH";
    pub const PARTIAL_COMMIT: &str = "PARTIAL_COMMIT";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required
    Unauthorized(String),
    /// Resource not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Ingestion attempted without an active trip
    NoActiveTrip,
    /// EduGaming is not enabled for the active trip
    FeatureDisabled,
    /// The species catalog has no entries
    EmptyCatalog,
    /// No catalog entry at the requested rarity tier
    NoSpeciesAtTier { tier: i64 },
    /// Optimistic concurrency conflict, retryable
    Conflict {
        message: String,
        current_version: i64,
    },
    /// Trip committed but a follow-up write failed; never retried automatically
    PartialCommit {
        message: String,
        image_committed: bool,
        collection_updated: bool,
    },
    /// Database error
    Database(String),
    /// Object storage error
    Storage(String),
    /// Internal server error
    Internal(String),
    /// Bad request
    BadRequest(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NoActiveTrip => StatusCode::BAD_REQUEST,
            AppError::FeatureDisabled => StatusCode::FORBIDDEN,
            AppError::EmptyCatalog => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::NoSpeciesAtTier { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::PartialCommit { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::NoActiveTrip => codes::NO_ACTIVE_TRIP,
            AppError::FeatureDisabled => codes::FEATURE_DISABLED,
            AppError::EmptyCatalog => codes::EMPTY_CATALOG,
            AppError::NoSpeciesAtTier { .. } => codes::NO_SPECIES_AT_TIER,
            AppError::Conflict { .. } => codes::VERSION_MISMATCH,
            AppError::PartialCommit { .. } => codes::PARTIAL_COMMIT,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Storage(_) => codes::STORAGE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::NoActiveTrip => {
                "No active trip found. Start a trip before uploading photos.".to_string()
            }
            AppError::FeatureDisabled => "EduGaming is not enabled for this trip.".to_string(),
            AppError::EmptyCatalog => "The species catalog is empty.".to_string(),
            AppError::NoSpeciesAtTier { tier } => {
                format!("No species in the catalog at rarity tier {}", tier)
            }
            AppError::Conflict { message, .. } => message.clone(),
            AppError::PartialCommit { message, .. } => message.clone(),
            AppError::Database(msg) => msg.clone(),
            AppError::Storage(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        tracing::error!("Storage I/O error: {:?}", err);
        AppError::Storage(format!("Storage error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let details = match error {
            AppError::Conflict {
                current_version, ..
            } => Some(serde_json::json!({ "currentVersion": current_version })),
            AppError::PartialCommit {
                image_committed,
                collection_updated,
                ..
            } => Some(serde_json::json!({
                "tripCommitted": true,
                "imageCommitted": image_committed,
                "collectionUpdated": collection_updated,
            })),
            AppError::NoSpeciesAtTier { tier } => Some(serde_json::json!({ "tier": tier })),
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
