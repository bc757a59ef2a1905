//! BirdQuest Backend
//!
//! A production-grade REST backend for the BirdQuest EduGaming trip companion:
//! photo ingestion, probabilistic species identification, and gamified goal
//! progression over SQLite persistence.

mod api;
mod auth;
mod catalog;
mod config;
mod db;
mod errors;
mod goals;
mod identify;
mod ingest;
mod models;
mod storage;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use catalog::RarityCatalog;
use config::Config;
use db::Repository;
use identify::RandomIdentifier;
use ingest::ProgressionCoordinator;
use storage::ObjectStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub catalog: Arc<RarityCatalog>,
    pub store: Arc<ObjectStore>,
    pub coordinator: Arc<ProgressionCoordinator>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env();

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting BirdQuest Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Media path: {:?}", config.media_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    // Warn if PSK is not configured
    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (BIRDQUEST_API_PSK). Authentication is disabled!");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // Build the rarity catalog from the database
    let species = repo.list_species().await?;
    let catalog = Arc::new(RarityCatalog::new(species, config.rng_seed));
    tracing::info!("Rarity catalog loaded with {} species", catalog.len());
    if catalog.is_empty() {
        tracing::warn!("Species catalog is empty. Identification will fail until species are added.");
    }

    // Object storage for photo payloads
    let store = Arc::new(ObjectStore::new(
        config.media_path.clone(),
        config.media_secret.clone(),
    ));

    // Identification is a uniform-random stub until a real classifier lands
    let identifier = Arc::new(RandomIdentifier::new(catalog.clone()));
    let coordinator = Arc::new(ProgressionCoordinator::new(
        repo.clone(),
        catalog.clone(),
        identifier,
    ));

    // Create application state
    let state = AppState {
        repo,
        catalog,
        store,
        coordinator,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Clone PSK for the auth layer
    let psk = state.config.api_psk.clone();

    // API routes
    let api_routes = Router::new()
        // Users
        .route("/users", post(api::create_user))
        .route("/users/{id}", get(api::get_user))
        .route("/me/birds", get(api::my_birds))
        // Species catalog
        .route("/species", get(api::list_species))
        .route("/species", post(api::create_species))
        // Trips
        .route("/trips", post(api::start_trip))
        .route("/trips/active", get(api::active_trip))
        .route("/trips/{id}", get(api::get_trip))
        .route("/trips/{id}/end", post(api::end_trip))
        // Images (ingestion)
        .route("/images", post(api::upload_image))
        .route("/images", get(api::list_images))
        .route("/images/{id}", get(api::get_image))
        .route("/images/{id}/url", get(api::image_url))
        // Apply PSK auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Signed media serving and health check (no PSK required)
    let open_routes = Router::new()
        .route("/media/{key}", get(api::serve_media))
        .route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(open_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
