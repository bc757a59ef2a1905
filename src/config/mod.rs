//! Configuration module for the BirdQuest backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Directory for stored photo payloads
    pub media_path: PathBuf,
    /// Secret for signing time-limited media URLs
    pub media_secret: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Fixed seed for species sampling; unset means seeded from entropy
    pub rng_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("BIRDQUEST_API_PSK").ok();

        let db_path = env::var("BIRDQUEST_DB_PATH")
            .unwrap_or_else(|_| "./data/app.sqlite".to_string())
            .into();

        let media_path = env::var("BIRDQUEST_MEDIA_PATH")
            .unwrap_or_else(|_| "./data/media".to_string())
            .into();

        let media_secret =
            env::var("BIRDQUEST_MEDIA_SECRET").unwrap_or_else(|_| "dev-media-secret".to_string());

        let bind_addr = env::var("BIRDQUEST_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid BIRDQUEST_BIND_ADDR format");

        let log_level = env::var("BIRDQUEST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let rng_seed = env::var("BIRDQUEST_RNG_SEED")
            .ok()
            .and_then(|s| s.parse().ok());

        Self {
            api_psk,
            db_path,
            media_path,
            media_secret,
            bind_addr,
            log_level,
            rng_seed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("BIRDQUEST_API_PSK");
        env::remove_var("BIRDQUEST_DB_PATH");
        env::remove_var("BIRDQUEST_MEDIA_PATH");
        env::remove_var("BIRDQUEST_MEDIA_SECRET");
        env::remove_var("BIRDQUEST_BIND_ADDR");
        env::remove_var("BIRDQUEST_LOG_LEVEL");
        env::remove_var("BIRDQUEST_RNG_SEED");

        let config = Config::from_env();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/app.sqlite"));
        assert_eq!(config.media_path, PathBuf::from("./data/media"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(config.rng_seed.is_none());
    }
}
