//! Database repository for CRUD operations.
//!
//! Uses prepared statements and conditional-version updates for data integrity.
//! Nested goal stacks and id lists are stored as JSON in TEXT columns.

use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    CountGoal, CreateSpeciesRequest, CreateUserRequest, Geolocation, Image, Species, SpecificGoal,
    Trip, User,
};

/// Attempts for the internal read-modify-write on a user's bird collection.
const MAX_COLLECTION_ATTEMPTS: u32 = 3;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== USER OPERATIONS ====================

    /// Create a new user.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO users (id, display_name, my_birds, created_at, version) VALUES (?, ?, '[]', ?, 1)",
        )
        .bind(&id)
        .bind(&request.display_name)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(User {
            id,
            display_name: request.display_name.clone(),
            my_birds: Vec::new(),
            created_at: now,
            version: 1,
        })
    }

    /// Get a user by ID.
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query(
            "SELECT id, display_name, my_birds, created_at, version FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    /// Add a species to a user's collection if not already present.
    ///
    /// Returns `true` if the collection changed. Uses a conditional-version
    /// update with a small retry so concurrent ingestions cannot drop an entry.
    pub async fn add_bird(&self, user_id: &str, species_id: &str) -> Result<bool, AppError> {
        for _ in 0..MAX_COLLECTION_ATTEMPTS {
            let user = self
                .get_user(user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

            if user.has_bird(species_id) {
                return Ok(false);
            }

            let mut my_birds = user.my_birds.clone();
            my_birds.push(species_id.to_string());
            let birds_json = serde_json::to_string(&my_birds)?;

            let result = sqlx::query(
                "UPDATE users SET my_birds = ?, version = ? WHERE id = ? AND version = ?",
            )
            .bind(&birds_json)
            .bind(user.version + 1)
            .bind(user_id)
            .bind(user.version)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() > 0 {
                return Ok(true);
            }
            // Version moved under us, reload and retry
        }

        Err(AppError::Internal(format!(
            "Gave up updating user {} collection after repeated conflicts",
            user_id
        )))
    }

    // ==================== SPECIES OPERATIONS ====================

    /// List all species in the catalog.
    pub async fn list_species(&self) -> Result<Vec<Species>, AppError> {
        let rows = sqlx::query("SELECT id, name, rarity, images FROM species ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(species_from_row).collect())
    }

    /// Get a species by ID.
    pub async fn get_species(&self, id: &str) -> Result<Option<Species>, AppError> {
        let row = sqlx::query("SELECT id, name, rarity, images FROM species WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(species_from_row))
    }

    /// Add a species to the catalog.
    pub async fn create_species(&self, request: &CreateSpeciesRequest) -> Result<Species, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let images_json = serde_json::to_string(&request.images)?;

        sqlx::query(
            "INSERT INTO species (id, name, rarity, images, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&request.name)
        .bind(request.rarity)
        .bind(&images_json)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(Species {
            id,
            name: request.name.clone(),
            rarity: request.rarity,
            images: request.images.clone(),
        })
    }

    // ==================== TRIP OPERATIONS ====================

    /// Create a new trip with its initial goal stacks.
    ///
    /// Fails with a conflict if the user already has an active trip (enforced
    /// by the partial unique index on active trips).
    pub async fn create_trip(
        &self,
        user_id: &str,
        is_edugaming: bool,
        specific_goals: &[SpecificGoal],
        count_goals: &[CountGoal],
    ) -> Result<Trip, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let specific_json = serde_json::to_string(specific_goals)?;
        let count_json = serde_json::to_string(count_goals)?;

        let result = sqlx::query(
            r#"INSERT INTO trips (id, user_id, is_active, is_edugaming, specific_goals, count_goals, images, started_at, version)
               VALUES (?, ?, 1, ?, ?, ?, '[]', ?, 1)"#,
        )
        .bind(&id)
        .bind(user_id)
        .bind(is_edugaming as i32)
        .bind(&specific_json)
        .bind(&count_json)
        .bind(&now)
        .execute(&self.pool)
        .await;

        if let Err(sqlx::Error::Database(db_err)) = &result {
            if db_err.is_unique_violation() {
                return Err(AppError::Validation(format!(
                    "User {} already has an active trip",
                    user_id
                )));
            }
        }
        result?;

        Ok(Trip {
            id,
            user_id: user_id.to_string(),
            is_active: true,
            is_edugaming,
            specific_goals: specific_goals.to_vec(),
            count_goals: count_goals.to_vec(),
            images: Vec::new(),
            started_at: now,
            ended_at: None,
            version: 1,
        })
    }

    /// Get a trip by ID.
    pub async fn get_trip(&self, id: &str) -> Result<Option<Trip>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, user_id, is_active, is_edugaming, specific_goals, count_goals,
                      images, started_at, ended_at, version
               FROM trips WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(trip_from_row))
    }

    /// Find the user's currently active trip.
    pub async fn find_active_trip(&self, user_id: &str) -> Result<Option<Trip>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, user_id, is_active, is_edugaming, specific_goals, count_goals,
                      images, started_at, ended_at, version
               FROM trips WHERE user_id = ? AND is_active = 1"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(trip_from_row))
    }

    /// Replace a trip's goal stacks and image list under an optimistic version check.
    ///
    /// Returns the new version. Zero rows affected means a concurrent writer
    /// committed first and surfaces as a retryable conflict.
    pub async fn save_trip_progress(
        &self,
        trip_id: &str,
        expected_version: i64,
        specific_goals: &[SpecificGoal],
        count_goals: &[CountGoal],
        images: &[String],
    ) -> Result<i64, AppError> {
        let specific_json = serde_json::to_string(specific_goals)?;
        let count_json = serde_json::to_string(count_goals)?;
        let images_json = serde_json::to_string(images)?;
        let new_version = expected_version + 1;

        let result = sqlx::query(
            r#"UPDATE trips SET specific_goals = ?, count_goals = ?, images = ?, version = ?
               WHERE id = ? AND version = ? AND is_active = 1"#,
        )
        .bind(&specific_json)
        .bind(&count_json)
        .bind(&images_json)
        .bind(new_version)
        .bind(trip_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = self.get_trip(trip_id).await?;
            return Err(AppError::Conflict {
                message: format!("Concurrent modification detected for trip {}", trip_id),
                current_version: current.map(|t| t.version).unwrap_or(0),
            });
        }

        Ok(new_version)
    }

    /// End a trip, deactivating it.
    pub async fn end_trip(&self, trip_id: &str, user_id: &str) -> Result<Trip, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"UPDATE trips SET is_active = 0, ended_at = ?, version = version + 1
               WHERE id = ? AND user_id = ? AND is_active = 1"#,
        )
        .bind(&now)
        .bind(trip_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No active trip {} for this user",
                trip_id
            )));
        }

        self.get_trip(trip_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Trip {} not found", trip_id)))
    }

    // ==================== IMAGE OPERATIONS ====================

    /// Create an image record.
    pub async fn create_image(&self, image: &Image) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO images (id, user_id, trip_id, storage_key, latitude, longitude, taken_at, species_id, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&image.id)
        .bind(&image.user_id)
        .bind(&image.trip_id)
        .bind(&image.storage_key)
        .bind(image.location.map(|l| l.latitude))
        .bind(image.location.map(|l| l.longitude))
        .bind(&image.taken_at)
        .bind(&image.species_id)
        .bind(&image.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get an image by ID.
    pub async fn get_image(&self, id: &str) -> Result<Option<Image>, AppError> {
        let row = sqlx::query(
            r#"SELECT id, user_id, trip_id, storage_key, latitude, longitude, taken_at, species_id, created_at
               FROM images WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(image_from_row))
    }

    /// List a user's images, newest first.
    pub async fn list_user_images(&self, user_id: &str) -> Result<Vec<Image>, AppError> {
        let rows = sqlx::query(
            r#"SELECT id, user_id, trip_id, storage_key, latitude, longitude, taken_at, species_id, created_at
               FROM images WHERE user_id = ? ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(image_from_row).collect())
    }
}

// Helper functions for row conversion

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> User {
    let my_birds_str: String = row.get("my_birds");
    User {
        id: row.get("id"),
        display_name: row.get("display_name"),
        my_birds: parse_json_array(&my_birds_str),
        created_at: row.get("created_at"),
        version: row.get("version"),
    }
}

fn species_from_row(row: &sqlx::sqlite::SqliteRow) -> Species {
    let images_str: String = row.get("images");
    Species {
        id: row.get("id"),
        name: row.get("name"),
        rarity: row.get("rarity"),
        images: parse_json_array(&images_str),
    }
}

fn trip_from_row(row: &sqlx::sqlite::SqliteRow) -> Trip {
    let is_active: i32 = row.get("is_active");
    let is_edugaming: i32 = row.get("is_edugaming");
    let specific_str: String = row.get("specific_goals");
    let count_str: String = row.get("count_goals");
    let images_str: String = row.get("images");

    Trip {
        id: row.get("id"),
        user_id: row.get("user_id"),
        is_active: is_active != 0,
        is_edugaming: is_edugaming != 0,
        specific_goals: parse_json(&specific_str),
        count_goals: parse_json(&count_str),
        images: parse_json_array(&images_str),
        started_at: row.get("started_at"),
        ended_at: row.get("ended_at"),
        version: row.get("version"),
    }
}

fn image_from_row(row: &sqlx::sqlite::SqliteRow) -> Image {
    let latitude: Option<f64> = row.get("latitude");
    let longitude: Option<f64> = row.get("longitude");
    let location = match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Some(Geolocation {
            latitude,
            longitude,
        }),
        _ => None,
    };

    Image {
        id: row.get("id"),
        user_id: row.get("user_id"),
        trip_id: row.get("trip_id"),
        storage_key: row.get("storage_key"),
        location,
        taken_at: row.get("taken_at"),
        species_id: row.get("species_id"),
        created_at: row.get("created_at"),
    }
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn parse_json<T: serde::de::DeserializeOwned + Default>(s: &str) -> T {
    serde_json::from_str(s).unwrap_or_default()
}
