//! Integration tests for the BirdQuest backend.

use std::sync::Arc;

use reqwest::multipart;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::catalog::RarityCatalog;
use crate::config::Config;
use crate::db::{init_database, Repository};
use crate::identify::RandomIdentifier;
use crate::ingest::ProgressionCoordinator;
use crate::storage::ObjectStore;
use crate::{create_router, AppState};

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some("test-api-key".to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");
        let media_path = temp_dir.path().join("media");

        // Initialize database
        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        // Seeded catalog makes every species draw deterministic
        let species = repo.list_species().await.expect("Failed to list species");
        let catalog = Arc::new(RarityCatalog::new(species, Some(42)));

        let store = Arc::new(ObjectStore::new(
            media_path.clone(),
            "test-media-secret".to_string(),
        ));

        let identifier = Arc::new(RandomIdentifier::new(catalog.clone()));
        let coordinator = Arc::new(ProgressionCoordinator::new(
            repo.clone(),
            catalog.clone(),
            identifier,
        ));

        // Create config
        let config = Config {
            api_psk: psk.clone(),
            db_path,
            media_path,
            media_secret: "test-media-secret".to_string(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            rng_seed: Some(42),
        };

        let state = AppState {
            repo,
            catalog,
            store,
            coordinator,
            config: Arc::new(config),
        };

        let app = create_router(state);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        // Spawn server
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a user and return its id.
    async fn create_user(&self, name: &str) -> String {
        let resp = self
            .client
            .post(self.url("/api/users"))
            .json(&json!({ "displayName": name }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Add a species to the catalog and return its id.
    async fn create_species(&self, name: &str, rarity: i64) -> String {
        let resp = self
            .client
            .post(self.url("/api/species"))
            .json(&json!({ "name": name, "rarity": rarity, "images": [format!("{}.jpg", name)] }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Start a trip for the user and return the trip body.
    async fn start_trip(&self, user_id: &str, is_edugaming: bool) -> Value {
        let resp = self
            .client
            .post(self.url("/api/trips"))
            .header("x-user-id", user_id)
            .json(&json!({ "isEdugaming": is_edugaming }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }

    /// Upload a photo for the user, returning the raw response.
    async fn upload_photo(&self, user_id: &str) -> reqwest::Response {
        let form = multipart::Form::new()
            .part(
                "photo",
                multipart::Part::bytes(b"fake jpeg bytes".to_vec())
                    .file_name("bird.jpg")
                    .mime_str("image/jpeg")
                    .unwrap(),
            )
            .text("location", r#"{"latitude":47.37,"longitude":8.54}"#)
            .text("timestamp", "2024-05-01T08:00:00Z");

        self.client
            .post(self.url("/api/images"))
            .header("x-user-id", user_id)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    async fn active_trip(&self, user_id: &str) -> Value {
        let resp = self
            .client
            .get(self.url("/api/trips/active"))
            .header("x-user-id", user_id)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.unwrap();
        body["data"].clone()
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_psk() {
    let fixture = TestFixture::new().await;

    // Client without the default x-api-key header
    let client = Client::new();
    let resp = client
        .get(fixture.url("/api/species"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_missing_user_header() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/api/trips/active"))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_species_validation() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .post(fixture.url("/api/species"))
        .json(&json!({ "name": "", "rarity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = fixture
        .client
        .post(fixture.url("/api/species"))
        .json(&json!({ "name": "Wren", "rarity": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_start_trip_seeds_goals() {
    let fixture = TestFixture::new().await;
    fixture.create_species("Wren", 1).await;
    let user_id = fixture.create_user("Alice").await;

    let trip = fixture.start_trip(&user_id, true).await;

    assert_eq!(trip["isActive"], true);
    assert_eq!(trip["isEdugaming"], true);

    let specific = trip["specificGoals"].as_array().unwrap();
    assert_eq!(specific.len(), 1);
    assert_eq!(specific[0]["level"], 1);
    assert_eq!(specific[0]["status"], "inProgress");
    assert_eq!(specific[0]["speciesName"], "Wren");

    let count = trip["countGoals"].as_array().unwrap();
    assert_eq!(count.len(), 1);
    assert_eq!(count[0]["level"], 1);
    assert_eq!(count[0]["count"], 3);
    assert_eq!(count[0]["birdsFound"], 0);
}

#[tokio::test]
async fn test_single_active_trip_per_user() {
    let fixture = TestFixture::new().await;
    fixture.create_species("Wren", 1).await;
    let user_id = fixture.create_user("Alice").await;

    fixture.start_trip(&user_id, true).await;

    let resp = fixture
        .client
        .post(fixture.url("/api/trips"))
        .header("x-user-id", &user_id)
        .json(&json!({ "isEdugaming": true }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_upload_advances_both_goal_stacks() {
    let fixture = TestFixture::new().await;
    // Single-species catalog pins both identification and goal draws
    let wren_id = fixture.create_species("Wren", 1).await;
    let user_id = fixture.create_user("Alice").await;
    fixture.start_trip(&user_id, true).await;

    // First upload: identified as Wren, matches the seeded specific goal
    let resp = fixture.upload_photo(&user_id).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["species"]["id"], wren_id.as_str());
    assert!(body["data"]["imageId"].is_string());

    let level_ups = body["data"]["levelUps"].as_array().unwrap();
    assert_eq!(level_ups.len(), 1);
    assert_eq!(level_ups[0]["kind"], "specificGoal");
    assert_eq!(level_ups[0]["completedLevel"], 1);
    assert_eq!(level_ups[0]["nextLevel"], 2);

    let trip = fixture.active_trip(&user_id).await;
    let specific = trip["specificGoals"].as_array().unwrap();
    assert_eq!(specific.len(), 2);
    assert_eq!(specific[0]["status"], "success");
    assert_eq!(specific[1]["level"], 2);
    assert_eq!(specific[1]["status"], "inProgress");

    let count = trip["countGoals"].as_array().unwrap();
    assert_eq!(count.len(), 1);
    assert_eq!(count[0]["birdsFound"], 1);
    assert_eq!(trip["images"].as_array().unwrap().len(), 1);

    // Two more uploads reach the count target of 3
    fixture.upload_photo(&user_id).await;
    let resp = fixture.upload_photo(&user_id).await;
    let body: Value = resp.json().await.unwrap();
    let level_ups = body["data"]["levelUps"].as_array().unwrap();
    assert!(level_ups
        .iter()
        .any(|e| e["kind"] == "countGoal" && e["completedLevel"] == 1 && e["nextTarget"] == 6));

    let trip = fixture.active_trip(&user_id).await;
    let count = trip["countGoals"].as_array().unwrap();
    assert_eq!(count.len(), 2);
    assert_eq!(count[0]["status"], "success");
    assert_eq!(count[0]["birdsFound"], 3);
    assert_eq!(count[1]["level"], 2);
    assert_eq!(count[1]["count"], 6);
    assert_eq!(count[1]["birdsFound"], 0);
    assert_eq!(trip["images"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_upload_records_collection_once() {
    let fixture = TestFixture::new().await;
    let wren_id = fixture.create_species("Wren", 1).await;
    let user_id = fixture.create_user("Alice").await;
    fixture.start_trip(&user_id, true).await;

    fixture.upload_photo(&user_id).await;
    fixture.upload_photo(&user_id).await;

    // Same species identified twice appears once in the collection
    let resp = fixture
        .client
        .get(fixture.url("/api/me/birds"))
        .header("x-user-id", &user_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let birds = body["data"].as_array().unwrap();
    assert_eq!(birds.len(), 1);
    assert_eq!(birds[0]["id"], wren_id.as_str());
}

#[tokio::test]
async fn test_upload_without_active_trip() {
    let fixture = TestFixture::new().await;
    fixture.create_species("Wren", 1).await;
    let user_id = fixture.create_user("Alice").await;

    let resp = fixture.upload_photo(&user_id).await;

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "NO_ACTIVE_TRIP");

    // Rejected before any write
    let resp = fixture
        .client
        .get(fixture.url("/api/images"))
        .header("x-user-id", &user_id)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_upload_with_edugaming_disabled() {
    let fixture = TestFixture::new().await;
    fixture.create_species("Wren", 1).await;
    let user_id = fixture.create_user("Alice").await;
    fixture.start_trip(&user_id, false).await;

    let resp = fixture.upload_photo(&user_id).await;

    assert_eq!(resp.status(), 403);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "FEATURE_DISABLED");

    // Trip untouched
    let trip = fixture.active_trip(&user_id).await;
    assert_eq!(trip["images"].as_array().unwrap().len(), 0);
    assert_eq!(trip["countGoals"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_upload_rejects_non_image() {
    let fixture = TestFixture::new().await;
    fixture.create_species("Wren", 1).await;
    let user_id = fixture.create_user("Alice").await;
    fixture.start_trip(&user_id, true).await;

    let form = multipart::Form::new().part(
        "photo",
        multipart::Part::bytes(b"not an image".to_vec())
            .file_name("notes.txt")
            .mime_str("text/plain")
            .unwrap(),
    );

    let resp = fixture
        .client
        .post(fixture.url("/api/images"))
        .header("x-user-id", &user_id)
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_end_trip() {
    let fixture = TestFixture::new().await;
    fixture.create_species("Wren", 1).await;
    let user_id = fixture.create_user("Alice").await;
    let trip = fixture.start_trip(&user_id, true).await;
    let trip_id = trip["id"].as_str().unwrap();

    let resp = fixture
        .client
        .post(fixture.url(&format!("/api/trips/{}/end", trip_id)))
        .header("x-user-id", &user_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["isActive"], false);
    assert!(body["data"]["endedAt"].is_string());

    // No active trip anymore
    let resp = fixture
        .client
        .get(fixture.url("/api/trips/active"))
        .header("x-user-id", &user_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "NO_ACTIVE_TRIP");
}

#[tokio::test]
async fn test_signed_media_url_round_trip() {
    let fixture = TestFixture::new().await;
    fixture.create_species("Wren", 1).await;
    let user_id = fixture.create_user("Alice").await;
    fixture.start_trip(&user_id, true).await;

    let resp = fixture.upload_photo(&user_id).await;
    let body: Value = resp.json().await.unwrap();
    let image_id = body["data"]["imageId"].as_str().unwrap();

    // Image record is visible and carries the location
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/images/{}", image_id)))
        .header("x-user-id", &user_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["location"]["latitude"], 47.37);

    // Signed URL serves the stored bytes without any auth headers
    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/images/{}/url", image_id)))
        .header("x-user-id", &user_id)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let url = body["data"]["url"].as_str().unwrap();

    let anon = Client::new();
    let resp = anon.get(fixture.url(url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"fake jpeg bytes");

    // A tampered signature is rejected
    let tampered = format!("{}0", url);
    let resp = anon.get(fixture.url(&tampered)).send().await.unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_image_not_visible_to_other_users() {
    let fixture = TestFixture::new().await;
    fixture.create_species("Wren", 1).await;
    let alice = fixture.create_user("Alice").await;
    let bob = fixture.create_user("Bob").await;
    fixture.start_trip(&alice, true).await;

    let resp = fixture.upload_photo(&alice).await;
    let body: Value = resp.json().await.unwrap();
    let image_id = body["data"]["imageId"].as_str().unwrap();

    let resp = fixture
        .client
        .get(fixture.url(&format!("/api/images/{}", image_id)))
        .header("x-user-id", &bob)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_concurrent_uploads_count_every_bird() {
    let fixture = TestFixture::new().await;
    fixture.create_species("Wren", 1).await;
    let user_id = fixture.create_user("Alice").await;
    fixture.start_trip(&user_id, true).await;

    // Concurrent ingestions against the same trip must all be counted
    let mut handles = Vec::new();
    for _ in 0..3 {
        let client = fixture.client.clone();
        let url = fixture.url("/api/images");
        let user = user_id.clone();
        handles.push(tokio::spawn(async move {
            let form = multipart::Form::new().part(
                "photo",
                multipart::Part::bytes(b"fake jpeg bytes".to_vec())
                    .file_name("bird.jpg")
                    .mime_str("image/jpeg")
                    .unwrap(),
            );
            client
                .post(url)
                .header("x-user-id", user)
                .multipart(form)
                .send()
                .await
                .unwrap()
                .status()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), 200);
    }

    let trip = fixture.active_trip(&user_id).await;
    let count_goals = trip["countGoals"].as_array().unwrap();
    let total_found: i64 = count_goals
        .iter()
        .map(|g| g["birdsFound"].as_i64().unwrap())
        .sum();
    assert_eq!(total_found, 3);
    assert_eq!(trip["images"].as_array().unwrap().len(), 3);
}
