//! Local-filesystem object store with signed time-limited read URLs.
//!
//! Stands in for cloud object storage behind the same contract: callers hand
//! over bytes, get back an opaque key, and request expiring read URLs. The
//! signature is the read capability, so media serving needs no session.

use std::path::PathBuf;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// Seconds a signed media URL stays valid (30 minutes, as the mobile app expects).
pub const SIGNED_URL_TTL_SECS: i64 = 60 * 30;

/// Filesystem-backed object store.
#[derive(Clone)]
pub struct ObjectStore {
    root: PathBuf,
    secret: String,
}

impl ObjectStore {
    pub fn new(root: PathBuf, secret: String) -> Self {
        Self { root, secret }
    }

    /// Store a payload under a fresh opaque key derived from the original filename.
    pub async fn put(&self, original_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        tokio::fs::create_dir_all(&self.root).await?;

        let key = format!(
            "{}-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            uuid::Uuid::new_v4(),
            sanitize_name(original_name)
        );
        tokio::fs::write(self.root.join(&key), bytes).await?;
        Ok(key)
    }

    /// Read a stored payload back.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, AppError> {
        // Keys are opaque single-segment names; reject anything path-like
        if key.contains('/') || key.contains("..") {
            return Err(AppError::BadRequest("Invalid storage key".to_string()));
        }
        match tokio::fs::read(self.root.join(key)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Object {} not found", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Build a signed relative URL granting read access until `expires` (unix seconds).
    pub fn signed_url(&self, key: &str, expires: i64) -> String {
        let sig = self.sign(key, expires);
        format!("/media/{}?expires={}&sig={}", key, expires, sig)
    }

    /// Verify a signature produced by `signed_url`, in constant time.
    pub fn verify(&self, key: &str, expires: i64, sig: &str, now: i64) -> bool {
        if now > expires {
            return false;
        }
        let expected = self.sign(key, expires);
        expected.as_bytes().ct_eq(sig.as_bytes()).into()
    }

    fn sign(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b"\0");
        hasher.update(key.as_bytes());
        hasher.update(b"\0");
        hasher.update(expires.to_be_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Keep only filename characters that are safe in a flat key namespace.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ObjectStore {
        ObjectStore::new(PathBuf::from("/tmp/unused"), "test-secret".to_string())
    }

    #[test]
    fn test_signature_round_trip() {
        let store = store();
        let url = store.signed_url("123-abc-bird.jpg", 1_000);
        let sig = url.split("sig=").nth(1).unwrap();
        assert!(store.verify("123-abc-bird.jpg", 1_000, sig, 500));
    }

    #[test]
    fn test_expired_signature_rejected() {
        let store = store();
        let url = store.signed_url("123-abc-bird.jpg", 1_000);
        let sig = url.split("sig=").nth(1).unwrap();
        assert!(!store.verify("123-abc-bird.jpg", 1_000, sig, 1_001));
    }

    #[test]
    fn test_tampered_key_rejected() {
        let store = store();
        let url = store.signed_url("123-abc-bird.jpg", 1_000);
        let sig = url.split("sig=").nth(1).unwrap();
        assert!(!store.verify("456-other-key.jpg", 1_000, sig, 500));
    }

    #[test]
    fn test_different_secret_rejected() {
        let first = ObjectStore::new(PathBuf::from("/tmp/a"), "secret-a".to_string());
        let second = ObjectStore::new(PathBuf::from("/tmp/b"), "secret-b".to_string());
        let url = first.signed_url("key", 1_000);
        let sig = url.split("sig=").nth(1).unwrap();
        assert!(!second.verify("key", 1_000, sig, 500));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("bird photo (1).jpg"), "birdphoto1.jpg");
        assert_eq!(sanitize_name("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_name("日本語"), "upload");
    }

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path().to_path_buf(), "s".to_string());

        let key = store.put("bird.jpg", b"jpeg bytes").await.unwrap();
        assert!(key.ends_with("bird.jpg"));
        assert_eq!(store.get(&key).await.unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn test_get_rejects_path_traversal() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path().to_path_buf(), "s".to_string());
        assert!(matches!(
            store.get("../outside").await,
            Err(AppError::BadRequest(_))
        ));
    }
}
