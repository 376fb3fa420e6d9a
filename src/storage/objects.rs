// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key-addressed object storage for journal images.
//!
//! The [`ObjectStore`] trait is the seam the upload pipeline and journal
//! repository talk to. [`FsObjectStore`] keeps objects as files under
//! `objects/{bucket}/` and mints the URLs served by the `/v1/storage` routes:
//!
//! ```text
//! {base}/v1/storage/public/{bucket}/{key}
//! {base}/v1/storage/sign/{bucket}/{key}?expires=..&signature=..
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use url::Url;

use super::signing::UrlSigner;
use super::{FileStorage, StorageError};

/// Longest accepted object key.
const MAX_KEY_LEN: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("object already exists: {0}")]
    AlreadyExists(String),
    #[error("signed URLs are not configured for this store")]
    SigningUnavailable,
    #[error("failed to build object URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ObjectStoreError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(what) => ObjectStoreError::NotFound(what),
            StorageError::AlreadyExists(what) => ObjectStoreError::AlreadyExists(what),
            StorageError::InvalidKey(key) => ObjectStoreError::InvalidKey(key),
            other => ObjectStoreError::Storage(other),
        }
    }
}

/// An object payload read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Key-addressed binary storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`. Existing keys are never overwritten.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError>;

    async fn get(&self, key: &str) -> Result<StoredObject, ObjectStoreError>;

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    /// Remove `key`. Removing a key that does not exist succeeds.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// Durable public URL for `key`.
    fn public_url(&self, key: &str) -> Result<Url, ObjectStoreError>;

    /// Time-limited signed URL for `key`.
    fn signed_url(&self, key: &str, ttl: Duration) -> Result<Url, ObjectStoreError>;

    /// Inverse of [`ObjectStore::public_url`]; `None` for foreign URLs.
    fn key_from_public_url(&self, url: &str) -> Option<String>;
}

/// Validate an object key: `/`-separated segments of `[A-Za-z0-9._-]`,
/// none empty, `.` or `..`.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key.split('/').all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .bytes()
                    .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        });

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Content type served for a key, derived from its extension.
pub fn content_type_for_key(key: &str) -> &'static str {
    let extension = key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Object store backed by the data volume.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    storage: Arc<FileStorage>,
    bucket: String,
    base_url: String,
    signer: Option<UrlSigner>,
}

impl FsObjectStore {
    /// Create a store for `bucket`, minting URLs under `base_url`.
    pub fn new(storage: Arc<FileStorage>, bucket: impl Into<String>, base_url: &Url) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            signer: None,
        }
    }

    /// Enable signed URLs.
    pub fn with_signer(mut self, signer: UrlSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn public_prefix(&self) -> String {
        format!("{}/v1/storage/public/{}/", self.base_url, self.bucket)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        let path = self.storage.paths().object(&self.bucket, key);
        self.storage.write_raw(path, bytes)?;
        tracing::debug!(bucket = %self.bucket, key, size = bytes.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject, ObjectStoreError> {
        validate_key(key)?;
        let path = self.storage.paths().object(&self.bucket, key);
        let bytes = self.storage.read_raw(path).map_err(|e| match e {
            StorageError::NotFound(_) => ObjectStoreError::NotFound(key.to_string()),
            other => other.into(),
        })?;
        Ok(StoredObject {
            key: key.to_string(),
            content_type: content_type_for_key(key),
            bytes,
        })
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        validate_key(key)?;
        Ok(self
            .storage
            .exists(self.storage.paths().object(&self.bucket, key)))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        validate_key(key)?;
        match self.storage.delete(self.storage.paths().object(&self.bucket, key)) {
            Ok(()) | Err(StorageError::NotFound(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, key: &str) -> Result<Url, ObjectStoreError> {
        validate_key(key)?;
        Ok(Url::parse(&format!("{}{key}", self.public_prefix()))?)
    }

    fn signed_url(&self, key: &str, ttl: Duration) -> Result<Url, ObjectStoreError> {
        validate_key(key)?;
        let signer = self
            .signer
            .as_ref()
            .ok_or(ObjectStoreError::SigningUnavailable)?;
        let (expires, signature) = signer.sign(&self.bucket, key, ttl, Utc::now());
        Ok(Url::parse(&format!(
            "{}/v1/storage/sign/{}/{key}?expires={expires}&signature={signature}",
            self.base_url, self.bucket
        ))?)
    }

    fn key_from_public_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.public_prefix())?;
        validate_key(key).ok()?;
        Some(key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn store() -> (TempDir, FsObjectStore) {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        let base = Url::parse("https://journal.example.com/").unwrap();
        let store = FsObjectStore::new(Arc::new(storage), "trading-journals", &base)
            .with_signer(UrlSigner::new("secret"));
        (temp, store)
    }

    #[test]
    fn validate_key_rejects_traversal_and_junk() {
        assert!(validate_key("user-1/1710460800000.png").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("../etc/passwd").is_err());
        assert!(validate_key("user/./x.png").is_err());
        assert!(validate_key("user//x.png").is_err());
        assert!(validate_key("/abs.png").is_err());
        assert!(validate_key("user/x y.png").is_err());
    }

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for_key("a/b.PNG"), "image/png");
        assert_eq!(content_type_for_key("a/b.jpg"), "image/jpeg");
        assert_eq!(content_type_for_key("a/b.jpeg"), "image/jpeg");
        assert_eq!(content_type_for_key("a/b.webp"), "image/webp");
        assert_eq!(content_type_for_key("a/b"), "application/octet-stream");
    }

    #[tokio::test]
    async fn put_get_delete_lifecycle() {
        let (_temp, store) = store();
        let key = "user-1/1.png";

        store.put(key, b"png-bytes").await.unwrap();
        assert!(store.exists(key).await.unwrap());

        let object = store.get(key).await.unwrap();
        assert_eq!(object.bytes, b"png-bytes");
        assert_eq!(object.content_type, "image/png");

        store.delete(key).await.unwrap();
        assert!(!store.exists(key).await.unwrap());
        assert!(matches!(
            store.get(key).await,
            Err(ObjectStoreError::NotFound(_))
        ));

        // Deleting again is not an error
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn put_never_overwrites() {
        let (_temp, store) = store();
        store.put("user-1/1.png", b"a").await.unwrap();
        assert!(matches!(
            store.put("user-1/1.png", b"b").await,
            Err(ObjectStoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn public_url_round_trips_to_key() {
        let (_temp, store) = store();
        let url = store.public_url("user-1/1.png").unwrap();

        assert_eq!(
            url.as_str(),
            "https://journal.example.com/v1/storage/public/trading-journals/user-1/1.png"
        );
        assert_eq!(
            store.key_from_public_url(url.as_str()).as_deref(),
            Some("user-1/1.png")
        );
        assert_eq!(
            store.key_from_public_url("https://elsewhere.example.com/v1/storage/public/trading-journals/user-1/1.png"),
            None
        );
    }

    #[test]
    fn signed_url_carries_expiry_and_signature() {
        let (_temp, store) = store();
        let url = store
            .signed_url("user-1/1.png", Duration::from_secs(3600))
            .unwrap();

        assert_eq!(url.path(), "/v1/storage/sign/trading-journals/user-1/1.png");
        let params: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(params, vec!["expires", "signature"]);
    }

    #[test]
    fn signed_url_requires_signer() {
        let temp = TempDir::new().unwrap();
        let mut storage = FileStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        let base = Url::parse("http://localhost:8080").unwrap();
        let store = FsObjectStore::new(Arc::new(storage), "b", &base);

        assert!(matches!(
            store.signed_url("k.png", Duration::from_secs(1)),
            Err(ObjectStoreError::SigningUnavailable)
        ));
    }
}
