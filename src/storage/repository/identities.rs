// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity repository for locally managed accounts.
//!
//! Each identity is stored as a separate JSON file under `/data/identities/`.
//! Only the local identity provider reads or writes these files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::{FileStorage, StorageError, StorageResult};

/// Identity stored on the data volume.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredIdentity {
    /// Unique identity identifier (UUID)
    pub id: String,
    /// Normalized email address (NFKC, lower-case)
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
    /// Whether the email address has been verified
    pub verified: bool,
    /// When the identity was created
    pub created_at: DateTime<Utc>,
}

/// Repository for identity operations.
pub struct IdentityRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> IdentityRepository<'a> {
    /// Create a new IdentityRepository.
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Check if an identity exists.
    pub fn exists(&self, identity_id: &str) -> bool {
        self.storage.exists(self.storage.paths().identity(identity_id))
    }

    /// Get an identity by ID.
    pub fn get(&self, identity_id: &str) -> StorageResult<StoredIdentity> {
        let path = self.storage.paths().identity(identity_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Identity {identity_id}")));
        }
        self.storage.read_json(path)
    }

    /// Find an identity by normalized email.
    pub fn find_by_email(&self, email: &str) -> StorageResult<Option<StoredIdentity>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().identities_dir(), "json")?;

        for id in ids {
            match self.get(&id) {
                Ok(identity) if identity.email == email => return Ok(Some(identity)),
                Ok(_) => {}
                Err(e) => tracing::warn!(identity_id = %id, error = %e, "Skipping unreadable identity"),
            }
        }

        Ok(None)
    }

    /// Create a new identity. Email addresses are unique.
    pub fn create(&self, identity: &StoredIdentity) -> StorageResult<()> {
        if self.exists(&identity.id) {
            return Err(StorageError::AlreadyExists(format!("Identity {}", identity.id)));
        }

        if self.find_by_email(&identity.email)?.is_some() {
            return Err(StorageError::AlreadyExists(format!(
                "Identity with email {}",
                identity.email
            )));
        }

        self.storage
            .write_json(self.storage.paths().identity(&identity.id), identity)
    }

    /// Update an existing identity (e.g. marking it verified).
    pub fn update(&self, identity: &StoredIdentity) -> StorageResult<()> {
        if !self.exists(&identity.id) {
            return Err(StorageError::NotFound(format!("Identity {}", identity.id)));
        }

        self.storage
            .write_json(self.storage.paths().identity(&identity.id), identity)
    }
}
