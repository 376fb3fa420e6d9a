// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the data volume layout.

use std::path::{Path, PathBuf};

/// Base directory for all persistent storage.
pub const DATA_ROOT: &str = "/data";

/// Storage path utilities for the data volume.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Create a new StoragePaths with a custom root (useful for testing).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // ========== Identity Paths ==========

    /// Directory containing locally managed identities.
    pub fn identities_dir(&self) -> PathBuf {
        self.root.join("identities")
    }

    /// Path to a specific identity file.
    pub fn identity(&self, identity_id: &str) -> PathBuf {
        self.identities_dir().join(format!("{identity_id}.json"))
    }

    // ========== Role Assignment Paths ==========

    /// Directory containing role assignments (provisioned out-of-band).
    pub fn roles_dir(&self) -> PathBuf {
        self.root.join("roles")
    }

    /// Path to a specific role assignment file.
    pub fn role_assignment(&self, assignment_id: &str) -> PathBuf {
        self.roles_dir().join(format!("{assignment_id}.json"))
    }

    // ========== Object Paths ==========

    /// Directory containing all object buckets.
    pub fn objects_dir(&self) -> PathBuf {
        self.root.join("objects")
    }

    /// Directory for a specific bucket.
    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.objects_dir().join(bucket)
    }

    /// Path to an object inside a bucket.
    ///
    /// The key must already be validated (see `objects::validate_key`);
    /// `/`-separated segments become nested directories.
    pub fn object(&self, bucket: &str, key: &str) -> PathBuf {
        key.split('/')
            .fold(self.bucket_dir(bucket), |path, segment| path.join(segment))
    }

    // ========== Record Store Paths ==========

    /// Path to the embedded journal record database.
    pub fn records_db(&self) -> PathBuf {
        self.root.join("journal.redb")
    }
}
