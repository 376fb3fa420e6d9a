// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role assignment repository.
//!
//! Assignments are provisioned out-of-band (operator tooling or the
//! `SEED_ADMIN_USER_ID` startup seed) as JSON files under `/data/roles/`.
//! The service itself only reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::{FileStorage, StorageError, StorageResult};

/// A `(user_id, role)` row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredRoleAssignment {
    /// Unique assignment identifier (UUID)
    pub id: String,
    /// Identity the role is granted to
    pub user_id: String,
    /// Capability tag, e.g. `admin`
    pub role: String,
    /// When the assignment was provisioned
    pub created_at: DateTime<Utc>,
}

/// Repository for role assignment lookups.
pub struct RoleAssignmentRepository<'a> {
    storage: &'a FileStorage,
}

impl<'a> RoleAssignmentRepository<'a> {
    pub fn new(storage: &'a FileStorage) -> Self {
        Self { storage }
    }

    /// Get an assignment by ID.
    pub fn get(&self, assignment_id: &str) -> StorageResult<StoredRoleAssignment> {
        let path = self.storage.paths().role_assignment(assignment_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Role assignment {assignment_id}")));
        }
        self.storage.read_json(path)
    }

    /// Find the assignment matching exactly `(user_id, role)`.
    ///
    /// Unreadable rows are errors here: a caller deciding on access must not
    /// mistake a corrupt row for an absent one.
    pub fn find(&self, user_id: &str, role: &str) -> StorageResult<Option<StoredRoleAssignment>> {
        let ids = self
            .storage
            .list_files(self.storage.paths().roles_dir(), "json")?;

        for id in ids {
            let assignment = self.get(&id)?;
            if assignment.user_id == user_id && assignment.role == role {
                return Ok(Some(assignment));
            }
        }

        Ok(None)
    }

    /// Provision an assignment. Provisioning an existing `(user_id, role)`
    /// pair returns the existing row.
    pub fn provision(&self, user_id: &str, role: &str) -> StorageResult<StoredRoleAssignment> {
        if let Some(existing) = self.find(user_id, role)? {
            return Ok(existing);
        }

        let assignment = StoredRoleAssignment {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            role: role.to_string(),
            created_at: Utc::now(),
        };
        self.storage.write_json(
            self.storage.paths().role_assignment(&assignment.id),
            &assignment,
        )?;
        Ok(assignment)
    }
}
