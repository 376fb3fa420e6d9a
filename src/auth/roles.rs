// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role resolution.
//!
//! The admin capability is a row `(user_id, "admin")` in the role store.
//! Matching is exact: no prefixes, no case folding, no hierarchy.

use std::sync::Arc;

use async_trait::async_trait;

use crate::storage::{FileStorage, RoleAssignmentRepository, StorageResult};

/// Role tag that grants upload and delete rights.
pub const ADMIN_ROLE: &str = "admin";

/// Read access to role assignments.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn has_role(&self, user_id: &str, role: &str) -> StorageResult<bool>;
}

/// Role assignments kept as JSON files on the data volume.
pub struct FileRoleStore {
    storage: Arc<FileStorage>,
}

impl FileRoleStore {
    pub fn new(storage: Arc<FileStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl RoleStore for FileRoleStore {
    async fn has_role(&self, user_id: &str, role: &str) -> StorageResult<bool> {
        Ok(RoleAssignmentRepository::new(&self.storage)
            .find(user_id, role)?
            .is_some())
    }
}

/// Answers "is this identity an admin?".
#[derive(Clone)]
pub struct RoleResolver {
    store: Arc<dyn RoleStore>,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self { store }
    }

    /// `true` only if an exact `(identity_id, "admin")` row exists.
    ///
    /// A missing identity is `false`. A lookup failure is logged and also
    /// treated as `false`; callers never see the error.
    pub async fn is_admin(&self, identity_id: Option<&str>) -> bool {
        let Some(identity_id) = identity_id else {
            return false;
        };

        match self.store.has_role(identity_id, ADMIN_ROLE).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                tracing::error!(identity_id, error = %e, "Role lookup failed; treating as non-admin");
                false
            }
        }
    }
}
