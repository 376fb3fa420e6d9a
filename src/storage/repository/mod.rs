// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to file storage.
//!
//! Each repository provides operations for a specific entity type,
//! using the FileStorage for all file operations.

pub mod identities;
pub mod roles;

pub use identities::{IdentityRepository, StoredIdentity};
pub use roles::{RoleAssignmentRepository, StoredRoleAssignment};
