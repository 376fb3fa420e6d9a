// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state for the journal service, all under `DATA_DIR`.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   identities/{identity_id}.json   # Local accounts (argon2 hashes)
//!   roles/{assignment_id}.json      # (user_id, role) rows, provisioned out-of-band
//!   objects/{bucket}/{user_id}/{token}.{ext}   # Journal images
//!   journal.redb                    # Journal entry records
//! ```
//!
//! The object store and record store are reached through the
//! [`ObjectStore`] and [`RecordStore`] traits so the journal core never
//! depends on the concrete backends.

pub mod fs;
pub mod objects;
pub mod paths;
pub mod records;
pub mod repository;
pub mod signing;

pub use fs::{FileStorage, StorageError, StorageResult};
pub use objects::{FsObjectStore, ObjectStore, ObjectStoreError, StoredObject};
pub use paths::StoragePaths;
pub use records::{
    ChangeEvent, ChangeFeed, RecordStore, RecordStoreError, RedbRecordStore, Subscription,
};
pub use repository::{
    IdentityRepository, RoleAssignmentRepository, StoredIdentity, StoredRoleAssignment,
};
pub use signing::{SignatureError, UrlSigner};
