// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! How persisted image references map to URLs readers can fetch.
//!
//! A deployment picks exactly one policy for its bucket:
//!
//! - `Public`: the reference stored on the entry is the durable public URL.
//! - `Signed`: the reference is the storage key; every read mints a fresh
//!   signed URL that expires after `ttl`.

use std::time::Duration;

use crate::storage::{objects::validate_key, ObjectStore, ObjectStoreError};

pub const DEFAULT_SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlPolicy {
    #[default]
    Public,
    Signed { ttl: Duration },
}

impl UrlPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            UrlPolicy::Public => "public",
            UrlPolicy::Signed { .. } => "signed",
        }
    }

    /// Reference persisted on a new entry for an object stored at `key`.
    pub fn reference_for_key(
        &self,
        objects: &dyn ObjectStore,
        key: &str,
    ) -> Result<String, ObjectStoreError> {
        match self {
            UrlPolicy::Public => Ok(objects.public_url(key)?.to_string()),
            UrlPolicy::Signed { .. } => {
                validate_key(key)?;
                Ok(key.to_string())
            }
        }
    }

    /// Storage key behind a persisted reference. `None` if the reference was
    /// not produced under this policy for this bucket.
    pub fn key_for_reference(&self, objects: &dyn ObjectStore, reference: &str) -> Option<String> {
        match self {
            UrlPolicy::Public => objects.key_from_public_url(reference),
            UrlPolicy::Signed { .. } => validate_key(reference).ok().map(|_| reference.to_string()),
        }
    }
}
