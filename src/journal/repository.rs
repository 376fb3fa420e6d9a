// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Journal repository: read, resolve and delete entries.
//!
//! The repository trusts its caller. Admin checks happen in the HTTP
//! extractors and the feed view, not here.

use std::sync::Arc;

use url::Url;

use super::busy::InFlight;
use super::entry::JournalEntry;
use super::error::{DeleteStage, JournalError};
use super::url_policy::UrlPolicy;
use crate::storage::{ObjectStore, RecordStore, Subscription};

/// An entry with a freshly resolved image URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEntry {
    pub entry: JournalEntry,
    /// `None` when the image could not be resolved (missing or corrupt)
    pub image_url: Option<Url>,
}

pub struct JournalRepository {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    policy: UrlPolicy,
    deleting: InFlight,
}

impl JournalRepository {
    pub fn new(objects: Arc<dyn ObjectStore>, records: Arc<dyn RecordStore>, policy: UrlPolicy) -> Self {
        Self {
            objects,
            records,
            policy,
            deleting: InFlight::new(),
        }
    }

    pub fn policy(&self) -> UrlPolicy {
        self.policy
    }

    /// Full snapshot, newest journal date first.
    pub async fn list(&self) -> Result<Vec<JournalEntry>, JournalError> {
        self.records.select_by_date_desc().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to list journal entries");
            JournalError::RecordReadFailed(e.to_string())
        })
    }

    /// Entry count, for readiness checks.
    pub async fn count(&self) -> Result<u64, JournalError> {
        self.records
            .count()
            .await
            .map_err(|e| JournalError::RecordReadFailed(e.to_string()))
    }

    /// Snapshot with image URLs resolved per entry.
    pub async fn list_resolved(&self) -> Result<Vec<ResolvedEntry>, JournalError> {
        let entries = self.list().await?;
        let mut resolved = Vec::with_capacity(entries.len());

        for entry in entries {
            let image_url = match self.resolve_image_url(&entry).await {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(entry_id = %entry.id, error = %e, "Skipping unresolvable journal image");
                    None
                }
            };
            resolved.push(ResolvedEntry { entry, image_url });
        }

        Ok(resolved)
    }

    pub async fn get(&self, entry_id: &str) -> Result<JournalEntry, JournalError> {
        self.records
            .get(entry_id)
            .await
            .map_err(|e| {
                tracing::error!(entry_id, error = %e, "Failed to read journal entry");
                JournalError::RecordReadFailed(e.to_string())
            })?
            .ok_or_else(|| JournalError::NotFound(entry_id.to_string()))
    }

    pub async fn get_resolved(&self, entry_id: &str) -> Result<ResolvedEntry, JournalError> {
        let entry = self.get(entry_id).await?;
        let image_url = self.resolve_image_url(&entry).await.ok();
        Ok(ResolvedEntry { entry, image_url })
    }

    /// URL a reader can fetch the entry's image from.
    ///
    /// Signed URLs are minted on every call; callers must not cache them past
    /// their expiry.
    pub async fn resolve_image_url(&self, entry: &JournalEntry) -> Result<Url, JournalError> {
        let key = self
            .policy
            .key_for_reference(self.objects.as_ref(), &entry.image_reference)
            .ok_or_else(|| {
                tracing::error!(
                    entry_id = %entry.id,
                    reference = %entry.image_reference,
                    policy = self.policy.name(),
                    "Image reference does not match the configured URL policy"
                );
                JournalError::ImageUnavailable(entry.id.clone())
            })?;

        let exists = self.objects.exists(&key).await.map_err(|e| {
            tracing::error!(key = %key, error = %e, "Object lookup failed");
            JournalError::ImageUnavailable(entry.id.clone())
        })?;
        if !exists {
            return Err(JournalError::ImageUnavailable(entry.id.clone()));
        }

        let url = match self.policy {
            UrlPolicy::Public => Url::parse(&entry.image_reference).ok(),
            UrlPolicy::Signed { ttl } => self
                .objects
                .signed_url(&key, ttl)
                .map_err(|e| tracing::error!(key = %key, error = %e, "Failed to sign image URL"))
                .ok(),
        };
        url.ok_or_else(|| JournalError::ImageUnavailable(entry.id.clone()))
    }

    /// Remove the stored image, then the record.
    ///
    /// If the image cannot be removed the record is left untouched.
    pub async fn delete(&self, entry_id: &str) -> Result<(), JournalError> {
        let _busy = self
            .deleting
            .try_acquire(entry_id)
            .ok_or(JournalError::DeleteInFlight)?;

        let entry = self.get(entry_id).await?;

        match self
            .policy
            .key_for_reference(self.objects.as_ref(), &entry.image_reference)
        {
            Some(key) => self.objects.delete(&key).await.map_err(|e| {
                tracing::error!(entry_id, key = %key, error = %e, "Failed to delete journal image");
                JournalError::DeleteFailed {
                    stage: DeleteStage::Object,
                    reason: e.to_string(),
                }
            })?,
            None => tracing::warn!(
                entry_id,
                reference = %entry.image_reference,
                "No storage key behind image reference; removing record only"
            ),
        }

        let removed = self.records.delete(entry_id).await.map_err(|e| {
            tracing::error!(entry_id, error = %e, "Failed to delete journal record after its image");
            JournalError::DeleteFailed {
                stage: DeleteStage::Record,
                reason: e.to_string(),
            }
        })?;

        if removed {
            tracing::info!(entry_id, "Journal entry deleted");
        }
        Ok(())
    }

    /// Live changes. Dropping the subscription releases it.
    pub fn subscribe(&self) -> Subscription {
        self.records.subscribe()
    }
}
