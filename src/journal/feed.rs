// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Feed view: the viewer-side state of the journal feed.
//!
//! A mounted view owns one change subscription. Every change triggers a full
//! re-list. Unmounting (or dropping) the view releases the subscription, and
//! any work finishing afterwards leaves the view untouched.

use std::sync::Arc;

use super::error::JournalError;
use super::repository::{JournalRepository, ResolvedEntry};
use crate::auth::RoleResolver;
use crate::storage::{ChangeEvent, Subscription};

pub struct FeedView {
    repo: Arc<JournalRepository>,
    subscription: Option<Subscription>,
    entries: Vec<ResolvedEntry>,
    loading: bool,
    selected: Option<String>,
    can_delete: bool,
}

impl FeedView {
    /// Subscribe, resolve the viewer's rights and load the first snapshot.
    pub async fn mount(
        repo: Arc<JournalRepository>,
        roles: &RoleResolver,
        viewer: Option<&str>,
    ) -> Self {
        // Subscribe before listing so no change between the two is missed
        let subscription = repo.subscribe();
        let can_delete = roles.is_admin(viewer).await;

        let mut view = Self {
            repo,
            subscription: Some(subscription),
            entries: Vec::new(),
            loading: true,
            selected: None,
            can_delete,
        };
        view.refresh().await;
        view
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// `true` until the first snapshot attempt finishes.
    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn snapshot(&self) -> &[ResolvedEntry] {
        &self.entries
    }

    /// Whether deletion is offered to this viewer.
    pub fn can_delete(&self) -> bool {
        self.can_delete
    }

    /// Re-list. A failed list keeps the previous snapshot.
    pub async fn refresh(&mut self) {
        if !self.is_mounted() {
            return;
        }
        let result = self.repo.list_resolved().await;
        if !self.is_mounted() {
            return;
        }

        match result {
            Ok(entries) => {
                self.entries = entries;
                let selection_survives = self
                    .selected
                    .as_ref()
                    .is_none_or(|id| self.entries.iter().any(|e| &e.entry.id == id));
                if !selection_survives {
                    self.selected = None;
                }
            }
            Err(e) => tracing::warn!(error = %e, "Feed refresh failed; keeping previous snapshot"),
        }
        self.loading = false;
    }

    /// Open the detail view for an entry in the current snapshot.
    pub fn select(&mut self, entry_id: &str) -> Option<&ResolvedEntry> {
        if !self.entries.iter().any(|e| e.entry.id == entry_id) {
            return None;
        }
        self.selected = Some(entry_id.to_string());
        self.selected()
    }

    pub fn selected(&self) -> Option<&ResolvedEntry> {
        let id = self.selected.as_deref()?;
        self.entries.iter().find(|e| e.entry.id == id)
    }

    /// Back to the grid. The snapshot is unchanged.
    pub fn close_detail(&mut self) {
        self.selected = None;
    }

    /// Delete an entry on behalf of the viewer, then re-list.
    pub async fn delete(&mut self, entry_id: &str) -> Result<(), JournalError> {
        if !self.is_mounted() {
            return Ok(());
        }
        if !self.can_delete {
            return Err(JournalError::Forbidden);
        }
        self.repo.delete(entry_id).await?;

        if self.selected.as_deref() == Some(entry_id) {
            self.selected = None;
        }
        self.refresh().await;
        Ok(())
    }

    /// Wait for the next change and re-list. Returns `false` once the view is
    /// unmounted or the feed has closed.
    pub async fn next_change(&mut self) -> bool {
        let Some(subscription) = self.subscription.as_mut() else {
            return false;
        };

        match subscription.recv().await {
            Some(event) => {
                if event == ChangeEvent::Resync {
                    tracing::debug!("Feed view resyncing after missed changes");
                }
                self.refresh().await;
                true
            }
            None => {
                self.unmount();
                false
            }
        }
    }

    /// Release the subscription. Later calls are no-ops.
    pub fn unmount(&mut self) {
        if self.subscription.take().is_some() {
            tracing::debug!("Feed view unmounted");
        }
        self.selected = None;
    }
}
