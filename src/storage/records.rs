// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Journal record store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `journal_entries`: entry id → serialized JournalEntry (JSON bytes)
//!
//! Every committed insert or delete is published on a [`ChangeFeed`] so live
//! views can re-list.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use tokio::sync::broadcast;

use crate::journal::JournalEntry;

/// Primary table: entry id → serialized JournalEntry.
const JOURNAL_ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("journal_entries");

/// Buffered change events per subscriber before it is considered lagging.
const CHANGE_FEED_CAPACITY: usize = 64;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RecordStoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("record already exists: {0}")]
    AlreadyExists(String),

    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

pub type RecordResult<T> = Result<T, RecordStoreError>;

// =============================================================================
// Change Feed
// =============================================================================

/// A change committed to the record store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Inserted { entry_id: String },
    Deleted { entry_id: String },
    /// The subscriber missed events and must assume anything changed.
    Resync,
}

/// Fan-out of record changes to live subscribers.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            sender,
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    /// Open a subscription; it is released when dropped.
    pub fn subscribe(&self) -> Subscription {
        let count = self.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(subscribers = count, "Change feed subscription opened");
        Subscription {
            receiver: self.sender.subscribe(),
            subscribers: Arc::clone(&self.subscribers),
        }
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

/// A live subscription to record changes. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    subscribers: Arc<AtomicUsize>,
}

impl Subscription {
    /// Wait for the next change. Returns `None` once the feed is closed.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "Change feed subscriber lagged; forcing resync");
                Some(ChangeEvent::Resync)
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.subscribers.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        tracing::debug!(subscribers = remaining, "Change feed subscription released");
    }
}

// =============================================================================
// RecordStore
// =============================================================================

/// Durable table of journal entries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new entry. Fails if the id is already taken.
    async fn insert(&self, entry: &JournalEntry) -> RecordResult<()>;

    async fn get(&self, entry_id: &str) -> RecordResult<Option<JournalEntry>>;

    /// All entries, newest `journal_date` first (ties: newest `created_at`).
    async fn select_by_date_desc(&self) -> RecordResult<Vec<JournalEntry>>;

    /// Delete by id. Returns whether a row was removed.
    async fn delete(&self, entry_id: &str) -> RecordResult<bool>;

    /// Number of stored entries. Reads table metadata only, no rows.
    async fn count(&self) -> RecordResult<u64>;

    /// Subscribe to committed inserts and deletes.
    fn subscribe(&self) -> Subscription;
}

/// Sort entries into feed order. Stable, so equal keys keep their order.
pub fn sort_by_date_desc(entries: &mut [JournalEntry]) {
    entries.sort_by(|a, b| {
        b.journal_date
            .cmp(&a.journal_date)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

/// Embedded ACID record store.
pub struct RedbRecordStore {
    db: Database,
    changes: ChangeFeed,
}

impl RedbRecordStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> RecordResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(JOURNAL_ENTRIES)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            changes: ChangeFeed::new(),
        })
    }

    /// Change feed shared with subscribers (exposed for health reporting).
    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }
}

#[async_trait]
impl RecordStore for RedbRecordStore {
    async fn insert(&self, entry: &JournalEntry) -> RecordResult<()> {
        let json = serde_json::to_vec(entry)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(JOURNAL_ENTRIES)?;
            if table.get(entry.id.as_str())?.is_some() {
                return Err(RecordStoreError::AlreadyExists(entry.id.clone()));
            }
            table.insert(entry.id.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;

        self.changes.publish(ChangeEvent::Inserted {
            entry_id: entry.id.clone(),
        });
        Ok(())
    }

    async fn get(&self, entry_id: &str) -> RecordResult<Option<JournalEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNAL_ENTRIES)?;
        match table.get(entry_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    async fn select_by_date_desc(&self) -> RecordResult<Vec<JournalEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNAL_ENTRIES)?;

        let mut entries = Vec::new();
        for row in table.iter()? {
            let (_, value) = row?;
            entries.push(serde_json::from_slice::<JournalEntry>(value.value())?);
        }

        sort_by_date_desc(&mut entries);
        Ok(entries)
    }

    async fn delete(&self, entry_id: &str) -> RecordResult<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(JOURNAL_ENTRIES)?;
            let removed = table.remove(entry_id)?.is_some();
            removed
        };
        write_txn.commit()?;

        if removed {
            self.changes.publish(ChangeEvent::Deleted {
                entry_id: entry_id.to_string(),
            });
        }
        Ok(removed)
    }

    async fn count(&self) -> RecordResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(JOURNAL_ENTRIES)?;
        Ok(table.len()?)
    }

    fn subscribe(&self) -> Subscription {
        self.changes.subscribe()
    }
}
