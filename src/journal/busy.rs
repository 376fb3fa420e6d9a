// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Busy flags for mutating actions.
//!
//! A second trigger while the first is still running is refused instead of
//! queued. The flag clears when the guard drops, on success and failure alike.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Set of keys with an action in flight.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `key` busy, or `None` if it already is.
    pub fn try_acquire(&self, key: &str) -> Option<BusyGuard> {
        if !self.lock().insert(key.to_string()) {
            return None;
        }
        Some(BusyGuard {
            keys: Arc::clone(&self.keys),
            key: key.to_string(),
        })
    }

    pub fn is_busy(&self, key: &str) -> bool {
        self.lock().contains(key)
    }
}

/// Clears its key on drop.
#[derive(Debug)]
pub struct BusyGuard {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
