// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Journal entry record and upload limits.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Largest accepted image, in bytes (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5_242_880;

/// Longest accepted notes, in characters after trimming.
pub const MAX_NOTES_CHARS: usize = 1000;

/// Image MIME types accepted by the upload pipeline.
pub const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

/// One dated journal image. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// UUID v4
    pub id: String,
    /// Identity that uploaded the entry
    pub user_id: String,
    /// Calendar day the journal covers
    pub journal_date: NaiveDate,
    /// Public URL or storage key, depending on the deployment's URL policy
    pub image_reference: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
