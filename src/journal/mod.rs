// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Journal Module
//!
//! Dated trading-journal images: the upload pipeline that writes them, the
//! repository that reads, resolves and deletes them, and the feed view that
//! keeps a live snapshot for one viewer.

pub mod busy;
pub mod entry;
pub mod error;
pub mod feed;
pub mod pipeline;
pub mod repository;
pub mod url_policy;

pub use entry::{JournalEntry, ALLOWED_MIME_TYPES, MAX_IMAGE_BYTES, MAX_NOTES_CHARS};
pub use error::{DeleteStage, JournalError};
pub use feed::FeedView;
pub use pipeline::{ImageFile, UploadForm, UploadPipeline};
pub use repository::{JournalRepository, ResolvedEntry};
pub use url_policy::{UrlPolicy, DEFAULT_SIGNED_URL_TTL};
