// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Trading Journal - admin-curated image journal service
//!
//! A single admin uploads dated trading screenshots with notes; anyone can
//! browse the feed, which updates live as entries are added or removed.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Sessions, identity providers and the admin role check
//! - `journal` - Upload pipeline, repository and live feed view
//! - `storage` - Data volume, image objects and the redb record store

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod journal;
pub mod models;
pub mod state;
pub mod storage;
