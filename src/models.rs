// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies for the REST API. All types derive
//! `ToSchema` for the OpenAPI document served at `/docs`.
//!
//! ## Model Categories
//!
//! - **Auth**: credentials, sessions, sign-up outcomes
//! - **Journal**: entries with resolved image URLs, list snapshots

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{Identity, Session};
use crate::journal::ResolvedEntry;

// =============================================================================
// Auth
// =============================================================================

/// Email and password, as typed by the user. Both are trimmed server-side.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionResponse {
    /// Bearer token for the `Authorization` header
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: Identity,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            access_token: session.token,
            token_type: "Bearer".to_string(),
            expires_at: session.expires_at,
            user: session.identity,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SignUpStatus {
    /// Signed in immediately
    Active,
    /// Account created; the email must be confirmed before signing in
    PendingVerification,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignUpResponse {
    pub status: SignUpStatus,
    pub user: Identity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: Identity,
    /// Whether upload and delete are offered to this user
    pub is_admin: bool,
    pub session_expires_at: DateTime<Utc>,
}

// =============================================================================
// Journal
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct JournalEntryResponse {
    pub id: String,
    pub user_id: String,
    /// Trading day the entry documents (`YYYY-MM-DD`)
    pub journal_date: NaiveDate,
    /// Fetchable image URL; `null` if the image is missing. Signed URLs expire.
    pub image_url: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ResolvedEntry> for JournalEntryResponse {
    fn from(resolved: ResolvedEntry) -> Self {
        let ResolvedEntry { entry, image_url } = resolved;
        Self {
            id: entry.id,
            user_id: entry.user_id,
            journal_date: entry.journal_date,
            image_url: image_url.map(String::from),
            notes: entry.notes,
            created_at: entry.created_at,
        }
    }
}

/// One feed snapshot, newest journal date first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JournalListResponse {
    pub entries: Vec<JournalEntryResponse>,
    /// Whether the requesting viewer may delete entries
    pub can_delete: bool,
}

impl JournalListResponse {
    pub fn new(entries: &[ResolvedEntry], can_delete: bool) -> Self {
        Self {
            entries: entries.iter().cloned().map(Into::into).collect(),
            can_delete,
        }
    }
}

/// Multipart body for an upload. Documentation only; the handler reads the
/// fields from the multipart stream.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadJournalRequest {
    /// `image/jpeg`, `image/png` or `image/webp`, at most 5 MiB
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    /// `YYYY-MM-DD`
    pub journal_date: String,
    /// Up to 1000 characters
    pub notes: Option<String>,
}
