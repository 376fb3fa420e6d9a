// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for session-authenticated requests.
//!
//! ```rust,ignore
//! async fn upload(AdminOnly(session): AdminOnly) -> impl IntoResponse {
//!     // session.identity.id is a verified admin
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, Session};
use crate::state::AppState;

/// Pull the bearer token out of the `Authorization` header.
pub fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidAuthHeader)
}

/// Extractor for a live session.
pub struct Auth(pub Session);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>().cloned() {
            return Ok(Auth(session));
        }

        let token = bearer_token(parts)?;
        let session = state.auth.sessions().authenticate(token).await?;

        parts.extensions.insert(session.clone());
        Ok(Auth(session))
    }
}

/// Extractor that requires the admin role.
pub struct AdminOnly(pub Session);

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(session) = Auth::from_request_parts(parts, state).await?;

        if !state.roles.is_admin(Some(&session.identity.id)).await {
            tracing::warn!(identity_id = %session.identity.id, "Non-admin attempted an admin operation");
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(AdminOnly(session))
    }
}

/// Optional authentication extractor.
///
/// Returns `None` if no valid session is present, instead of rejecting.
pub struct OptionalAuth(pub Option<Session>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Auth::from_request_parts(parts, state).await {
            Ok(Auth(session)) => Ok(OptionalAuth(Some(session))),
            Err(_) => Ok(OptionalAuth(None)),
        }
    }
}
