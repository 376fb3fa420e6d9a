// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Authentication error type.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Session token is malformed or its signature does not verify
    MalformedToken,
    /// Session token has expired
    TokenExpired,
    /// Token is well-formed but the session was signed out or superseded
    SessionNotFound,
    /// Provider rejected the pair (wrong password, unknown email, unverified)
    InvalidCredentials,
    /// Credentials failed local validation
    Validation(String),
    /// Authenticated but lacking the admin capability
    InsufficientPermissions,
    /// Identity provider unreachable or misbehaving
    Provider(String),
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::Validation(_) => "validation_error",
            AuthError::InsufficientPermissions => "insufficient_permissions",
            AuthError::Provider(_) => "identity_provider_error",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::MalformedToken
            | AuthError::TokenExpired
            | AuthError::SessionNotFound
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "Session token is malformed"),
            AuthError::TokenExpired => write!(f, "Session has expired"),
            AuthError::SessionNotFound => write!(f, "Session is no longer active"),
            AuthError::InvalidCredentials => write!(f, "Invalid login credentials"),
            AuthError::Validation(msg) => write!(f, "{msg}"),
            AuthError::InsufficientPermissions => {
                write!(f, "Insufficient permissions for this operation")
            }
            AuthError::Provider(msg) => write!(f, "Identity provider error: {msg}"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() || status == StatusCode::BAD_GATEWAY {
            tracing::error!(error = %self, "Authentication infrastructure failure");
        }
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
