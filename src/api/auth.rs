// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in, sign-up, sign-out and refresh.

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    auth::{Auth, AuthError, OptionalAuth, SignUpOutcome},
    models::{CredentialsRequest, SessionResponse, SignUpResponse, SignUpStatus},
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/v1/auth/sign-in",
    request_body = CredentialsRequest,
    tag = "Auth",
    responses(
        (status = 200, body = SessionResponse),
        (status = 401, description = "Invalid login credentials"),
        (status = 422, description = "Email or password failed validation"),
    )
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<Json<SessionResponse>, AuthError> {
    let session = state.auth.sign_in(&request.email, &request.password).await?;
    tracing::info!(identity_id = %session.identity.id, "Signed in");
    Ok(Json(session.into()))
}

#[utoipa::path(
    post,
    path = "/v1/auth/sign-up",
    request_body = CredentialsRequest,
    tag = "Auth",
    responses(
        (status = 201, body = SignUpResponse),
        (status = 422, description = "Validation failed or email already registered"),
    )
)]
pub async fn sign_up(
    State(state): State<AppState>,
    Json(request): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<SignUpResponse>), AuthError> {
    let response = match state.auth.sign_up(&request.email, &request.password).await? {
        SignUpOutcome::Active(session) => SignUpResponse {
            status: SignUpStatus::Active,
            user: session.identity.clone(),
            session: Some(session.into()),
        },
        SignUpOutcome::PendingVerification(identity) => SignUpResponse {
            status: SignUpStatus::PendingVerification,
            user: identity,
            session: None,
        },
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// End the caller's session. Succeeds whether or not one was active.
#[utoipa::path(
    post,
    path = "/v1/auth/sign-out",
    tag = "Auth",
    security(("bearer" = [])),
    responses((status = 204))
)]
pub async fn sign_out(
    State(state): State<AppState>,
    OptionalAuth(session): OptionalAuth,
) -> StatusCode {
    state
        .auth
        .sign_out(session.as_ref().map(|s| s.token.as_str()))
        .await;
    StatusCode::NO_CONTENT
}

/// Swap the current token for a fresh one; the old token stops resolving.
#[utoipa::path(
    post,
    path = "/v1/auth/refresh",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, body = SessionResponse),
        (status = 401, description = "Missing, expired or superseded session"),
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Auth(session): Auth,
) -> Result<Json<SessionResponse>, AuthError> {
    let refreshed = state.auth.refresh(&session.token).await?;
    Ok(Json(refreshed.into()))
}
