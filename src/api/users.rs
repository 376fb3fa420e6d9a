// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{extract::State, Json};

use crate::{auth::Auth, models::MeResponse, state::AppState};

/// Get the current user and whether they hold the admin role.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "User information", body = MeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(State(state): State<AppState>, Auth(session): Auth) -> Json<MeResponse> {
    let is_admin = state.roles.is_admin(Some(&session.identity.id)).await;
    Json(MeResponse {
        user: session.identity,
        is_admin,
        session_expires_at: session.expires_at,
    })
}
