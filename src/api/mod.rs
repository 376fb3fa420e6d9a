// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::Identity,
    error::ErrorBody,
    models::{
        CredentialsRequest, JournalEntryResponse, JournalListResponse, MeResponse,
        SessionResponse, SignUpResponse, SignUpStatus, UploadJournalRequest,
    },
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod journals;
pub mod objects;
pub mod users;

/// Upper bound on a request body: one 5 MiB image plus form overhead.
pub const MAX_REQUEST_BYTES: usize = 6 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/sign-in", post(auth::sign_in))
        .route("/auth/sign-up", post(auth::sign_up))
        .route("/auth/sign-out", post(auth::sign_out))
        .route("/auth/refresh", post(auth::refresh))
        .route("/users/me", get(users::get_current_user))
        .route(
            "/journals",
            get(journals::list_journals).post(journals::upload_journal),
        )
        .route("/journals/live", get(journals::live_feed))
        .route(
            "/journals/{entry_id}",
            get(journals::get_journal).delete(journals::delete_journal),
        )
        .route(
            "/storage/public/{bucket}/{*key}",
            get(objects::get_public_object),
        )
        .route(
            "/storage/sign/{bucket}/{*key}",
            get(objects::get_signed_object),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BYTES))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state)
        .nest("/v1", v1_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        auth::sign_in,
        auth::sign_up,
        auth::sign_out,
        auth::refresh,
        users::get_current_user,
        journals::list_journals,
        journals::live_feed,
        journals::get_journal,
        journals::upload_journal,
        journals::delete_journal,
        objects::get_public_object,
        objects::get_signed_object
    ),
    components(
        schemas(
            Identity,
            ErrorBody,
            CredentialsRequest,
            SessionResponse,
            SignUpResponse,
            SignUpStatus,
            MeResponse,
            JournalEntryResponse,
            JournalListResponse,
            UploadJournalRequest,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Auth", description = "Sessions: sign-in, sign-up, sign-out, refresh"),
        (name = "Users", description = "Current user"),
        (name = "Journals", description = "Trading journal feed and admin uploads"),
        (name = "Storage", description = "Journal image objects")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_builds_with_all_routes() {
        let (state, _temp) = test_state().await;
        let app = router(state);
        // Ensure the router can be converted into a service without panicking.
        let _ = app.into_make_service();
    }

    #[tokio::test]
    async fn responses_carry_request_id() {
        let (state, _temp) = test_state().await;

        let response = router(state)
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn sign_in_over_http() {
        let (state, _temp) = test_state().await;

        let response = router(state)
            .oneshot(
                Request::post("/v1/auth/sign-in")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"email":"viewer@example.com","password":"viewer-pass"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["token_type"], "Bearer");
        assert_eq!(body["user"]["email"], "viewer@example.com");
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let (state, _temp) = test_state().await;

        let response = router(state)
            .oneshot(
                Request::post("/v1/journals")
                    .header("content-length", (MAX_REQUEST_BYTES + 1).to_string())
                    .body(Body::from(vec![0u8; MAX_REQUEST_BYTES + 1]))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn openapi_lists_journal_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/journals"));
        assert!(doc.paths.paths.contains_key("/v1/journals/{entry_id}"));
    }
}
