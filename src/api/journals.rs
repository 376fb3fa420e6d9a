// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Journal feed endpoints.
//!
//! Reads are public. Upload and delete require the admin role.

use std::convert::Infallible;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{stream, Stream, StreamExt};

use crate::{
    auth::{AdminOnly, OptionalAuth},
    error::ApiError,
    journal::{FeedView, ImageFile, ResolvedEntry, UploadForm},
    models::{JournalEntryResponse, JournalListResponse, UploadJournalRequest},
    state::AppState,
};

#[utoipa::path(
    get,
    path = "/v1/journals",
    tag = "Journals",
    responses((status = 200, body = JournalListResponse))
)]
pub async fn list_journals(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
) -> Result<Json<JournalListResponse>, ApiError> {
    let entries = state.repo.list_resolved().await?;
    let can_delete = state
        .roles
        .is_admin(viewer.as_ref().map(|s| s.identity.id.as_str()))
        .await;
    Ok(Json(JournalListResponse::new(&entries, can_delete)))
}

fn snapshot_event(view: &FeedView) -> Event {
    let snapshot = JournalListResponse::new(view.snapshot(), view.can_delete());
    Event::default()
        .event("snapshot")
        .json_data(&snapshot)
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Failed to encode feed snapshot");
            Event::default().event("error").data("snapshot unavailable")
        })
}

/// Live feed as server-sent events.
///
/// The first `snapshot` event carries the current list; each change to the
/// journal produces another full snapshot. Closing the connection releases
/// the subscription. The stream ends when the server shuts down.
#[utoipa::path(
    get,
    path = "/v1/journals/live",
    tag = "Journals",
    responses((status = 200, description = "Stream of `snapshot` events", content_type = "text/event-stream"))
)]
pub async fn live_feed(
    State(state): State<AppState>,
    OptionalAuth(viewer): OptionalAuth,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let viewer_id = viewer.map(|s| s.identity.id);
    let view = FeedView::mount(state.repo.clone(), &state.roles, viewer_id.as_deref()).await;
    tracing::debug!(viewer = ?viewer_id, "Live feed opened");

    let events = stream::unfold((view, true), |(mut view, first)| async move {
        if !first && !view.next_change().await {
            return None;
        }
        let event = snapshot_event(&view);
        Some((Ok(event), (view, false)))
    })
    .take_until(state.shutdown.clone().cancelled_owned());

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[utoipa::path(
    get,
    path = "/v1/journals/{entry_id}",
    params(("entry_id" = String, Path, description = "Journal entry id")),
    tag = "Journals",
    responses(
        (status = 200, body = JournalEntryResponse),
        (status = 404, description = "No such entry"),
    )
)]
pub async fn get_journal(
    Path(entry_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<JournalEntryResponse>, ApiError> {
    let resolved = state.repo.get_resolved(&entry_id).await?;
    Ok(Json(resolved.into()))
}

fn multipart_error(e: MultipartError) -> ApiError {
    ApiError::new(e.status(), "invalid_multipart", e.body_text())
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        journal_date: String::new(),
        image: None,
        notes: String::new(),
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.image = Some(ImageFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("journal_date") => form.journal_date = field.text().await.map_err(multipart_error)?,
            Some("notes") => form.notes = field.text().await.map_err(multipart_error)?,
            other => tracing::debug!(field = ?other, "Ignoring unknown upload field"),
        }
    }

    Ok(form)
}

#[utoipa::path(
    post,
    path = "/v1/journals",
    request_body(content = UploadJournalRequest, content_type = "multipart/form-data"),
    tag = "Journals",
    security(("bearer" = [])),
    responses(
        (status = 201, body = JournalEntryResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "An upload by this user is already running"),
        (status = 413, description = "Image larger than 5 MiB"),
        (status = 415, description = "Image type not allowed"),
        (status = 422, description = "Missing image, bad date or notes too long"),
    )
)]
pub async fn upload_journal(
    State(state): State<AppState>,
    AdminOnly(session): AdminOnly,
    multipart: Multipart,
) -> Result<(StatusCode, Json<JournalEntryResponse>), ApiError> {
    let mut form = read_upload_form(multipart).await?;
    let entry = state.pipeline.submit(&session.identity.id, &mut form).await?;

    let image_url = state.repo.resolve_image_url(&entry).await.ok();
    let resolved = ResolvedEntry { entry, image_url };
    Ok((StatusCode::CREATED, Json(resolved.into())))
}

#[utoipa::path(
    delete,
    path = "/v1/journals/{entry_id}",
    params(("entry_id" = String, Path, description = "Journal entry id")),
    tag = "Journals",
    security(("bearer" = [])),
    responses(
        (status = 204),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "No such entry"),
        (status = 409, description = "A delete of this entry is already running"),
    )
)]
pub async fn delete_journal(
    Path(entry_id): Path<String>,
    State(state): State<AppState>,
    AdminOnly(session): AdminOnly,
) -> Result<StatusCode, ApiError> {
    state.repo.delete(&entry_id).await?;
    tracing::info!(entry_id = %entry_id, identity_id = %session.identity.id, "Journal entry removed by admin");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::router;
    use crate::journal::UrlPolicy;
    use crate::state::tests::{test_state, test_state_with};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use std::time::Duration;
    use tower::ServiceExt;

    const BOUNDARY: &str = "journal-test-boundary";

    fn multipart_body(image: Option<(&str, &str, &[u8])>, date: &str, notes: &str) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some((file_name, mime, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: {mime}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        for (name, value) in [("journal_date", date), ("notes", notes)] {
            body.extend_from_slice(
                format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(token: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/v1/journals")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn admin_token(state: &AppState) -> String {
        state
            .auth
            .sign_in("admin@example.com", "admin-pass")
            .await
            .unwrap()
            .token
    }

    #[tokio::test]
    async fn admin_upload_then_public_fetch() {
        let (state, _temp) = test_state().await;
        let token = admin_token(&state).await;
        let png: Vec<u8> = b"\x89PNG\r\n\x1a\nchart-bytes".to_vec();

        let response = router(state.clone())
            .oneshot(upload_request(
                &token,
                multipart_body(Some(("chart.png", "image/png", &png)), "2024-03-15", "Breakout trade"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["journal_date"], "2024-03-15");
        assert_eq!(created["notes"], "Breakout trade");

        let image_url = created["image_url"].as_str().unwrap().to_string();
        let path = image_url.strip_prefix("http://localhost:8080").unwrap();
        let response = router(state.clone())
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), png.as_slice());

        let response = router(state)
            .oneshot(Request::get("/v1/journals").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let list = json_body(response).await;
        assert_eq!(list["entries"].as_array().unwrap().len(), 1);
        assert_eq!(list["can_delete"], false);
    }

    #[tokio::test]
    async fn viewer_cannot_upload() {
        let (state, _temp) = test_state().await;
        let token = state
            .auth
            .sign_in("viewer@example.com", "viewer-pass")
            .await
            .unwrap()
            .token;

        let response = router(state.clone())
            .oneshot(upload_request(
                &token,
                multipart_body(Some(("chart.png", "image/png", b"png")), "2024-03-15", ""),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(state.repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn gif_upload_is_unsupported_media_type() {
        let (state, _temp) = test_state().await;
        let token = admin_token(&state).await;

        let response = router(state.clone())
            .oneshot(upload_request(
                &token,
                multipart_body(Some(("chart.gif", "image/gif", b"GIF89a")), "2024-03-15", ""),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "invalid_file_type");
        assert!(state.repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_image_is_unprocessable() {
        let (state, _temp) = test_state().await;
        let token = admin_token(&state).await;

        let response = router(state)
            .oneshot(upload_request(&token, multipart_body(None, "2024-03-15", "")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn delete_requires_admin_and_removes_entry() {
        let (state, _temp) = test_state().await;
        let admin = state.auth.sign_in("admin@example.com", "admin-pass").await.unwrap();
        let entry = state
            .pipeline
            .upload(
                &admin.identity.id,
                "2024-03-15",
                Some(&ImageFile {
                    file_name: "a.png".into(),
                    content_type: "image/png".into(),
                    bytes: b"png".to_vec(),
                }),
                None,
            )
            .await
            .unwrap();
        let uri = format!("/v1/journals/{}", entry.id);

        let response = router(state.clone())
            .oneshot(Request::delete(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router(state.clone())
            .oneshot(
                Request::delete(&uri)
                    .header(header::AUTHORIZATION, format!("Bearer {}", admin.token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router(state)
            .oneshot(Request::get(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn signed_mode_hides_public_route() {
        let (state, _temp) = test_state_with(UrlPolicy::Signed {
            ttl: std::time::Duration::from_secs(60),
        })
        .await;
        let token = admin_token(&state).await;

        let response = router(state.clone())
            .oneshot(upload_request(
                &token,
                multipart_body(Some(("chart.webp", "image/webp", b"RIFFwebp")), "2024-03-15", ""),
            ))
            .await
            .unwrap();
        let created = json_body(response).await;
        let image_url = created["image_url"].as_str().unwrap();
        assert!(image_url.contains("/v1/storage/sign/"));

        let path = image_url.strip_prefix("http://localhost:8080").unwrap();
        let response = router(state.clone())
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let key = path.split('?').next().unwrap().replace("/v1/storage/sign/", "/v1/storage/public/");
        let response = router(state)
            .oneshot(Request::get(key).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn shutdown_ends_open_live_feeds() {
        let (state, _temp) = test_state().await;
        let shutdown = state.shutdown.clone();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_shutdown = shutdown.clone();
        let server = tokio::spawn(async move {
            axum::serve(listener, router(state))
                .with_graceful_shutdown(server_shutdown.cancelled_owned())
                .await
        });

        let mut feed = reqwest::get(format!("http://{addr}/v1/journals/live"))
            .await
            .unwrap();
        assert_eq!(feed.status(), reqwest::StatusCode::OK);

        let mut received = String::new();
        while !received.contains("event: snapshot") {
            let chunk = feed.chunk().await.unwrap().expect("feed closed early");
            received.push_str(&String::from_utf8_lossy(&chunk));
        }

        shutdown.cancel();

        let stopped = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("graceful shutdown hung on the open feed");
        assert!(stopped.unwrap().is_ok());

        // The client sees the end of the stream rather than a hang
        let tail = tokio::time::timeout(Duration::from_secs(5), async {
            while let Ok(Some(_)) = feed.chunk().await {}
        })
        .await;
        assert!(tail.is_ok());
    }

    #[tokio::test]
    async fn cancelled_feed_body_completes() {
        let (state, _temp) = test_state().await;
        state.shutdown.cancel();

        let response = router(state)
            .oneshot(Request::get("/v1/journals/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = tokio::time::timeout(
            Duration::from_secs(5),
            to_bytes(response.into_body(), usize::MAX),
        )
        .await;
        assert!(body.is_ok());
    }
}
