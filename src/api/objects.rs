// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Image object serving.
//!
//! Only the route matching the deployment's URL policy is live; the other
//! answers 404 so an image is never reachable both ways.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    journal::UrlPolicy,
    state::AppState,
    storage::{ObjectStoreError, SignatureError, StoredObject},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct SignatureQuery {
    /// Unix seconds after which the URL is rejected
    pub expires: i64,
    pub signature: String,
}

async fn load_object(state: &AppState, bucket: &str, key: &str) -> Result<StoredObject, ApiError> {
    if bucket != state.bucket {
        return Err(ApiError::not_found("Object not found"));
    }
    state.objects.get(key).await.map_err(|e| match e {
        ObjectStoreError::NotFound(_) | ObjectStoreError::InvalidKey(_) => {
            ApiError::not_found("Object not found")
        }
        other => {
            tracing::error!(key, error = %other, "Failed to read object");
            ApiError::internal()
        }
    })
}

fn object_response(object: StoredObject, cache_control: &'static str) -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(object.content_type)),
            (header::CACHE_CONTROL, HeaderValue::from_static(cache_control)),
        ],
        object.bytes,
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/v1/storage/public/{bucket}/{key}",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key, may contain `/`"),
    ),
    tag = "Storage",
    responses(
        (status = 200, description = "Image bytes"),
        (status = 404, description = "Unknown object, or public URLs are disabled"),
    )
)]
pub async fn get_public_object(
    Path((bucket, key)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    if state.policy != UrlPolicy::Public {
        return Err(ApiError::not_found("Object not found"));
    }
    let object = load_object(&state, &bucket, &key).await?;
    Ok(object_response(object, "public, max-age=31536000, immutable"))
}

#[utoipa::path(
    get,
    path = "/v1/storage/sign/{bucket}/{key}",
    params(
        ("bucket" = String, Path, description = "Bucket name"),
        ("key" = String, Path, description = "Object key, may contain `/`"),
        SignatureQuery,
    ),
    tag = "Storage",
    responses(
        (status = 200, description = "Image bytes"),
        (status = 403, description = "Signature invalid or expired"),
        (status = 404, description = "Unknown object, or signed URLs are disabled"),
    )
)]
pub async fn get_signed_object(
    Path((bucket, key)): Path<(String, String)>,
    Query(query): Query<SignatureQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let signer = match (state.policy, state.signer.as_ref()) {
        (UrlPolicy::Signed { .. }, Some(signer)) => signer,
        _ => return Err(ApiError::not_found("Object not found")),
    };

    signer
        .verify(&bucket, &key, query.expires, &query.signature, Utc::now())
        .map_err(|e| {
            tracing::debug!(bucket = %bucket, key = %key, error = %e, "Rejected signed object URL");
            let code = match e {
                SignatureError::Expired => "signed_url_expired",
                SignatureError::Malformed | SignatureError::Mismatch => "invalid_signature",
            };
            ApiError::new(axum::http::StatusCode::FORBIDDEN, code, e.to_string())
        })?;

    let object = load_object(&state, &bucket, &key).await?;
    Ok(object_response(object, "private, no-store"))
}
