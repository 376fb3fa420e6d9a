// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::journal::JournalError;

/// Generic message for infrastructure failures; details go to the log.
const RETRY_MESSAGE: &str = "Something went wrong. Please try again.";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub error_code: &'static str,
}

/// JSON error body shared by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: String,
}

impl ApiError {
    pub fn new(status: StatusCode, error_code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            error_code,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "validation_error", message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", RETRY_MESSAGE)
    }
}

impl From<JournalError> for ApiError {
    fn from(err: JournalError) -> Self {
        let code = err.error_code();
        let status = match &err {
            JournalError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            JournalError::InvalidFileType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            JournalError::FileTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            JournalError::NotFound(_) | JournalError::ImageUnavailable(_) => StatusCode::NOT_FOUND,
            JournalError::UploadInFlight | JournalError::DeleteInFlight => StatusCode::CONFLICT,
            JournalError::Forbidden => StatusCode::FORBIDDEN,
            JournalError::StorageWriteFailed(_)
            | JournalError::RecordWriteFailed(_)
            | JournalError::RecordReadFailed(_)
            | JournalError::DeleteFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if err.is_infrastructure() {
            tracing::error!(error = %err, error_code = code, "Journal operation failed");
            return Self::new(status, code, RETRY_MESSAGE);
        }
        Self::new(status, code, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
            error_code: self.error_code.to_string(),
        });
        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::DeleteStage;
    use axum::body::to_bytes;

    #[test]
    fn constructors_set_status_and_message() {
        let nf = ApiError::not_found("missing");
        assert_eq!(nf.status, StatusCode::NOT_FOUND);
        assert_eq!(nf.message, "missing");

        let bad = ApiError::bad_request("bad");
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "bad");

        let unp = ApiError::unprocessable("oops");
        assert_eq!(unp.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(unp.error_code, "validation_error");
    }

    #[tokio::test]
    async fn into_response_returns_json_body() {
        let response = ApiError::bad_request("bad data").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert_eq!(body, r#"{"error":"bad data","error_code":"bad_request"}"#);
    }

    #[test]
    fn journal_input_errors_keep_their_message() {
        let err = ApiError::from(JournalError::InvalidFileType);
        assert_eq!(err.status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(err.message, "Only .jpg, .jpeg, .png and .webp formats are supported");

        let err = ApiError::from(JournalError::FileTooLarge);
        assert_eq!(err.status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.message, "Max file size is 5MB");

        let err = ApiError::from(JournalError::UploadInFlight);
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.error_code, "upload_in_flight");
    }

    #[test]
    fn infrastructure_errors_hide_details() {
        let err = ApiError::from(JournalError::DeleteFailed {
            stage: DeleteStage::Object,
            reason: "disk on fire".into(),
        });
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code, "delete_failed_object");
        assert!(!err.message.contains("disk on fire"));
    }

    #[tokio::test]
    async fn delete_failure_code_names_the_stage() {
        let response = ApiError::from(JournalError::DeleteFailed {
            stage: DeleteStage::Record,
            reason: "table locked".into(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body_bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body_bytes.to_vec()).unwrap();
        assert!(body.contains(r#""error_code":"delete_failed_record""#));
        assert!(!body.contains("table locked"));
    }
}
