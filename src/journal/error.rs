// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Journal subsystem errors.

use serde::Serialize;

/// Which half of a delete failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteStage {
    Object,
    Record,
}

impl std::fmt::Display for DeleteStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteStage::Object => write!(f, "object"),
            DeleteStage::Record => write!(f, "record"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    /// Bad input the user can correct.
    #[error("{0}")]
    ValidationError(String),

    #[error("Only .jpg, .jpeg, .png and .webp formats are supported")]
    InvalidFileType,

    #[error("Max file size is 5MB")]
    FileTooLarge,

    #[error("Failed to store image: {0}")]
    StorageWriteFailed(String),

    #[error("Failed to save journal entry: {0}")]
    RecordWriteFailed(String),

    #[error("Failed to load journal entries: {0}")]
    RecordReadFailed(String),

    #[error("Failed to delete journal entry at {stage} stage: {reason}")]
    DeleteFailed { stage: DeleteStage, reason: String },

    #[error("Journal entry not found: {0}")]
    NotFound(String),

    #[error("An upload is already in progress")]
    UploadInFlight,

    #[error("A delete of this entry is already in progress")]
    DeleteInFlight,

    #[error("Image is no longer available: {0}")]
    ImageUnavailable(String),

    #[error("Only admins may perform this action")]
    Forbidden,
}

impl JournalError {
    /// Stable machine-readable code.
    pub fn error_code(&self) -> &'static str {
        match self {
            JournalError::ValidationError(_) => "validation_error",
            JournalError::InvalidFileType => "invalid_file_type",
            JournalError::FileTooLarge => "file_too_large",
            JournalError::StorageWriteFailed(_) => "storage_write_failed",
            JournalError::RecordWriteFailed(_) => "record_write_failed",
            JournalError::RecordReadFailed(_) => "record_read_failed",
            JournalError::DeleteFailed {
                stage: DeleteStage::Object,
                ..
            } => "delete_failed_object",
            JournalError::DeleteFailed {
                stage: DeleteStage::Record,
                ..
            } => "delete_failed_record",
            JournalError::NotFound(_) => "not_found",
            JournalError::UploadInFlight => "upload_in_flight",
            JournalError::DeleteInFlight => "delete_in_flight",
            JournalError::ImageUnavailable(_) => "image_unavailable",
            JournalError::Forbidden => "forbidden",
        }
    }

    /// Infrastructure faults, as opposed to user-correctable input.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            JournalError::StorageWriteFailed(_)
                | JournalError::RecordWriteFailed(_)
                | JournalError::RecordReadFailed(_)
                | JournalError::DeleteFailed { .. }
        )
    }
}
