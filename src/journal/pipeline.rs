// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Upload pipeline: validate, store the image, record the entry.
//!
//! ## Order of operations
//!
//! 1. Validate (no side effects): image present and allow-listed, size,
//!    date, notes
//! 2. Derive key `{identity}/{token}.{ext}`
//! 3. Put the object (`StorageWriteFailed` on failure, nothing recorded)
//! 4. Resolve the reference under the URL policy
//! 5. Insert the record (`RecordWriteFailed` on failure)
//!
//! A failure at step 5 leaves the object from step 3 unreferenced. It is
//! logged with its key and not cleaned up here.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use super::busy::InFlight;
use super::entry::{JournalEntry, ALLOWED_MIME_TYPES, MAX_IMAGE_BYTES, MAX_NOTES_CHARS};
use super::error::JournalError;
use super::url_policy::UrlPolicy;
use crate::storage::{ObjectStore, RecordStore};

/// An image as received from the client.
#[derive(Debug, Clone)]
pub struct ImageFile {
    /// Original filename; its extension names the stored object
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Upload form state. Cleared after a successful submit, kept after a
/// failure so the user can retry.
#[derive(Debug, Clone)]
pub struct UploadForm {
    /// `YYYY-MM-DD`
    pub journal_date: String,
    pub image: Option<ImageFile>,
    pub notes: String,
}

impl Default for UploadForm {
    fn default() -> Self {
        Self {
            journal_date: today(),
            image: None,
            notes: String::new(),
        }
    }
}

impl UploadForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ready the form for the next entry.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Input that passed every precondition.
#[derive(Debug)]
struct ValidUpload<'a> {
    image: &'a ImageFile,
    mime: String,
    journal_date: NaiveDate,
    notes: Option<String>,
}

fn normalize_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn validate<'a>(
    journal_date: &str,
    image: Option<&'a ImageFile>,
    notes: Option<&str>,
) -> Result<ValidUpload<'a>, JournalError> {
    let image = image.ok_or_else(|| JournalError::ValidationError("Image is required".into()))?;

    let mime = normalize_mime(&image.content_type);
    if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
        return Err(JournalError::InvalidFileType);
    }

    if image.bytes.len() > MAX_IMAGE_BYTES {
        return Err(JournalError::FileTooLarge);
    }

    let journal_date = journal_date.trim();
    if journal_date.is_empty() {
        return Err(JournalError::ValidationError("Date is required".into()));
    }
    let journal_date = NaiveDate::parse_from_str(journal_date, "%Y-%m-%d")
        .map_err(|_| JournalError::ValidationError("Date must be formatted YYYY-MM-DD".into()))?;

    let notes = notes.map(str::trim).filter(|notes| !notes.is_empty());
    if notes.is_some_and(|notes| notes.chars().count() > MAX_NOTES_CHARS) {
        return Err(JournalError::ValidationError(
            "Notes must be less than 1000 characters".into(),
        ));
    }

    Ok(ValidUpload {
        image,
        mime,
        journal_date,
        notes: notes.map(str::to_string),
    })
}

/// Extension for the stored object: the filename's, lower-cased, or the MIME
/// subtype when the filename has none usable.
fn extension_for(file_name: &str, mime: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.bytes().all(|b| b.is_ascii_alphanumeric()))
        .unwrap_or_else(|| mime.rsplit('/').next().unwrap_or("bin").to_string())
}

pub struct UploadPipeline {
    objects: Arc<dyn ObjectStore>,
    records: Arc<dyn RecordStore>,
    policy: UrlPolicy,
    in_flight: InFlight,
    last_token: AtomicI64,
}

impl UploadPipeline {
    pub fn new(objects: Arc<dyn ObjectStore>, records: Arc<dyn RecordStore>, policy: UrlPolicy) -> Self {
        Self {
            objects,
            records,
            policy,
            in_flight: InFlight::new(),
            last_token: AtomicI64::new(0),
        }
    }

    /// Whether `identity_id` has an upload running.
    pub fn is_busy(&self, identity_id: &str) -> bool {
        self.in_flight.is_busy(identity_id)
    }

    /// Epoch milliseconds, bumped so no two calls in this process share one.
    fn next_token(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        match self
            .last_token
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            }) {
            Ok(last) | Err(last) => now.max(last + 1),
        }
    }

    pub async fn upload(
        &self,
        identity_id: &str,
        journal_date: &str,
        image: Option<&ImageFile>,
        notes: Option<&str>,
    ) -> Result<JournalEntry, JournalError> {
        let valid = validate(journal_date, image, notes)?;

        let _busy = self
            .in_flight
            .try_acquire(identity_id)
            .ok_or(JournalError::UploadInFlight)?;

        let key = format!(
            "{identity_id}/{}.{}",
            self.next_token(),
            extension_for(&valid.image.file_name, &valid.mime)
        );

        self.objects
            .put(&key, &valid.image.bytes)
            .await
            .map_err(|e| {
                tracing::error!(key = %key, error = %e, "Image upload to object store failed");
                JournalError::StorageWriteFailed(e.to_string())
            })?;

        let image_reference = match self.policy.reference_for_key(self.objects.as_ref(), &key) {
            Ok(reference) => reference,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Could not derive image reference");
                if let Err(cleanup) = self.objects.delete(&key).await {
                    tracing::error!(key = %key, error = %cleanup, "Orphaned image left in object store");
                }
                return Err(JournalError::StorageWriteFailed(e.to_string()));
            }
        };

        let entry = JournalEntry {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: identity_id.to_string(),
            journal_date: valid.journal_date,
            image_reference,
            notes: valid.notes,
            created_at: Utc::now(),
        };

        if let Err(e) = self.records.insert(&entry).await {
            // TODO: reconciliation sweep for objects with no matching record
            tracing::error!(
                key = %key,
                entry_id = %entry.id,
                error = %e,
                "Journal record insert failed; stored image is now orphaned"
            );
            return Err(JournalError::RecordWriteFailed(e.to_string()));
        }

        tracing::info!(
            entry_id = %entry.id,
            user_id = %entry.user_id,
            journal_date = %entry.journal_date,
            key = %key,
            size = valid.image.bytes.len(),
            "Journal entry uploaded"
        );
        Ok(entry)
    }

    /// Upload the form's contents; on success the form is reset.
    pub async fn submit(
        &self,
        identity_id: &str,
        form: &mut UploadForm,
    ) -> Result<JournalEntry, JournalError> {
        let entry = self
            .upload(
                identity_id,
                &form.journal_date,
                form.image.as_ref(),
                Some(&form.notes),
            )
            .await?;
        form.reset();
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(name: &str, mime: &str, size: usize) -> ImageFile {
        ImageFile {
            file_name: name.to_string(),
            content_type: mime.to_string(),
            bytes: vec![0u8; size],
        }
    }

    #[test]
    fn missing_image_is_validation_error() {
        let result = validate("2024-03-15", None, None);
        assert!(matches!(result, Err(JournalError::ValidationError(_))));
    }

    #[test]
    fn mime_allow_list() {
        for mime in ["image/jpeg", "image/jpg", "image/png", "image/webp", "IMAGE/PNG"] {
            assert!(validate("2024-03-15", Some(&image("a.png", mime, 10)), None).is_ok());
        }
        for mime in ["image/gif", "application/pdf", "text/plain", ""] {
            assert!(matches!(
                validate("2024-03-15", Some(&image("a.png", mime, 10)), None),
                Err(JournalError::InvalidFileType)
            ));
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        let at_limit = image("a.png", "image/png", MAX_IMAGE_BYTES);
        let over = image("a.png", "image/png", MAX_IMAGE_BYTES + 1);

        assert!(validate("2024-03-15", Some(&at_limit), None).is_ok());
        assert!(matches!(
            validate("2024-03-15", Some(&over), None),
            Err(JournalError::FileTooLarge)
        ));
    }

    #[test]
    fn file_type_is_checked_before_size() {
        let big_gif = image("a.gif", "image/gif", MAX_IMAGE_BYTES + 1);
        assert!(matches!(
            validate("2024-03-15", Some(&big_gif), None),
            Err(JournalError::InvalidFileType)
        ));
    }

    #[test]
    fn date_must_parse() {
        let png = image("a.png", "image/png", 10);
        assert!(matches!(
            validate("", Some(&png), None),
            Err(JournalError::ValidationError(_))
        ));
        assert!(matches!(
            validate("15/03/2024", Some(&png), None),
            Err(JournalError::ValidationError(_))
        ));
        assert!(matches!(
            validate("2024-02-30", Some(&png), None),
            Err(JournalError::ValidationError(_))
        ));
    }

    #[test]
    fn notes_are_trimmed_and_bounded() {
        let png = image("a.png", "image/png", 10);

        let valid = validate("2024-03-15", Some(&png), Some("  Breakout trade  ")).unwrap();
        assert_eq!(valid.notes.as_deref(), Some("Breakout trade"));

        let valid = validate("2024-03-15", Some(&png), Some("   ")).unwrap();
        assert_eq!(valid.notes, None);

        let padded = format!("  {}  ", "n".repeat(MAX_NOTES_CHARS));
        assert!(validate("2024-03-15", Some(&png), Some(&padded)).is_ok());

        let long = "n".repeat(MAX_NOTES_CHARS + 1);
        assert!(matches!(
            validate("2024-03-15", Some(&png), Some(&long)),
            Err(JournalError::ValidationError(_))
        ));
    }

    #[test]
    fn extension_comes_from_filename() {
        assert_eq!(extension_for("chart.PNG", "image/png"), "png");
        assert_eq!(extension_for("my.chart.jpeg", "image/jpeg"), "jpeg");
        assert_eq!(extension_for("chart", "image/webp"), "webp");
        assert_eq!(extension_for("chart.", "image/jpeg"), "jpeg");
        assert_eq!(extension_for("chart.p g", "image/png"), "png");
    }

    #[test]
    fn form_reset_clears_inputs() {
        let mut form = UploadForm {
            journal_date: "2020-01-01".into(),
            image: Some(image("a.png", "image/png", 10)),
            notes: "note".into(),
        };
        form.reset();

        assert!(form.image.is_none());
        assert!(form.notes.is_empty());
        assert_eq!(form.journal_date, today());
    }
}
