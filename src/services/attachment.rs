//! Evidence files attached to reports.
//!
//! Files live in `UPLOAD_DIR` under a random name; the `attachments` table maps
//! them to their report. Uploads are anonymous, so they are only accepted for
//! a short window after submission and up to a fixed count per report.

use crate::{
    error::{AppError, AppResult},
    models::{attachment, Attachment, AttachmentModel, Report, ReportModel},
};
use anyhow::Context;
use chrono::Duration;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use std::{collections::HashMap, env, io, path::PathBuf};
use tokio::fs;
use uuid::Uuid;

pub const MAX_FILE_SIZE: usize = 5 * 1024 * 1024; // 5 MB
/// Body limit for the upload route: one file plus multipart framing.
pub const MAX_UPLOAD_BODY: usize = MAX_FILE_SIZE + 64 * 1024;
pub const MAX_ATTACHMENTS_PER_REPORT: u64 = 5;
pub const UPLOAD_WINDOW_MINUTES: i64 = 30;
const MAX_NAME_LEN: usize = 255;

/// Accepted content types and the extension stored files get.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub upload_dir: PathBuf,
}

impl UploadConfig {
    /// `UPLOAD_DIR`, default `./uploads`.
    pub fn from_env() -> Self {
        Self {
            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "./uploads".to_string())
                .into(),
        }
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.upload_dir).await
    }

    fn path_for(&self, storage_name: &str) -> PathBuf {
        self.upload_dir.join(storage_name)
    }

    /// Best effort. Files that are already gone are ignored.
    pub async fn remove_files(&self, storage_names: &[String]) {
        for name in storage_names {
            match fs::remove_file(self.path_for(name)).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(file = %name, "Failed to remove attachment file: {}", e),
            }
        }
    }
}

/// Validate file magic bytes match the declared content type.
fn validate_magic_bytes(data: &[u8], content_type: &str) -> bool {
    match content_type {
        "image/jpeg" => data.starts_with(&[0xFF, 0xD8, 0xFF]),
        "image/png" => data.starts_with(&[0x89, 0x50, 0x4E, 0x47]),
        "image/gif" => data.starts_with(b"GIF8"),
        "image/webp" => data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP",
        "application/pdf" => data.starts_with(b"%PDF-"),
        _ => false,
    }
}

/// Returns the normalized content type and the extension to store under.
fn check_upload(content_type: &str, data: &[u8]) -> AppResult<(String, &'static str)> {
    if data.is_empty() {
        return Err(AppError::Validation("Attachment must not be empty".to_string()));
    }
    if data.len() > MAX_FILE_SIZE {
        return Err(AppError::PayloadTooLarge);
    }

    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = ALLOWED_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == mime)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Unsupported file type: {}. Allowed: jpeg, png, gif, webp, pdf",
                mime
            ))
        })?;

    if !validate_magic_bytes(data, &mime) {
        return Err(AppError::Validation(
            "File content does not match declared content type".to_string(),
        ));
    }

    Ok((mime, ext))
}

/// Last path component only, restricted to characters that are safe inside a
/// quoted `Content-Disposition` filename.
pub fn sanitize_file_name(raw: Option<&str>, ext: &str) -> String {
    let base = raw
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');

    if cleaned.is_empty() {
        format!("attachment.{}", ext)
    } else {
        cleaned.to_string()
    }
}

pub struct AttachmentService {
    db: DatabaseConnection,
}

impl AttachmentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Store one file for a report. Flagged reports look missing, as they do
    /// on every public route.
    pub async fn attach(
        &self,
        config: &UploadConfig,
        report_id: i32,
        file_name: Option<&str>,
        content_type: &str,
        data: &[u8],
    ) -> AppResult<AttachmentModel> {
        let (mime, ext) = check_upload(content_type, data)?;
        let now = chrono::Utc::now().naive_utc();

        let txn = self.db.begin().await?;

        // Serializes uploads per report so the count below holds, and waits
        // out a concurrent delete.
        let report = Report::find_by_id(report_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;
        if report.is_flagged {
            return Err(AppError::NotFound);
        }
        if now - report.created_at > Duration::minutes(UPLOAD_WINDOW_MINUTES) {
            return Err(AppError::Validation(format!(
                "Attachments can only be added within {} minutes of submission",
                UPLOAD_WINDOW_MINUTES
            )));
        }

        let existing = Attachment::find()
            .filter(attachment::Column::ReportId.eq(report_id))
            .count(&txn)
            .await?;
        if existing >= MAX_ATTACHMENTS_PER_REPORT {
            return Err(AppError::Validation(format!(
                "A report can have at most {} attachments",
                MAX_ATTACHMENTS_PER_REPORT
            )));
        }

        let storage_name = format!("{}.{}", Uuid::new_v4(), ext);
        fs::write(config.path_for(&storage_name), data)
            .await
            .context("writing attachment file")?;

        let stored = attachment::ActiveModel {
            report_id: Set(report_id),
            original_name: Set(sanitize_file_name(file_name, ext)),
            storage_name: Set(storage_name.clone()),
            mime_type: Set(mime),
            size_bytes: Set(data.len() as i64),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        let stored = match stored {
            Ok(model) => txn.commit().await.map(|_| model),
            Err(e) => Err(e),
        };

        match stored {
            Ok(model) => {
                tracing::info!(
                    report_id,
                    attachment_id = model.id,
                    size_bytes = model.size_bytes,
                    "Attachment stored"
                );
                Ok(model)
            }
            Err(e) => {
                config.remove_files(&[storage_name]).await;
                Err(e.into())
            }
        }
    }

    /// The attachment together with the report it belongs to.
    pub async fn find(
        &self,
        report_id: i32,
        attachment_id: i32,
    ) -> AppResult<(ReportModel, AttachmentModel)> {
        let report = Report::find_by_id(report_id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        let attachment = Attachment::find_by_id(attachment_id)
            .filter(attachment::Column::ReportId.eq(report_id))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)?;

        Ok((report, attachment))
    }

    pub async fn for_report(&self, report_id: i32) -> AppResult<Vec<AttachmentModel>> {
        Ok(self
            .list_for_reports(&[report_id])
            .await?
            .remove(&report_id)
            .unwrap_or_default())
    }

    /// Attachments grouped by report id, oldest first within a report.
    pub async fn list_for_reports(
        &self,
        report_ids: &[i32],
    ) -> AppResult<HashMap<i32, Vec<AttachmentModel>>> {
        if report_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = Attachment::find()
            .filter(attachment::Column::ReportId.is_in(report_ids.iter().copied()))
            .order_by_asc(attachment::Column::Id)
            .all(&self.db)
            .await?;

        let mut grouped: HashMap<i32, Vec<AttachmentModel>> = HashMap::new();
        for row in rows {
            grouped.entry(row.report_id).or_default().push(row);
        }
        Ok(grouped)
    }

    pub async fn read(config: &UploadConfig, attachment: &AttachmentModel) -> AppResult<Vec<u8>> {
        match fs::read(config.path_for(&attachment.storage_name)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(
                    attachment_id = attachment.id,
                    file = %attachment.storage_name,
                    "Attachment row has no file on disk"
                );
                Err(AppError::NotFound)
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context("reading attachment file")
                .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn magic_bytes_for_each_allowed_type() {
        assert!(validate_magic_bytes(&[0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg"));
        assert!(validate_magic_bytes(PNG, "image/png"));
        assert!(validate_magic_bytes(b"GIF89a", "image/gif"));
        assert!(validate_magic_bytes(b"RIFF\0\0\0\0WEBPVP8 ", "image/webp"));
        assert!(validate_magic_bytes(b"%PDF-1.7\n", "application/pdf"));
    }

    #[test]
    fn wrong_or_short_magic_bytes_rejected() {
        assert!(!validate_magic_bytes(PNG, "image/jpeg"));
        assert!(!validate_magic_bytes(&[0xFF, 0xD8], "image/jpeg"));
        assert!(!validate_magic_bytes(b"RIFF\0\0\0\0", "image/webp"));
        assert!(!validate_magic_bytes(&[], "application/pdf"));
        assert!(!validate_magic_bytes(b"%PDF-1.7", "text/html"));
    }

    #[test]
    fn content_type_parameters_and_case_are_ignored() {
        let (mime, ext) = check_upload("Image/PNG; charset=binary", PNG).unwrap();
        assert_eq!(mime, "image/png");
        assert_eq!(ext, "png");
    }

    #[test]
    fn upload_checks_reject_bad_input() {
        assert!(matches!(
            check_upload("image/png", &[]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            check_upload("text/html", b"<html>"),
            Err(AppError::Validation(msg)) if msg.contains("Unsupported")
        ));
        assert!(matches!(
            check_upload("application/pdf", PNG),
            Err(AppError::Validation(msg)) if msg.contains("does not match")
        ));

        let mut oversized = PNG.to_vec();
        oversized.resize(MAX_FILE_SIZE + 1, 0);
        assert!(matches!(
            check_upload("image/png", &oversized),
            Err(AppError::PayloadTooLarge)
        ));
    }

    #[test]
    fn file_names_are_reduced_to_a_safe_base_name() {
        assert_eq!(sanitize_file_name(Some("scan.pdf"), "pdf"), "scan.pdf");
        assert_eq!(
            sanitize_file_name(Some("../../etc/passwd"), "png"),
            "passwd"
        );
        assert_eq!(
            sanitize_file_name(Some("C:\\Users\\me\\screen shot.png"), "png"),
            "screen shot.png"
        );
        assert_eq!(
            sanitize_file_name(Some("a\"b;\r\nc\0.png"), "png"),
            "a_b_c.png"
        );
        assert_eq!(sanitize_file_name(Some(".hidden"), "gif"), "hidden");
        assert_eq!(sanitize_file_name(Some("..."), "gif"), "attachment.gif");
        assert_eq!(sanitize_file_name(None, "jpg"), "attachment.jpg");
    }

    #[test]
    fn long_names_are_truncated() {
        let long = "x".repeat(1000);
        assert_eq!(sanitize_file_name(Some(&long), "png").len(), MAX_NAME_LEN);
    }
}
