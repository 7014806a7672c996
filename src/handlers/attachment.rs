use super::{path_param, timestamp};
use crate::error::{AppError, AppResult};
use crate::models::AttachmentModel;
use crate::response::ApiResponse;
use crate::services::attachment::{AttachmentService, UploadConfig};
use crate::services::credentials::AdminUser;
use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::PathRejection,
        Multipart, Path,
    },
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AttachmentResponse {
    pub id: i32,
    pub report_id: i32,
    /// Sanitized name the file was uploaded with
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: String,
}

impl From<AttachmentModel> for AttachmentResponse {
    fn from(a: AttachmentModel) -> Self {
        Self {
            id: a.id,
            report_id: a.report_id,
            file_name: a.original_name,
            mime_type: a.mime_type,
            size_bytes: a.size_bytes,
            created_at: timestamp(a.created_at),
        }
    }
}

/// Multipart form with a single `file` part.
#[derive(ToSchema)]
pub struct AttachmentUpload {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::Validation(format!("Failed to read upload: {}", e.body_text()))
    }
}

/// Returns the client file name, declared content type and bytes of the
/// `file` part. Other parts are skipped.
async fn read_file_part(multipart: &mut Multipart) -> AppResult<(Option<String>, String, Bytes)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let data = field.bytes().await.map_err(multipart_error)?;
        return Ok((file_name, content_type, data));
    }

    Err(AppError::Validation("No file provided".to_string()))
}

/// Always served as a download, never rendered inline.
fn file_response(attachment: AttachmentModel, data: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", attachment.original_name);
    (
        [
            (header::CONTENT_TYPE, attachment.mime_type),
            (header::CONTENT_DISPOSITION, disposition),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        data,
    )
        .into_response()
}

#[utoipa::path(
    post,
    path = "/api/v1/reports/{id}/attachments",
    params(("id" = i32, Path, description = "Report ID")),
    request_body(content = AttachmentUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Attachment stored", body = AttachmentResponse),
        (status = 400, description = "Unsupported type, upload window closed or too many attachments", body = AppError),
        (status = 404, description = "Report not found or held for moderation", body = AppError),
        (status = 413, description = "File larger than 5 MB", body = AppError),
    ),
    tag = "reports"
)]
pub async fn upload_attachment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<UploadConfig>,
    id: Result<Path<i32>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<impl IntoResponse> {
    let id = path_param(id)?;
    let mut multipart = multipart.map_err(|e| AppError::Validation(e.body_text()))?;
    let (file_name, content_type, data) = read_file_part(&mut multipart).await?;

    let service = AttachmentService::new(db);
    let attachment = service
        .attach(&config, id, file_name.as_deref(), &content_type, &data)
        .await?;

    Ok(ApiResponse::ok(AttachmentResponse::from(attachment)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}/attachments/{attachment_id}",
    params(
        ("id" = i32, Path, description = "Report ID"),
        ("attachment_id" = i32, Path, description = "Attachment ID"),
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Not found or report held for moderation", body = AppError),
    ),
    tag = "reports"
)]
pub async fn download_attachment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<UploadConfig>,
    ids: Result<Path<(i32, i32)>, PathRejection>,
) -> AppResult<Response> {
    let (report_id, attachment_id) = path_param(ids)?;
    let service = AttachmentService::new(db);
    let (report, attachment) = service.find(report_id, attachment_id).await?;

    if report.is_flagged {
        return Err(AppError::NotFound);
    }

    let data = AttachmentService::read(&config, &attachment).await?;
    Ok(file_response(attachment, data))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/reports/{id}/attachments/{attachment_id}",
    security(("admin_basic" = [])),
    params(
        ("id" = i32, Path, description = "Report ID"),
        ("attachment_id" = i32, Path, description = "Attachment ID"),
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 401, description = "Missing or wrong admin credentials", body = AppError),
        (status = 404, description = "Not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn admin_download_attachment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<UploadConfig>,
    _admin: AdminUser,
    ids: Result<Path<(i32, i32)>, PathRejection>,
) -> AppResult<Response> {
    let (report_id, attachment_id) = path_param(ids)?;
    let service = AttachmentService::new(db);
    let (_, attachment) = service.find(report_id, attachment_id).await?;

    let data = AttachmentService::read(&config, &attachment).await?;
    Ok(file_response(attachment, data))
}
