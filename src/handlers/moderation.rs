use super::{json_body, path_param, query_params, report::ReportResponse, timestamp};
use crate::error::{AppError, AppResult};
use crate::models::{AttachmentModel, ReportAuditModel};
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::attachment::{AttachmentService, UploadConfig};
use crate::services::credentials::AdminUser;
use crate::services::moderation::{ModerationAction, ModerationOutcome, ModerationService};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query,
    },
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One moderation action, e.g. `{"action": "flag"}` or
/// `{"action": "classify", "classification": "phishing"}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ModerateRequest {
    Flag,
    Unflag,
    Classify { classification: String },
    Verify,
    Delete,
}

impl From<ModerateRequest> for ModerationAction {
    fn from(req: ModerateRequest) -> Self {
        match req {
            ModerateRequest::Flag => ModerationAction::Flag,
            ModerateRequest::Unflag => ModerationAction::Unflag,
            ModerateRequest::Classify { classification } => {
                ModerationAction::Classify(classification)
            }
            ModerateRequest::Verify => ModerationAction::Verify,
            ModerateRequest::Delete => ModerationAction::Delete,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ModerationResponse {
    pub action: String,
    pub report_id: i32,
    pub deleted: bool,
    /// Report state after the action; absent when it was deleted
    pub report: Option<ReportResponse>,
}

impl ModerationResponse {
    fn new(
        action: &ModerationAction,
        outcome: ModerationOutcome,
        attachments: Vec<AttachmentModel>,
    ) -> Self {
        match outcome {
            ModerationOutcome::Updated(report) => Self {
                action: action.name().to_string(),
                report_id: report.id,
                deleted: false,
                report: Some(ReportResponse::full(report).with_attachments(attachments)),
            },
            ModerationOutcome::Deleted { id, .. } => Self {
                action: action.name().to_string(),
                report_id: id,
                deleted: true,
                report: None,
            },
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEntryResponse {
    pub id: i32,
    pub report_id: i32,
    pub action: String,
    /// Classification value for classify actions
    pub detail: Option<String>,
    pub performed_by: String,
    pub created_at: String,
}

impl From<ReportAuditModel> for AuditEntryResponse {
    fn from(a: ReportAuditModel) -> Self {
        Self {
            id: a.id,
            report_id: a.report_id,
            action: a.action,
            detail: a.detail,
            performed_by: a.performed_by,
            created_at: timestamp(a.created_at),
        }
    }
}

async fn run_action(
    db: DatabaseConnection,
    config: &UploadConfig,
    id: i32,
    action: ModerationAction,
    admin: &AdminUser,
) -> AppResult<ModerationResponse> {
    let service = ModerationService::new(db.clone());
    let outcome = service.moderate(id, action.clone(), admin).await?;

    let attachments = match &outcome {
        ModerationOutcome::Updated(report) => {
            AttachmentService::new(db).for_report(report.id).await?
        }
        ModerationOutcome::Deleted { stored_files, .. } => {
            config.remove_files(stored_files).await;
            Vec::new()
        }
    };

    Ok(ModerationResponse::new(&action, outcome, attachments))
}

#[utoipa::path(
    post,
    path = "/api/v1/admin/reports/{id}/actions",
    security(("admin_basic" = [])),
    params(("id" = i32, Path, description = "Report ID")),
    request_body = ModerateRequest,
    responses(
        (status = 200, description = "Action applied", body = ModerationResponse),
        (status = 400, description = "Unknown action or empty classification", body = AppError),
        (status = 401, description = "Missing or wrong admin credentials", body = AppError),
        (status = 404, description = "Report not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn moderate_report(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<UploadConfig>,
    admin: AdminUser,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<ModerateRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let id = path_param(id)?;
    let action: ModerationAction = json_body(payload)?.into();
    let resp = run_action(db, &config, id, action, &admin).await?;

    let message = if resp.deleted {
        "Report deleted"
    } else {
        "Report updated"
    };
    Ok(ApiResponse::with_message(resp, message.to_string()))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admin/reports/{id}",
    security(("admin_basic" = [])),
    params(("id" = i32, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report deleted", body = ModerationResponse),
        (status = 401, description = "Missing or wrong admin credentials", body = AppError),
        (status = 404, description = "Report not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn delete_report(
    Extension(db): Extension<DatabaseConnection>,
    Extension(config): Extension<UploadConfig>,
    admin: AdminUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let id = path_param(id)?;
    let resp = run_action(db, &config, id, ModerationAction::Delete, &admin).await?;
    Ok(ApiResponse::with_message(resp, "Report deleted".to_string()))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/reports/{id}/audit",
    security(("admin_basic" = [])),
    params(
        ("id" = i32, Path, description = "Report ID"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Moderation history, newest first", body = PaginatedResponse<AuditEntryResponse>),
        (status = 401, description = "Missing or wrong admin credentials", body = AppError),
    ),
    tag = "admin"
)]
pub async fn report_audit_history(
    Extension(db): Extension<DatabaseConnection>,
    _admin: AdminUser,
    id: Result<Path<i32>, PathRejection>,
    params: Result<Query<PaginationQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let id = path_param(id)?;
    let (page, per_page) = query_params(params)?.resolve();

    let service = ModerationService::new(db);
    let (entries, total) = service.audit_history(id, page, per_page).await?;
    let items = entries.into_iter().map(AuditEntryResponse::from).collect();

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}
