use super::{attachment::AttachmentResponse, json_body, path_param, query_params, timestamp};
use crate::error::{AppError, AppResult};
use crate::models::{AttachmentModel, ReportModel, ReportType};
use crate::response::{ApiResponse, PaginatedResponse, PaginationQuery};
use crate::services::attachment::AttachmentService;
use crate::services::credentials::AdminUser;
use crate::services::report::{NewReport, ReportFilter, ReportService};
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
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReportRequest {
    /// Channel the scam arrived through: sms, email or call
    #[validate(length(min = 1, max = 10))]
    pub report_type: String,
    /// Message text or call description (1-10000 characters)
    #[validate(length(min = 1, max = 10000))]
    pub message_content: String,
    /// Sender phone number or email address
    #[validate(length(max = 255))]
    pub source_from: Option<String>,
    /// Email subject or call summary
    #[validate(length(max = 255))]
    pub subject: Option<String>,
    /// When the message or call was received (RFC 3339)
    pub received_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Submitter's guess at the scam category
    #[validate(length(max = 255))]
    pub suggested_classification: Option<String>,
    /// Optional submitter name, visible to administrators only
    #[validate(length(max = 255))]
    pub reporter_name: Option<String>,
    /// Optional submitter contact, visible to administrators only
    #[validate(length(max = 255))]
    pub reporter_contact: Option<String>,
}

impl From<CreateReportRequest> for NewReport {
    fn from(r: CreateReportRequest) -> Self {
        Self {
            report_type: r.report_type,
            message_content: r.message_content,
            source_from: r.source_from,
            subject: r.subject,
            received_at: r.received_at.map(|t| t.naive_utc()),
            reporter_name: r.reporter_name,
            reporter_contact: r.reporter_contact,
            suggested_classification: r.suggested_classification,
        }
    }
}

/// Public search. Flagged reports are never listed here.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct SearchReportsQuery {
    pub report_type: Option<String>,
    pub classification: Option<String>,
    pub verified: Option<bool>,
    pub q: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Admin listing with every filter, including flag state.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct AdminListReportsQuery {
    pub report_type: Option<String>,
    pub flagged: Option<bool>,
    pub classification: Option<String>,
    pub verified: Option<bool>,
    pub q: Option<String>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

/// Empty and "all" both mean no type filter.
fn parse_type_filter(raw: Option<&str>) -> AppResult<Option<ReportType>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(t) if t.eq_ignore_ascii_case("all") => Ok(None),
        Some(t) => t.parse().map(Some),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportResponse {
    /// Report ID
    pub id: i32,
    /// Channel: sms, email or call
    pub report_type: ReportType,
    /// Sender phone number or email address
    pub source_from: Option<String>,
    pub subject: Option<String>,
    pub message_content: String,
    pub received_at: Option<String>,
    pub suggested_classification: String,
    /// Administrator-assigned category
    pub classification: String,
    pub classified_by: Option<String>,
    pub classified_on: Option<String>,
    pub is_verified: bool,
    pub verified_by: Option<String>,
    pub verified_on: Option<String>,
    pub is_flagged: bool,
    /// Submission timestamp
    pub created_at: String,
    pub updated_at: String,
    /// Present in admin responses only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter_name: Option<String>,
    /// Present in admin responses only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporter_contact: Option<String>,
    /// Evidence files, oldest first
    pub attachments: Vec<AttachmentResponse>,
}

impl ReportResponse {
    /// Everything except who submitted the report.
    pub fn public(r: ReportModel) -> Self {
        let mut resp = Self::full(r);
        resp.reporter_name = None;
        resp.reporter_contact = None;
        resp
    }

    pub fn full(r: ReportModel) -> Self {
        Self {
            id: r.id,
            report_type: r.report_type,
            source_from: r.source_from,
            subject: r.subject,
            message_content: r.message_content,
            received_at: r.received_at.map(timestamp),
            suggested_classification: r.suggested_classification,
            classification: r.classification,
            classified_by: r.classified_by,
            classified_on: r.classified_on.map(timestamp),
            is_verified: r.is_verified,
            verified_by: r.verified_by,
            verified_on: r.verified_on.map(timestamp),
            is_flagged: r.is_flagged,
            created_at: timestamp(r.created_at),
            updated_at: timestamp(r.updated_at),
            reporter_name: r.reporter_name,
            reporter_contact: r.reporter_contact,
            attachments: Vec::new(),
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<AttachmentModel>) -> Self {
        self.attachments = attachments.into_iter().map(Into::into).collect();
        self
    }
}

/// Render reports with their attachments, loaded in one query.
pub(crate) async fn with_attachments(
    db: DatabaseConnection,
    reports: Vec<ReportModel>,
    render: fn(ReportModel) -> ReportResponse,
) -> AppResult<Vec<ReportResponse>> {
    let ids: Vec<i32> = reports.iter().map(|r| r.id).collect();
    let mut files = AttachmentService::new(db).list_for_reports(&ids).await?;

    Ok(reports
        .into_iter()
        .map(|r| {
            let attachments = files.remove(&r.id).unwrap_or_default();
            render(r).with_attachments(attachments)
        })
        .collect())
}

#[utoipa::path(
    post,
    path = "/api/v1/reports",
    request_body = CreateReportRequest,
    responses(
        (status = 200, description = "Report submitted", body = ReportResponse),
        (status = 400, description = "Validation error", body = AppError),
    ),
    tag = "reports"
)]
pub async fn submit_report(
    Extension(db): Extension<DatabaseConnection>,
    payload: Result<Json<CreateReportRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let payload = json_body(payload)?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let service = ReportService::new(db);
    let report = service.submit(payload.into()).await?;

    Ok(ApiResponse::ok(ReportResponse::public(report)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports",
    params(
        ("report_type" = Option<String>, Query, description = "sms, email, call or all"),
        ("classification" = Option<String>, Query, description = "Exact classification"),
        ("verified" = Option<bool>, Query, description = "Only verified (true) or unverified (false)"),
        ("q" = Option<String>, Query, description = "Text search over content, sender and subject"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Matching reports, newest first", body = PaginatedResponse<ReportResponse>),
        (status = 400, description = "Validation error", body = AppError),
    ),
    tag = "reports"
)]
pub async fn search_reports(
    Extension(db): Extension<DatabaseConnection>,
    params: Result<Query<SearchReportsQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let params = query_params(params)?;
    let (page, per_page) = PaginationQuery {
        page: params.page,
        per_page: params.per_page,
    }
    .resolve();

    let filter = ReportFilter {
        report_type: parse_type_filter(params.report_type.as_deref())?,
        flagged: Some(false),
        verified: params.verified,
        classification: params.classification,
        search: params.q,
    };

    let service = ReportService::new(db.clone());
    let (reports, total) = service.list(&filter, page, per_page).await?;
    let items = with_attachments(db, reports, ReportResponse::public).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/{id}",
    params(("id" = i32, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report", body = ReportResponse),
        (status = 404, description = "Not found or held for moderation", body = AppError),
    ),
    tag = "reports"
)]
pub async fn get_report(
    Extension(db): Extension<DatabaseConnection>,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let id = path_param(id)?;
    let service = ReportService::new(db.clone());
    let report = service.get(id).await?;

    if report.is_flagged {
        return Err(AppError::NotFound);
    }

    let attachments = AttachmentService::new(db).for_report(report.id).await?;
    Ok(ApiResponse::ok(
        ReportResponse::public(report).with_attachments(attachments),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/reports",
    security(("admin_basic" = [])),
    params(
        ("report_type" = Option<String>, Query, description = "sms, email, call or all"),
        ("flagged" = Option<bool>, Query, description = "Only flagged (true) or unflagged (false)"),
        ("classification" = Option<String>, Query, description = "Exact classification"),
        ("verified" = Option<bool>, Query, description = "Only verified (true) or unverified (false)"),
        ("q" = Option<String>, Query, description = "Text search over content, sender and subject"),
        ("page" = Option<u64>, Query, description = "Page number"),
        ("per_page" = Option<u64>, Query, description = "Items per page"),
    ),
    responses(
        (status = 200, description = "Matching reports, newest first", body = PaginatedResponse<ReportResponse>),
        (status = 400, description = "Validation error", body = AppError),
        (status = 401, description = "Missing or wrong admin credentials", body = AppError),
    ),
    tag = "admin"
)]
pub async fn admin_list_reports(
    Extension(db): Extension<DatabaseConnection>,
    _admin: AdminUser,
    params: Result<Query<AdminListReportsQuery>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let params = query_params(params)?;
    let (page, per_page) = PaginationQuery {
        page: params.page,
        per_page: params.per_page,
    }
    .resolve();

    let filter = ReportFilter {
        report_type: parse_type_filter(params.report_type.as_deref())?,
        flagged: params.flagged,
        verified: params.verified,
        classification: params.classification,
        search: params.q,
    };

    let service = ReportService::new(db.clone());
    let (reports, total) = service.list(&filter, page, per_page).await?;
    let items = with_attachments(db, reports, ReportResponse::full).await?;

    Ok(ApiResponse::ok(PaginatedResponse::new(
        items, total, page, per_page,
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/reports/{id}",
    security(("admin_basic" = [])),
    params(("id" = i32, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report", body = ReportResponse),
        (status = 401, description = "Missing or wrong admin credentials", body = AppError),
        (status = 404, description = "Not found", body = AppError),
    ),
    tag = "admin"
)]
pub async fn admin_get_report(
    Extension(db): Extension<DatabaseConnection>,
    _admin: AdminUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<impl IntoResponse> {
    let id = path_param(id)?;
    let service = ReportService::new(db.clone());
    let report = service.get(id).await?;

    let attachments = AttachmentService::new(db).for_report(report.id).await?;
    Ok(ApiResponse::ok(
        ReportResponse::full(report).with_attachments(attachments),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_filter_accepts_all_and_blank() {
        assert_eq!(parse_type_filter(None).unwrap(), None);
        assert_eq!(parse_type_filter(Some(" ")).unwrap(), None);
        assert_eq!(parse_type_filter(Some("ALL")).unwrap(), None);
        assert_eq!(
            parse_type_filter(Some("call")).unwrap(),
            Some(ReportType::Call)
        );
        assert!(parse_type_filter(Some("pager")).is_err());
    }

    #[test]
    fn public_response_hides_reporter() {
        let now = chrono::Utc::now().naive_utc();
        let model = ReportModel {
            id: 1,
            report_type: ReportType::Email,
            source_from: Some("prize@example.com".into()),
            subject: Some("You won".into()),
            message_content: "Claim now".into(),
            received_at: None,
            reporter_name: Some("Alex".into()),
            reporter_contact: Some("alex@example.org".into()),
            suggested_classification: "phishing".into(),
            classification: "unclassified".into(),
            classified_by: None,
            classified_on: None,
            is_verified: false,
            verified_by: None,
            verified_on: None,
            is_flagged: false,
            created_at: now,
            updated_at: now,
        };

        let public = serde_json::to_value(ReportResponse::public(model.clone())).unwrap();
        assert!(public.get("reporter_name").is_none());
        assert!(public.get("reporter_contact").is_none());
        assert_eq!(public["report_type"], "email");
        assert_eq!(public["attachments"], serde_json::json!([]));

        let full = serde_json::to_value(ReportResponse::full(model)).unwrap();
        assert_eq!(full["reporter_name"], "Alex");
    }

    #[test]
    fn request_converts_received_at_to_utc() {
        let req: CreateReportRequest = serde_json::from_value(serde_json::json!({
            "report_type": "call",
            "message_content": "Your bank account is locked",
            "received_at": "2024-05-01T10:00:00+02:00"
        }))
        .unwrap();

        let input = NewReport::from(req);
        assert_eq!(
            input.received_at.unwrap().to_string(),
            "2024-05-01 08:00:00"
        );
    }
}
