use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::services::credentials::AdminUser;
use crate::services::report::ReportService;
use axum::{response::IntoResponse, Extension};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    pub total_reports: u64,
    pub flagged_reports: u64,
    pub verified_reports: u64,
    pub unclassified_reports: u64,
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/stats",
    security(("admin_basic" = [])),
    responses(
        (status = 200, description = "Report counts", body = StatsResponse),
        (status = 401, description = "Missing or wrong admin credentials", body = AppError),
    ),
    tag = "admin"
)]
pub async fn get_stats(
    Extension(db): Extension<DatabaseConnection>,
    _admin: AdminUser,
) -> AppResult<impl IntoResponse> {
    let service = ReportService::new(db);
    let stats = service.stats().await?;

    Ok(ApiResponse::ok(StatsResponse {
        total_reports: stats.total,
        flagged_reports: stats.flagged,
        verified_reports: stats.verified,
        unclassified_reports: stats.unclassified,
    }))
}
