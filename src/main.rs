use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use scam_report_hub::{
    config::{self, admin::AdminConfig},
    migration, routes,
    services::{attachment::UploadConfig, credentials::StaticCredentialStore},
    utils,
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::json;
use std::env;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        // Public
        scam_report_hub::handlers::report::submit_report,
        scam_report_hub::handlers::report::search_reports,
        scam_report_hub::handlers::report::get_report,
        scam_report_hub::handlers::attachment::upload_attachment,
        scam_report_hub::handlers::attachment::download_attachment,
        // Admin
        scam_report_hub::handlers::report::admin_list_reports,
        scam_report_hub::handlers::report::admin_get_report,
        scam_report_hub::handlers::moderation::moderate_report,
        scam_report_hub::handlers::moderation::delete_report,
        scam_report_hub::handlers::moderation::report_audit_history,
        scam_report_hub::handlers::attachment::admin_download_attachment,
        scam_report_hub::handlers::admin::get_stats,
    ),
    components(
        schemas(
            scam_report_hub::response::ApiResponse<serde_json::Value>,
            scam_report_hub::response::PaginatedResponse<serde_json::Value>,
            scam_report_hub::response::PaginationQuery,
            scam_report_hub::error::AppError,
            scam_report_hub::models::ReportType,
            // Reports
            scam_report_hub::handlers::report::CreateReportRequest,
            scam_report_hub::handlers::report::ReportResponse,
            scam_report_hub::handlers::report::SearchReportsQuery,
            scam_report_hub::handlers::report::AdminListReportsQuery,
            // Attachments
            scam_report_hub::handlers::attachment::AttachmentUpload,
            scam_report_hub::handlers::attachment::AttachmentResponse,
            // Moderation
            scam_report_hub::handlers::moderation::ModerateRequest,
            scam_report_hub::handlers::moderation::ModerationResponse,
            scam_report_hub::handlers::moderation::AuditEntryResponse,
            scam_report_hub::handlers::admin::StatsResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "reports", description = "Public submission and search"),
        (name = "admin", description = "Moderation operations"),
    )
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_basic",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
            )
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "scam_report_hub=debug,tower_http=debug,axum=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // `scam-report-hub hash-password <secret>` prints a value for ADMIN_PASSWORD_HASH.
    let args: Vec<String> = env::args().skip(1).collect();
    if let [command, secret] = args.as_slice() {
        if command == "hash-password" {
            println!("{}", utils::hash_password(secret)?);
            return Ok(());
        }
    }

    // Validate configuration before doing anything else
    let (admin_config, upload_config) = validate_config().await?;
    let credentials = StaticCredentialStore::shared(&admin_config)?;

    tracing::info!(
        admin = %admin_config.username,
        "Starting scam report hub v{}...",
        env!("CARGO_PKG_VERSION")
    );

    let db = config::database::get_database().await?;
    tracing::info!("Database connected successfully");

    migration::Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied successfully");

    let app = create_app()
        .layer(Extension(db))
        .layer(Extension(credentials))
        .layer(Extension(upload_config));

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Validate all required configuration at startup (fail-fast).
async fn validate_config() -> anyhow::Result<(AdminConfig, UploadConfig)> {
    let admin_config = AdminConfig::from_env()?;

    // DATABASE_URL: checked here for early error; actual connection happens later
    if env::var("DATABASE_URL").is_err() {
        return Err(anyhow::anyhow!(
            "DATABASE_URL environment variable must be set"
        ));
    }

    let upload_config = UploadConfig::from_env();
    upload_config.ensure_dir().await.map_err(|e| {
        anyhow::anyhow!(
            "UPLOAD_DIR {} is not usable: {}",
            upload_config.upload_dir.display(),
            e
        )
    })?;

    Ok((admin_config, upload_config))
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

fn create_app() -> Router {
    Router::new()
        .route("/", get(health_check))
        .merge(routes::create_routes())
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(Extension(db): Extension<DatabaseConnection>) -> impl IntoResponse {
    let db_ok = db
        .query_one(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "Scam Report Hub",
        "version": env!("CARGO_PKG_VERSION"),
        "database": db_ok,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
