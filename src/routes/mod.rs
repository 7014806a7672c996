use crate::config::rate_limit::RateLimitConfig;
use crate::handlers;
use crate::middleware::admin::admin_auth_middleware;
use crate::services::attachment::MAX_UPLOAD_BODY;
use axum::{extract::DefaultBodyLimit, middleware, routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

/// Route groups that each get their own rate-limit bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteGroup {
    /// Anonymous writes: report submission and attachment upload.
    Submit,
    /// Public search, lookup and attachment download.
    PublicRead,
    /// Everything under `/admin`.
    Admin,
}

impl RouteGroup {
    pub const ALL: [RouteGroup; 3] = [RouteGroup::Submit, RouteGroup::PublicRead, RouteGroup::Admin];

    /// Name used in `RATE_LIMIT_CONFIG` overrides.
    pub fn name(self) -> &'static str {
        match self {
            RouteGroup::Submit => "submit",
            RouteGroup::PublicRead => "public",
            RouteGroup::Admin => "admin",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|group| group.name().eq_ignore_ascii_case(name))
    }
}

pub fn create_routes() -> Router {
    Router::new().nest("/api/v1", api_routes())
}

fn api_routes() -> Router {
    let rate_limit_config = RateLimitConfig::from_env();

    let submit = submit_routes(&rate_limit_config);
    let public_read = public_read_routes(&rate_limit_config);
    let admin =
        admin_routes(&rate_limit_config).layer(middleware::from_fn(admin_auth_middleware));

    submit.merge(public_read).merge(admin)
}

/// Anonymous report submission and evidence upload.
fn submit_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/reports", routing::post(handlers::report::submit_report))
        .route(
            "/reports/{id}/attachments",
            routing::post(handlers::attachment::upload_attachment)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY)),
        );

    with_optional_rate_limit(router, config, RouteGroup::Submit)
}

/// Public search and lookup. Flagged reports are hidden here.
fn public_read_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/reports", routing::get(handlers::report::search_reports))
        .route("/reports/{id}", routing::get(handlers::report::get_report))
        .route(
            "/reports/{id}/attachments/{attachment_id}",
            routing::get(handlers::attachment::download_attachment),
        );

    with_optional_rate_limit(router, config, RouteGroup::PublicRead)
}

/// Moderation surface; every route requires the admin credential.
fn admin_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/admin/stats", routing::get(handlers::admin::get_stats))
        .route(
            "/admin/reports",
            routing::get(handlers::report::admin_list_reports),
        )
        .route(
            "/admin/reports/{id}",
            routing::get(handlers::report::admin_get_report)
                .delete(handlers::moderation::delete_report),
        )
        .route(
            "/admin/reports/{id}/actions",
            routing::post(handlers::moderation::moderate_report),
        )
        .route(
            "/admin/reports/{id}/audit",
            routing::get(handlers::moderation::report_audit_history),
        )
        .route(
            "/admin/reports/{id}/attachments/{attachment_id}",
            routing::get(handlers::attachment::admin_download_attachment),
        );

    with_optional_rate_limit(router, config, RouteGroup::Admin)
}

fn with_optional_rate_limit(router: Router, config: &RateLimitConfig, group: RouteGroup) -> Router {
    if !config.enabled {
        return router;
    }

    let rule = config.rule(group);
    let Some(governor_conf) = GovernorConfigBuilder::default()
        .per_second(rule.per_second)
        .burst_size(rule.burst_size)
        .finish()
    else {
        tracing::warn!(
            group = group.name(),
            ?rule,
            "Invalid rate limit rule, serving without a limit"
        );
        return router;
    };

    router.layer(GovernorLayer::new(governor_conf))
}
