#![allow(dead_code)]

use reqwest::{Client, RequestBuilder};
use scam_report_hub::{
    config::admin::AdminConfig,
    services::{attachment::UploadConfig, credentials::StaticCredentialStore},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Statement};
use sea_orm_migration::MigratorTrait;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, MutexGuard, Once,
};

pub const ADMIN_USER: &str = "moderator";
pub const ADMIN_PASSWORD: &str = "integration-test-admin-secret";

static INIT: Once = Once::new();
static MIGRATIONS_RAN: AtomicBool = AtomicBool::new(false);
// Tests in one binary share the database; each holds this while it runs.
static DB_LOCK: Mutex<()> = Mutex::new(());

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        std::env::set_var("ADMIN_USER", ADMIN_USER);
        std::env::set_var("ADMIN_PASSWORD", ADMIN_PASSWORD);
        std::env::remove_var("ADMIN_PASSWORD_HASH");
        std::env::set_var("RATE_LIMIT_ENABLED", "false");
        let upload_dir = std::env::temp_dir().join(format!("scam-report-hub-{}", std::process::id()));
        std::env::set_var("UPLOAD_DIR", upload_dir);
    });
}

pub struct TestApp {
    pub addr: String,
    pub db: DatabaseConnection,
    pub client: Client,
    pub uploads: UploadConfig,
    _guard: MutexGuard<'static, ()>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.addr, path)
    }

    /// Request with the configured admin credential attached.
    pub fn admin(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(ADMIN_USER, Some(ADMIN_PASSWORD))
    }
}

pub async fn connect_test_db() -> DatabaseConnection {
    init_env();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"));

    sea_orm::Database::connect(&database_url)
        .await
        .expect("Failed to connect to test database")
}

pub async fn spawn_app() -> TestApp {
    let guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let db = connect_test_db().await;

    // Run migrations only once per test binary
    if !MIGRATIONS_RAN.swap(true, Ordering::SeqCst) {
        scam_report_hub::migration::Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");
    }

    cleanup_tables(&db).await;

    let admin_config = AdminConfig::from_env().expect("admin config");
    let credentials = StaticCredentialStore::shared(&admin_config).expect("credential store");
    let uploads = UploadConfig::from_env();
    uploads.ensure_dir().await.expect("Failed to create upload dir");

    let app = axum::Router::new()
        .route("/", axum::routing::get(|| async { "ok" }))
        .merge(scam_report_hub::routes::create_routes())
        .layer(axum::extract::Extension(db.clone()))
        .layer(axum::extract::Extension(credentials))
        .layer(axum::extract::Extension(uploads.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        db,
        client: Client::new(),
        uploads,
        _guard: guard,
    }
}

async fn cleanup_tables(db: &DatabaseConnection) {
    for table in ["attachments", "report_audit", "reports"] {
        let sql = format!("TRUNCATE TABLE {} RESTART IDENTITY CASCADE", table);
        let _ = db
            .execute(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                sql,
            ))
            .await;
    }
}

/// Submit a report and return its id.
pub async fn submit_report(app: &TestApp, body: Value) -> i64 {
    let resp = app
        .client
        .post(app.url("/reports"))
        .json(&body)
        .send()
        .await
        .expect("Failed to submit report");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse response");
    if !body["success"].as_bool().unwrap_or(false) {
        panic!("Failed to submit report: status={}, body={}", status, body);
    }

    body["data"]["id"]
        .as_i64()
        .expect("Response missing id field")
}

pub async fn submit_sms(app: &TestApp, content: &str) -> i64 {
    submit_report(
        app,
        serde_json::json!({
            "report_type": "sms",
            "message_content": content,
            "source_from": "+1234567890"
        }),
    )
    .await
}

/// Apply a moderation action as the admin and return the response body.
pub async fn moderate(app: &TestApp, id: i64, action: Value) -> (u16, Value) {
    let resp = app
        .admin(
            reqwest::Method::POST,
            &format!("/admin/reports/{}/actions", id),
        )
        .json(&action)
        .send()
        .await
        .expect("Failed to send moderation request");

    let status = resp.status().as_u16();
    let body: Value = resp.json().await.expect("Failed to parse response");
    (status, body)
}

/// Fetch a report through the admin lookup.
pub async fn admin_get(app: &TestApp, id: i64) -> (u16, Value) {
    let resp = app
        .admin(reqwest::Method::GET, &format!("/admin/reports/{}", id))
        .send()
        .await
        .expect("Failed to fetch report");

    let status = resp.status().as_u16();
    let body: Value = resp.json().await.expect("Failed to parse response");
    (status, body)
}
