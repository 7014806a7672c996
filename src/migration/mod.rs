use sea_orm_migration::prelude::*;

mod m20240101_000001_create_reports_table;
mod m20240101_000002_add_moderation_columns;
mod m20240101_000003_add_moderation_indexes;
mod m20240101_000004_create_report_audit_table;
mod m20240101_000005_create_attachments_table;

/// Every step checks current schema state before changing it, so `up` can be
/// re-run against a live database (including one created by older tooling
/// that already has some of these columns).
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_reports_table::Migration),
            Box::new(m20240101_000002_add_moderation_columns::Migration),
            Box::new(m20240101_000003_add_moderation_indexes::Migration),
            Box::new(m20240101_000004_create_report_audit_table::Migration),
            Box::new(m20240101_000005_create_attachments_table::Migration),
        ]
    }
}
