use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum ReportAudit {
    Table,
    Id,
    ReportId,
    Action,
    Detail,
    PerformedBy,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReportAudit::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReportAudit::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    // No foreign key: entries must survive a hard delete of the report.
                    .col(ColumnDef::new(ReportAudit::ReportId).integer().not_null())
                    .col(
                        ColumnDef::new(ReportAudit::Action)
                            .string_len(20)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReportAudit::Detail).text().null())
                    .col(ColumnDef::new(ReportAudit::PerformedBy).text().not_null())
                    .col(
                        ColumnDef::new(ReportAudit::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();

        db.execute_unprepared(
            "CREATE INDEX IF NOT EXISTS idx_report_audit_report_created
             ON report_audit (report_id, created_at DESC)",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(
                Table::drop()
                    .table(ReportAudit::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await
    }
}
