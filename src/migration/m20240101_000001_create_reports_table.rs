use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Reports {
    Table,
    Id,
    ReportType,
    SourceFrom,
    Subject,
    MessageContent,
    ReceivedAt,
    ReporterName,
    ReporterContact,
    CreatedAt,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reports::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Reports::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Reports::ReportType)
                            .string_len(10)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Reports::SourceFrom).text().null())
                    .col(ColumnDef::new(Reports::Subject).text().null())
                    .col(ColumnDef::new(Reports::MessageContent).text().not_null())
                    .col(ColumnDef::new(Reports::ReceivedAt).timestamp().null())
                    .col(ColumnDef::new(Reports::ReporterName).text().null())
                    .col(ColumnDef::new(Reports::ReporterContact).text().null())
                    .col(
                        ColumnDef::new(Reports::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Reports::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_reports_report_type")
                    .table(Reports::Table)
                    .col(Reports::ReportType)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reports::Table).if_exists().to_owned())
            .await
    }
}
