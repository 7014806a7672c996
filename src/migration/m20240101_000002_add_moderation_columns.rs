use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Reports {
    Table,
    SuggestedClassification,
    Classification,
    ClassifiedBy,
    ClassifiedOn,
    IsVerified,
    VerifiedBy,
    VerifiedOn,
    IsFlagged,
}

const TABLE: &str = "reports";

/// Moderation columns in the order they are added. Defaults on the NOT NULL
/// columns backfill rows that predate this migration.
fn moderation_columns() -> Vec<(&'static str, ColumnDef)> {
    vec![
        (
            "suggested_classification",
            ColumnDef::new(Reports::SuggestedClassification)
                .text()
                .not_null()
                .default("unclassified")
                .to_owned(),
        ),
        (
            "classification",
            ColumnDef::new(Reports::Classification)
                .text()
                .not_null()
                .default("unclassified")
                .to_owned(),
        ),
        (
            "classified_by",
            ColumnDef::new(Reports::ClassifiedBy).text().null().to_owned(),
        ),
        (
            "classified_on",
            ColumnDef::new(Reports::ClassifiedOn)
                .timestamp()
                .null()
                .to_owned(),
        ),
        (
            "is_verified",
            ColumnDef::new(Reports::IsVerified)
                .boolean()
                .not_null()
                .default(false)
                .to_owned(),
        ),
        (
            "verified_by",
            ColumnDef::new(Reports::VerifiedBy).text().null().to_owned(),
        ),
        (
            "verified_on",
            ColumnDef::new(Reports::VerifiedOn)
                .timestamp()
                .null()
                .to_owned(),
        ),
        (
            "is_flagged",
            ColumnDef::new(Reports::IsFlagged)
                .boolean()
                .not_null()
                .default(false)
                .to_owned(),
        ),
    ]
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (name, column) in moderation_columns() {
            if manager.has_column(TABLE, name).await? {
                tracing::debug!(column = name, "reports column already present, skipping");
                continue;
            }

            manager
                .alter_table(
                    Table::alter()
                        .table(Reports::Table)
                        .add_column_if_not_exists(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for (name, _) in moderation_columns().into_iter().rev() {
            db.execute_unprepared(&format!(
                "ALTER TABLE {TABLE} DROP COLUMN IF EXISTS {name}"
            ))
            .await?;
        }

        Ok(())
    }
}
