use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

const TABLE: &str = "reports";

/// `(name, columns)` of each index; the flagged index backs the moderation
/// queue, the rest back the list filters and default ordering.
const INDEXES: [(&str, &str); 3] = [
    ("idx_reports_is_flagged", "is_flagged"),
    ("idx_reports_classification", "classification"),
    ("idx_reports_created_at", "created_at DESC, id DESC"),
];

/// `(name, predicate)` of each CHECK constraint on `reports`.
const CHECKS: [(&str, &str); 3] = [
    (
        "chk_reports_report_type",
        "report_type IN ('sms', 'email', 'call')",
    ),
    (
        "chk_reports_classified_pair",
        "(classified_by IS NULL) = (classified_on IS NULL)",
    ),
    (
        "chk_reports_verified_pair",
        "(verified_by IS NULL) = (verified_on IS NULL)",
    ),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for (name, columns) in INDEXES {
            if manager.has_index(TABLE, name).await? {
                continue;
            }
            db.execute_unprepared(&format!(
                "CREATE INDEX IF NOT EXISTS {name} ON {TABLE} ({columns})"
            ))
            .await?;
        }

        // Postgres has no ADD CONSTRAINT IF NOT EXISTS; look it up first.
        for (name, predicate) in CHECKS {
            db.execute_unprepared(&format!(
                "DO $$
                 BEGIN
                     IF NOT EXISTS (
                         SELECT 1 FROM pg_constraint
                         WHERE conname = '{name}' AND conrelid = '{TABLE}'::regclass
                     ) THEN
                         ALTER TABLE {TABLE} ADD CONSTRAINT {name} CHECK ({predicate});
                     END IF;
                 END
                 $$"
            ))
            .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        for (name, _) in CHECKS {
            db.execute_unprepared(&format!(
                "ALTER TABLE {TABLE} DROP CONSTRAINT IF EXISTS {name}"
            ))
            .await?;
        }

        for (name, _) in INDEXES {
            db.execute_unprepared(&format!("DROP INDEX IF EXISTS {name}"))
                .await?;
        }

        Ok(())
    }
}
