use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Evidence file stored on disk under `storage_name`. Rows go away with their
/// report through `ON DELETE CASCADE`; the file itself is removed by the
/// delete path.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "attachments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub report_id: i32,
    /// Sanitized client file name, used for `Content-Disposition`.
    #[sea_orm(column_type = "Text")]
    pub original_name: String,
    #[sea_orm(column_type = "Text")]
    pub storage_name: String,
    #[sea_orm(column_type = "String(StringLen::N(100))")]
    pub mime_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::report::Entity",
        from = "Column::ReportId",
        to = "super::report::Column::Id",
        on_delete = "Cascade"
    )]
    Report,
}

impl Related<super::report::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Report.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
