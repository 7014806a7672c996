use crate::error::AppError;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;

/// Default for both `classification` and `suggested_classification`.
pub const UNCLASSIFIED: &str = "unclassified";

/// Channel the scam arrived through.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[sea_orm(string_value = "sms")]
    Sms,
    #[sea_orm(string_value = "email")]
    Email,
    #[sea_orm(string_value = "call")]
    Call,
}

impl ReportType {
    pub const ALL: [ReportType; 3] = [ReportType::Sms, ReportType::Email, ReportType::Call];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Sms => "sms",
            ReportType::Email => "email",
            ReportType::Call => "call",
        }
    }
}

impl FromStr for ReportType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sms" => Ok(ReportType::Sms),
            "email" => Ok(ReportType::Email),
            "call" => Ok(ReportType::Call),
            _ => Err(AppError::Validation(format!(
                "report_type must be one of: {} (got '{}')",
                ReportType::ALL.map(|t| t.as_str()).join(", "),
                s.trim()
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "reports")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub report_type: ReportType,
    /// Phone number or email address the scam came from
    #[sea_orm(column_type = "Text", nullable)]
    pub source_from: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub subject: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub message_content: String,
    pub received_at: Option<DateTime>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reporter_name: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub reporter_contact: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub suggested_classification: String,
    #[sea_orm(column_type = "Text")]
    pub classification: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub classified_by: Option<String>,
    pub classified_on: Option<DateTime>,
    pub is_verified: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub verified_by: Option<String>,
    pub verified_on: Option<DateTime>,
    pub is_flagged: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Model {
    /// Attribution columns come in pairs: an identity without a timestamp
    /// (or the reverse) is a corrupt row.
    pub fn attribution_consistent(&self) -> bool {
        self.classified_by.is_some() == self.classified_on.is_some()
            && self.verified_by.is_some() == self.verified_on.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
