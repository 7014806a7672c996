use crate::{
    error::{AppError, AppResult},
    models::{report, Report, ReportModel, ReportType, UNCLASSIFIED},
    response::page_index,
};
use chrono::NaiveDateTime;
use sea_orm::{
    sea_query::{Expr, Func, LikeExpr},
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};

pub const MAX_CONTENT_LEN: usize = 10_000;
pub const MAX_FIELD_LEN: usize = 255;

/// Raw submission input, validated by [`NewReport::into_active_model`].
#[derive(Debug, Clone, Default)]
pub struct NewReport {
    pub report_type: String,
    pub message_content: String,
    pub source_from: Option<String>,
    pub subject: Option<String>,
    pub received_at: Option<NaiveDateTime>,
    pub reporter_name: Option<String>,
    pub reporter_contact: Option<String>,
    pub suggested_classification: Option<String>,
}

impl NewReport {
    /// Validate and build the row to insert. Moderation fields always start
    /// at their defaults regardless of input.
    pub fn into_active_model(self, now: NaiveDateTime) -> AppResult<report::ActiveModel> {
        let report_type: ReportType = self.report_type.parse()?;

        let message_content = self.message_content.trim().to_string();
        reject_nul("message_content", &message_content)?;
        if message_content.is_empty() {
            return Err(AppError::Validation(
                "message_content must not be empty".to_string(),
            ));
        }
        if message_content.chars().count() > MAX_CONTENT_LEN {
            return Err(AppError::Validation(format!(
                "message_content must be at most {} characters",
                MAX_CONTENT_LEN
            )));
        }

        let source_from = optional_field("source_from", self.source_from)?;
        let subject = optional_field("subject", self.subject)?;
        let reporter_name = optional_field("reporter_name", self.reporter_name)?;
        let reporter_contact = optional_field("reporter_contact", self.reporter_contact)?;
        let suggested_classification =
            optional_field("suggested_classification", self.suggested_classification)?
                .unwrap_or_else(|| UNCLASSIFIED.to_string());

        Ok(report::ActiveModel {
            report_type: Set(report_type),
            source_from: Set(source_from),
            subject: Set(subject),
            message_content: Set(message_content),
            received_at: Set(self.received_at),
            reporter_name: Set(reporter_name),
            reporter_contact: Set(reporter_contact),
            suggested_classification: Set(suggested_classification),
            classification: Set(UNCLASSIFIED.to_string()),
            classified_by: Set(None),
            classified_on: Set(None),
            is_verified: Set(false),
            verified_by: Set(None),
            verified_on: Set(None),
            is_flagged: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        })
    }
}

/// Blank optional strings are stored as NULL.
fn optional_field(name: &str, value: Option<String>) -> AppResult<Option<String>> {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) if v.chars().count() > MAX_FIELD_LEN => Err(AppError::Validation(format!(
            "{} must be at most {} characters",
            name, MAX_FIELD_LEN
        ))),
        Some(v) => {
            reject_nul(name, &v)?;
            Ok(Some(v))
        }
        None => Ok(None),
    }
}

/// Postgres text columns cannot hold NUL, so it is rejected up front.
pub fn reject_nul(name: &str, value: &str) -> AppResult<()> {
    if value.contains('\0') {
        return Err(AppError::Validation(format!(
            "{} must not contain NUL characters",
            name
        )));
    }
    Ok(())
}

/// List filters; every populated field narrows the result (AND).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilter {
    pub report_type: Option<ReportType>,
    /// `Some(true)`: flagged only, `Some(false)`: unflagged only.
    pub flagged: Option<bool>,
    pub verified: Option<bool>,
    pub classification: Option<String>,
    /// Case-insensitive substring over content, sender and subject.
    pub search: Option<String>,
}

impl ReportFilter {
    /// Reject filter values the database cannot compare against.
    pub fn validate(&self) -> AppResult<()> {
        if let Some(classification) = &self.classification {
            reject_nul("classification", classification)?;
        }
        if let Some(q) = &self.search {
            reject_nul("q", q)?;
        }
        Ok(())
    }

    pub fn condition(&self) -> Condition {
        let mut cond = Condition::all();

        if let Some(report_type) = self.report_type {
            cond = cond.add(report::Column::ReportType.eq(report_type));
        }
        if let Some(flagged) = self.flagged {
            cond = cond.add(report::Column::IsFlagged.eq(flagged));
        }
        if let Some(verified) = self.verified {
            cond = cond.add(report::Column::IsVerified.eq(verified));
        }
        if let Some(classification) = non_blank(self.classification.as_deref()) {
            cond = cond.add(report::Column::Classification.eq(classification));
        }
        if let Some(q) = non_blank(self.search.as_deref()) {
            let pattern = format!("%{}%", escape_like(&q.to_lowercase()));
            let mut any = Condition::any();
            for column in [
                report::Column::MessageContent,
                report::Column::SourceFrom,
                report::Column::Subject,
            ] {
                any = any.add(
                    Expr::expr(Func::lower(Expr::col((report::Entity, column))))
                        .like(LikeExpr::new(pattern.clone()).escape('\\')),
                );
            }
            cond = cond.add(any);
        }

        cond
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Escape LIKE metacharacters so user input only ever matches literally.
pub fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub struct ReportStats {
    pub total: u64,
    pub flagged: u64,
    pub verified: u64,
    pub unclassified: u64,
}

pub struct ReportService {
    db: DatabaseConnection,
}

impl ReportService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn submit(&self, input: NewReport) -> AppResult<ReportModel> {
        let now = chrono::Utc::now().naive_utc();
        let model = input.into_active_model(now)?;

        let saved = model.insert(&self.db).await?;
        tracing::info!(
            report_id = saved.id,
            report_type = saved.report_type.as_str(),
            "Report submitted"
        );
        Ok(saved)
    }

    pub async fn get(&self, id: i32) -> AppResult<ReportModel> {
        Report::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Most recent first; `page` is 1-based.
    pub async fn list(
        &self,
        filter: &ReportFilter,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<ReportModel>, u64)> {
        filter.validate()?;
        let index = page_index(page, per_page)?;
        let paginator = Report::find()
            .filter(filter.condition())
            .order_by_desc(report::Column::CreatedAt)
            .order_by_desc(report::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let reports = paginator.fetch_page(index).await?;
        Ok((reports, total))
    }

    pub async fn stats(&self) -> AppResult<ReportStats> {
        let total = Report::find().count(&self.db).await?;
        let flagged = Report::find()
            .filter(report::Column::IsFlagged.eq(true))
            .count(&self.db)
            .await?;
        let verified = Report::find()
            .filter(report::Column::IsVerified.eq(true))
            .count(&self.db)
            .await?;
        let unclassified = Report::find()
            .filter(report::Column::Classification.eq(UNCLASSIFIED))
            .count(&self.db)
            .await?;

        Ok(ReportStats {
            total,
            flagged,
            verified,
            unclassified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn submission() -> NewReport {
        NewReport {
            report_type: "sms".into(),
            message_content: "Win a prize!".into(),
            source_from: Some("+1234567890".into()),
            ..Default::default()
        }
    }

    #[test]
    fn valid_submission_gets_default_moderation_state() {
        let active = submission().into_active_model(now()).unwrap();

        assert_eq!(active.report_type.clone().unwrap(), ReportType::Sms);
        assert_eq!(active.classification.clone().unwrap(), UNCLASSIFIED);
        assert_eq!(active.suggested_classification.clone().unwrap(), UNCLASSIFIED);
        assert!(!active.is_flagged.clone().unwrap());
        assert!(!active.is_verified.clone().unwrap());
        assert_eq!(active.classified_by.clone().unwrap(), None);
        assert_eq!(active.classified_on.clone().unwrap(), None);
        assert_eq!(active.verified_by.clone().unwrap(), None);
        assert_eq!(active.verified_on.clone().unwrap(), None);
        assert_eq!(active.created_at.clone().unwrap(), now());
        assert!(!active.id.is_set());
    }

    #[test]
    fn suggested_classification_is_kept() {
        let mut input = submission();
        input.suggested_classification = Some("  phishing ".into());
        let active = input.into_active_model(now()).unwrap();
        assert_eq!(active.suggested_classification.unwrap(), "phishing");
        assert_eq!(active.classification.unwrap(), UNCLASSIFIED);
    }

    #[test]
    fn blank_optional_fields_become_null() {
        let mut input = submission();
        input.source_from = Some("   ".into());
        input.subject = Some(String::new());
        input.suggested_classification = Some(" ".into());
        let active = input.into_active_model(now()).unwrap();
        assert_eq!(active.source_from.unwrap(), None);
        assert_eq!(active.subject.unwrap(), None);
        assert_eq!(active.suggested_classification.unwrap(), UNCLASSIFIED);
    }

    #[test]
    fn invalid_type_is_rejected() {
        let mut input = submission();
        input.report_type = "letter".into();
        assert!(matches!(
            input.into_active_model(now()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn empty_content_is_rejected() {
        let mut input = submission();
        input.message_content = " \n\t ".into();
        let err = input.into_active_model(now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("message_content")));
    }

    #[test]
    fn oversized_fields_are_rejected() {
        let mut input = submission();
        input.message_content = "x".repeat(MAX_CONTENT_LEN + 1);
        assert!(input.into_active_model(now()).is_err());

        let mut input = submission();
        input.source_from = Some("9".repeat(MAX_FIELD_LEN + 1));
        let err = input.into_active_model(now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("source_from")));
    }

    #[test]
    fn nul_bytes_are_rejected_in_every_text_field() {
        let mut input = submission();
        input.message_content = "Win\0 a prize".into();
        let err = input.into_active_model(now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("message_content")));

        let fields: [(&str, fn(&mut NewReport, Option<String>)); 5] = [
            ("source_from", |r, v| r.source_from = v),
            ("subject", |r, v| r.subject = v),
            ("reporter_name", |r, v| r.reporter_name = v),
            ("reporter_contact", |r, v| r.reporter_contact = v),
            ("suggested_classification", |r, v| r.suggested_classification = v),
        ];
        for (field, set) in fields {
            let mut input = submission();
            set(&mut input, Some("bad\0value".to_string()));
            let err = input.into_active_model(now()).unwrap_err();
            assert!(
                matches!(&err, AppError::Validation(msg) if msg.contains(field)),
                "{}: {:?}",
                field,
                err
            );
        }
    }

    #[test]
    fn filter_with_nul_is_invalid() {
        let search = ReportFilter {
            search: Some("\0".into()),
            ..Default::default()
        };
        assert!(matches!(search.validate(), Err(AppError::Validation(_))));

        let classification = ReportFilter {
            classification: Some("phish\0ing".into()),
            ..Default::default()
        };
        assert!(classification.validate().is_err());

        let fine = ReportFilter {
            search: Some("prize".into()),
            classification: Some("phishing".into()),
            ..Default::default()
        };
        assert!(fine.validate().is_ok());
    }

    #[test]
    fn escape_like_escapes_metacharacters() {
        assert_eq!(escape_like("100%_off\\"), "100\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    fn sql_for(filter: &ReportFilter) -> String {
        Report::find()
            .filter(filter.condition())
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn filters_combine_conjunctively() {
        let sql = sql_for(&ReportFilter {
            report_type: Some(ReportType::Email),
            flagged: Some(true),
            verified: Some(false),
            classification: Some("phishing".into()),
            search: None,
        });

        assert!(sql.contains("\"report_type\""));
        assert!(sql.contains("\"is_flagged\""));
        assert!(sql.contains("\"is_verified\""));
        assert!(sql.contains("'phishing'"));
        assert_eq!(sql.matches(" AND ").count(), 3);
    }

    #[test]
    fn search_covers_content_sender_and_subject() {
        let sql = sql_for(&ReportFilter {
            search: Some(" Prize ".into()),
            ..Default::default()
        });

        assert!(sql.contains("LOWER(\"reports\".\"message_content\")"));
        assert!(sql.contains("LOWER(\"reports\".\"source_from\")"));
        assert!(sql.contains("LOWER(\"reports\".\"subject\")"));
        assert!(sql.contains("'%prize%'"));
        assert_eq!(sql.matches(" OR ").count(), 2);
    }

    #[test]
    fn blank_search_and_classification_are_ignored() {
        let sql = sql_for(&ReportFilter {
            search: Some("   ".into()),
            classification: Some("".into()),
            ..Default::default()
        });
        assert!(!sql.contains("LIKE"));
        assert!(!sql.contains("\"classification\" ="));
    }
}
