//! Moderation state machine over a report's flag, classification and
//! verification fields.
//!
//! Every action runs in one transaction together with its audit entry, and
//! only the columns an action owns are written, so concurrent actions on the
//! same report overwrite each other per column (last writer wins).

use crate::{
    error::{AppError, AppResult},
    models::{
        attachment, report, report_audit, Attachment, Report, ReportAudit, ReportAuditModel,
        ReportModel,
    },
    response::page_index,
    services::{credentials::AdminUser, report::reject_nul},
};
use chrono::NaiveDateTime;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationAction {
    Flag,
    Unflag,
    Classify(String),
    Verify,
    Delete,
}

impl ModerationAction {
    /// Name recorded in the audit table.
    pub fn name(&self) -> &'static str {
        match self {
            ModerationAction::Flag => "flag",
            ModerationAction::Unflag => "unflag",
            ModerationAction::Classify(_) => "classify",
            ModerationAction::Verify => "verify",
            ModerationAction::Delete => "delete",
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            ModerationAction::Classify(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// Reject malformed actions before anything touches the database.
    pub fn normalize(self) -> AppResult<Self> {
        match self {
            ModerationAction::Classify(value) => {
                let value = value.trim();
                reject_nul("classification", value)?;
                if value.is_empty() {
                    return Err(AppError::Validation(
                        "classification must not be empty".to_string(),
                    ));
                }
                if value.chars().count() > crate::services::report::MAX_FIELD_LEN {
                    return Err(AppError::Validation(format!(
                        "classification must be at most {} characters",
                        crate::services::report::MAX_FIELD_LEN
                    )));
                }
                Ok(ModerationAction::Classify(value.to_string()))
            }
            other => Ok(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModerationOutcome {
    Updated(ReportModel),
    /// `stored_files` are the attachment files left on disk once the rows
    /// cascaded away; the caller removes them.
    Deleted { id: i32, stored_files: Vec<String> },
}

/// Apply a non-delete action to a loaded report. Attribution identity and
/// timestamp are always written together.
pub fn apply_transition(
    active: &mut report::ActiveModel,
    action: &ModerationAction,
    actor: &str,
    now: NaiveDateTime,
) {
    match action {
        ModerationAction::Flag => active.is_flagged = Set(true),
        ModerationAction::Unflag => active.is_flagged = Set(false),
        ModerationAction::Classify(value) => {
            active.classification = Set(value.clone());
            active.classified_by = Set(Some(actor.to_string()));
            active.classified_on = Set(Some(now));
        }
        ModerationAction::Verify => {
            active.is_verified = Set(true);
            active.verified_by = Set(Some(actor.to_string()));
            active.verified_on = Set(Some(now));
        }
        // Row removal is done by the caller.
        ModerationAction::Delete => return,
    }
    active.updated_at = Set(now);
}

pub struct ModerationService {
    db: DatabaseConnection,
}

impl ModerationService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn moderate(
        &self,
        report_id: i32,
        action: ModerationAction,
        admin: &AdminUser,
    ) -> AppResult<ModerationOutcome> {
        let action = action.normalize()?;
        let now = chrono::Utc::now().naive_utc();

        let txn = self.db.begin().await?;

        // Row lock: a concurrent delete either finishes first (NotFound here)
        // or waits for this transaction.
        let existing = Report::find_by_id(report_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let outcome = match &action {
            ModerationAction::Delete => {
                let stored_files = Attachment::find()
                    .filter(attachment::Column::ReportId.eq(existing.id))
                    .all(&txn)
                    .await?
                    .into_iter()
                    .map(|a| a.storage_name)
                    .collect();

                let res = Report::delete_by_id(existing.id).exec(&txn).await?;
                if res.rows_affected == 0 {
                    return Err(AppError::NotFound);
                }
                ModerationOutcome::Deleted {
                    id: existing.id,
                    stored_files,
                }
            }
            _ => {
                let mut active: report::ActiveModel = existing.into();
                apply_transition(&mut active, &action, &admin.username, now);
                match active.update(&txn).await {
                    Ok(updated) => ModerationOutcome::Updated(updated),
                    Err(DbErr::RecordNotUpdated) => return Err(AppError::NotFound),
                    Err(e) => return Err(e.into()),
                }
            }
        };

        report_audit::ActiveModel {
            report_id: Set(report_id),
            action: Set(action.name().to_string()),
            detail: Set(action.detail()),
            performed_by: Set(admin.username.clone()),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        tracing::info!(
            report_id,
            action = action.name(),
            admin = %admin.username,
            "Moderation action applied"
        );
        Ok(outcome)
    }

    /// Newest first. Entries remain after the report itself is deleted.
    pub async fn audit_history(
        &self,
        report_id: i32,
        page: u64,
        per_page: u64,
    ) -> AppResult<(Vec<ReportAuditModel>, u64)> {
        let index = page_index(page, per_page)?;
        let paginator = ReportAudit::find()
            .filter(report_audit::Column::ReportId.eq(report_id))
            .order_by_desc(report_audit::Column::CreatedAt)
            .order_by_desc(report_audit::Column::Id)
            .paginate(&self.db, per_page);

        let total = paginator.num_items().await?;
        let entries = paginator.fetch_page(index).await?;
        Ok((entries, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReportType, UNCLASSIFIED};

    fn at(hour: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn fresh_report() -> ReportModel {
        ReportModel {
            id: 7,
            report_type: ReportType::Sms,
            source_from: Some("+1234567890".into()),
            subject: None,
            message_content: "Win a prize!".into(),
            received_at: None,
            reporter_name: None,
            reporter_contact: None,
            suggested_classification: UNCLASSIFIED.into(),
            classification: UNCLASSIFIED.into(),
            classified_by: None,
            classified_on: None,
            is_verified: false,
            verified_by: None,
            verified_on: None,
            is_flagged: false,
            created_at: at(9),
            updated_at: at(9),
        }
    }

    fn run(
        model: ReportModel,
        action: ModerationAction,
        actor: &str,
        now: NaiveDateTime,
    ) -> report::ActiveModel {
        let mut active: report::ActiveModel = model.into();
        apply_transition(&mut active, &action, actor, now);
        active
    }

    #[test]
    fn classify_sets_value_and_attribution_together() {
        let active = run(
            fresh_report(),
            ModerationAction::Classify("phishing".into()),
            "admin",
            at(10),
        );

        assert_eq!(active.classification.clone().unwrap(), "phishing");
        assert_eq!(active.classified_by.clone().unwrap(), Some("admin".into()));
        assert_eq!(active.classified_on.clone().unwrap(), Some(at(10)));
        assert_eq!(active.updated_at.clone().unwrap(), at(10));
        // Untouched columns are not written back.
        assert!(!active.is_flagged.is_set());
        assert!(!active.verified_by.is_set());
    }

    #[test]
    fn verify_sets_flag_and_attribution() {
        let active = run(fresh_report(), ModerationAction::Verify, "admin", at(11));

        assert!(active.is_verified.clone().unwrap());
        assert_eq!(active.verified_by.clone().unwrap(), Some("admin".into()));
        assert_eq!(active.verified_on.clone().unwrap(), Some(at(11)));
        assert!(!active.classification.is_set());
    }

    #[test]
    fn reverify_refreshes_attribution() {
        let mut verified = fresh_report();
        verified.is_verified = true;
        verified.verified_by = Some("admin".into());
        verified.verified_on = Some(at(10));

        let active = run(verified, ModerationAction::Verify, "admin", at(15));
        assert!(active.is_verified.clone().unwrap());
        assert_eq!(active.verified_on.clone().unwrap(), Some(at(15)));
    }

    #[test]
    fn flag_is_idempotent_and_unattributed() {
        let once = run(fresh_report(), ModerationAction::Flag, "admin", at(10));
        assert!(once.is_flagged.clone().unwrap());

        let mut flagged = fresh_report();
        flagged.is_flagged = true;
        let twice = run(flagged, ModerationAction::Flag, "admin", at(12));
        assert!(twice.is_flagged.clone().unwrap());
        assert!(!twice.classified_by.is_set());
        assert!(!twice.verified_by.is_set());
    }

    #[test]
    fn unflag_clears_flag() {
        let mut flagged = fresh_report();
        flagged.is_flagged = true;
        let active = run(flagged, ModerationAction::Unflag, "admin", at(12));
        assert!(!active.is_flagged.clone().unwrap());
    }

    #[test]
    fn delete_does_not_touch_columns() {
        let active = run(fresh_report(), ModerationAction::Delete, "admin", at(12));
        assert!(!active.updated_at.is_set());
        assert!(!active.is_flagged.is_set());
    }

    #[test]
    fn classify_rejects_blank_value() {
        let err = ModerationAction::Classify("   ".into())
            .normalize()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn classify_rejects_nul() {
        let err = ModerationAction::Classify("phish\0ing".into())
            .normalize()
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("NUL")));
    }

    #[test]
    fn classify_value_is_trimmed() {
        assert_eq!(
            ModerationAction::Classify(" phishing\n".into())
                .normalize()
                .unwrap(),
            ModerationAction::Classify("phishing".into())
        );
    }

    #[test]
    fn audit_names_and_details() {
        assert_eq!(ModerationAction::Flag.name(), "flag");
        assert_eq!(ModerationAction::Delete.detail(), None);
        assert_eq!(
            ModerationAction::Classify("smishing".into()).detail(),
            Some("smishing".into())
        );
    }

    #[test]
    fn attribution_stays_paired_across_sequences() {
        let mut model = fresh_report();
        let actions = [
            ModerationAction::Flag,
            ModerationAction::Classify("phishing".into()),
            ModerationAction::Unflag,
            ModerationAction::Verify,
            ModerationAction::Classify("smishing".into()),
        ];

        for (hour, action) in actions.iter().enumerate() {
            let mut active: report::ActiveModel = model.clone().into();
            apply_transition(&mut active, action, "admin", at(10 + hour as u32));
            if let sea_orm::ActiveValue::Set(v) = active.is_flagged.clone() {
                model.is_flagged = v;
            }
            if let sea_orm::ActiveValue::Set(v) = active.classification.clone() {
                model.classification = v;
            }
            if let sea_orm::ActiveValue::Set(v) = active.classified_by.clone() {
                model.classified_by = v;
            }
            if let sea_orm::ActiveValue::Set(v) = active.classified_on.clone() {
                model.classified_on = v;
            }
            if let sea_orm::ActiveValue::Set(v) = active.verified_by.clone() {
                model.verified_by = v;
            }
            if let sea_orm::ActiveValue::Set(v) = active.verified_on.clone() {
                model.verified_on = v;
            }
            assert!(model.attribution_consistent(), "after {:?}", action);
        }

        assert_eq!(model.classification, "smishing");
        assert!(!model.is_flagged);
    }
}
