pub mod attachment;
pub mod report;
pub mod report_audit;

pub use attachment::{Entity as Attachment, Model as AttachmentModel};
pub use report::{Entity as Report, Model as ReportModel, ReportType, UNCLASSIFIED};
pub use report_audit::{Entity as ReportAudit, Model as ReportAuditModel};
