use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    Pending,
    Approved,
    Rejected,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Approved => "approved",
            ReportStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ReportStatus::Pending),
            "approved" => Some(ReportStatus::Approved),
            "rejected" => Some(ReportStatus::Rejected),
            _ => None,
        }
    }
}

/// A filed complaint. Status only ever moves pending -> approved or
/// pending -> rejected, applied by the store in a single resolution step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: i64,
    pub reporter: String,
    pub subject: String,
    pub server_tag: String,
    pub created_at: OffsetDateTime,
    pub status: ReportStatus,
    pub reason: String,
    pub penalty_kind: Option<String>,
    /// Penalty duration in milliseconds; -1 means permanent.
    pub duration_ms: Option<i64>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSummary {
    pub id: i64,
    pub reporter: String,
    pub subject: String,
    pub created_at: OffsetDateTime,
    pub status: ReportStatus,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Approve,
    Reject,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Approve => "approve",
            ActionKind::Reject => "reject",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(ActionKind::Approve),
            "reject" => Some(ActionKind::Reject),
            _ => None,
        }
    }
}

/// Append-only audit record, written exactly once per resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub id: i64,
    pub report_id: i64,
    pub action: ActionKind,
    pub actor: String,
    pub reason: String,
    pub duration_ms: i64,
    pub penalty_kind: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatLine {
    pub speaker: Uuid,
    pub message: String,
    pub sent_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApproverCount {
    pub actor: String,
    pub count: i64,
}
