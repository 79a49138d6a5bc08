use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::report::{
    ApproverCount, ChatLine, Report, ReportStatus, ReportSummary,
};
use crate::infra::db::Db;

#[derive(Debug, Clone)]
pub struct NewReport {
    pub reporter: String,
    pub subject: String,
    pub server_tag: String,
    pub created_at: OffsetDateTime,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Approve {
        approver: String,
        reason: String,
        duration_ms: i64,
        penalty_kind: String,
        at: OffsetDateTime,
    },
    Reject {
        approver: String,
        reason: String,
        at: OffsetDateTime,
    },
}

#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// The report was pending and is now resolved; carries the reported
    /// subject so the caller can substitute penalty commands.
    Applied { subject: String },
    NotFound,
    AlreadyResolved,
}

#[derive(Debug, Clone, Copy)]
pub enum StatusFilter {
    Only(ReportStatus),
    Any,
}

#[derive(Debug, Clone, Copy)]
pub enum SortOrder {
    OldestFirst,
    NewestFirst,
}

/// Durable report storage. Production runs against Postgres; tests run
/// against an in-memory implementation. All methods may block on I/O and are
/// only ever called from worker tasks.
#[async_trait]
pub trait ReportStore: Send + Sync + 'static {
    async fn insert_report(&self, report: NewReport) -> Result<i64>;

    /// Flip a pending report to its resolved status and append the matching
    /// action-log entry as one atomic step. Reports that are missing or no
    /// longer pending are left untouched.
    async fn resolve_report(&self, id: i64, resolution: Resolution) -> Result<ResolveOutcome>;

    async fn report_by_id(&self, id: i64) -> Result<Option<Report>>;

    async fn list_reports(
        &self,
        server_tag: &str,
        filter: StatusFilter,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReportSummary>>;

    async fn insert_chat_line(&self, line: ChatLine) -> Result<()>;

    async fn chat_lines_between(
        &self,
        speaker: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<ChatLine>>;

    async fn top_approvers(&self, since: OffsetDateTime, limit: i64) -> Result<Vec<ApproverCount>>;
}

#[derive(Clone)]
pub struct PgReportStore {
    db: Db,
}

impl PgReportStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn insert_report(&self, report: NewReport) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO reports (reporter, subject, server_tag, created_at, status, reason) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id",
        )
        .bind(&report.reporter)
        .bind(&report.subject)
        .bind(&report.server_tag)
        .bind(report.created_at)
        .bind(ReportStatus::Pending.as_str())
        .bind(&report.reason)
        .fetch_one(self.db.pool())
        .await?;

        Ok(id)
    }

    async fn resolve_report(&self, id: i64, resolution: Resolution) -> Result<ResolveOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query("SELECT subject, status FROM reports WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(ResolveOutcome::NotFound),
        };
        let status: String = row.get("status");
        if status != ReportStatus::Pending.as_str() {
            return Ok(ResolveOutcome::AlreadyResolved);
        }
        let subject: String = row.get("subject");

        match &resolution {
            Resolution::Approve {
                approver,
                reason,
                duration_ms,
                penalty_kind,
                at,
            } => {
                sqlx::query(
                    "UPDATE reports \
                     SET status = $1, penalty_kind = $2, duration_ms = $3, \
                         resolved_by = $4, resolved_at = $5 \
                     WHERE id = $6",
                )
                .bind(ReportStatus::Approved.as_str())
                .bind(penalty_kind)
                .bind(duration_ms)
                .bind(approver)
                .bind(at)
                .bind(id)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    "INSERT INTO report_actions \
                     (report_id, action, actor, reason, duration_ms, penalty_kind, created_at) \
                     VALUES ($1, 'approve', $2, $3, $4, $5, $6)",
                )
                .bind(id)
                .bind(approver)
                .bind(reason)
                .bind(duration_ms)
                .bind(penalty_kind)
                .bind(at)
                .execute(&mut *tx)
                .await?;
            }
            Resolution::Reject { approver, reason, at } => {
                sqlx::query(
                    "UPDATE reports \
                     SET status = $1, penalty_kind = '', duration_ms = 0, \
                         resolved_by = $2, resolved_at = $3 \
                     WHERE id = $4",
                )
                .bind(ReportStatus::Rejected.as_str())
                .bind(approver)
                .bind(at)
                .bind(id)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    "INSERT INTO report_actions \
                     (report_id, action, actor, reason, duration_ms, penalty_kind, created_at) \
                     VALUES ($1, 'reject', $2, $3, 0, '', $4)",
                )
                .bind(id)
                .bind(approver)
                .bind(reason)
                .bind(at)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(ResolveOutcome::Applied { subject })
    }

    async fn report_by_id(&self, id: i64) -> Result<Option<Report>> {
        let row = sqlx::query(
            "SELECT id, reporter, subject, server_tag, created_at, status, reason, \
                    penalty_kind, duration_ms, resolved_by, resolved_at \
             FROM reports \
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        row.map(|row| {
            let status: String = row.get("status");
            Ok(Report {
                id: row.get("id"),
                reporter: row.get("reporter"),
                subject: row.get("subject"),
                server_tag: row.get("server_tag"),
                created_at: row.get("created_at"),
                status: parse_status(&status)?,
                reason: row.get("reason"),
                penalty_kind: row.get("penalty_kind"),
                duration_ms: row.get("duration_ms"),
                resolved_by: row.get("resolved_by"),
                resolved_at: row.get("resolved_at"),
            })
        })
        .transpose()
    }

    async fn list_reports(
        &self,
        server_tag: &str,
        filter: StatusFilter,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReportSummary>> {
        let order_sql = match order {
            SortOrder::OldestFirst => "ASC",
            SortOrder::NewestFirst => "DESC",
        };

        let rows = match filter {
            StatusFilter::Only(status) => {
                let query = format!(
                    "SELECT id, reporter, subject, created_at, status, reason \
                     FROM reports \
                     WHERE server_tag = $1 AND status = $2 \
                     ORDER BY created_at {order}, id {order} \
                     LIMIT $3 OFFSET $4",
                    order = order_sql,
                );
                sqlx::query(&query)
                    .bind(server_tag)
                    .bind(status.as_str())
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.db.pool())
                    .await?
            }
            StatusFilter::Any => {
                let query = format!(
                    "SELECT id, reporter, subject, created_at, status, reason \
                     FROM reports \
                     WHERE server_tag = $1 \
                     ORDER BY created_at {order}, id {order} \
                     LIMIT $2 OFFSET $3",
                    order = order_sql,
                );
                sqlx::query(&query)
                    .bind(server_tag)
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(self.db.pool())
                    .await?
            }
        };

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.get("status");
            summaries.push(ReportSummary {
                id: row.get("id"),
                reporter: row.get("reporter"),
                subject: row.get("subject"),
                created_at: row.get("created_at"),
                status: parse_status(&status)?,
                reason: row.get("reason"),
            });
        }

        Ok(summaries)
    }

    async fn insert_chat_line(&self, line: ChatLine) -> Result<()> {
        sqlx::query("INSERT INTO chat_lines (speaker, message, sent_at) VALUES ($1, $2, $3)")
            .bind(line.speaker)
            .bind(&line.message)
            .bind(line.sent_at)
            .execute(self.db.pool())
            .await?;

        Ok(())
    }

    async fn chat_lines_between(
        &self,
        speaker: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<ChatLine>> {
        let rows = sqlx::query(
            "SELECT speaker, message, sent_at \
             FROM chat_lines \
             WHERE speaker = $1 AND sent_at BETWEEN $2 AND $3 \
             ORDER BY sent_at ASC, id ASC",
        )
        .bind(speaker)
        .bind(from)
        .bind(to)
        .fetch_all(self.db.pool())
        .await?;

        let lines = rows
            .into_iter()
            .map(|row| ChatLine {
                speaker: row.get("speaker"),
                message: row.get("message"),
                sent_at: row.get("sent_at"),
            })
            .collect();

        Ok(lines)
    }

    async fn top_approvers(&self, since: OffsetDateTime, limit: i64) -> Result<Vec<ApproverCount>> {
        let rows = sqlx::query(
            "SELECT actor, COUNT(*) AS cnt \
             FROM report_actions \
             WHERE action = 'approve' AND created_at >= $1 \
             GROUP BY actor \
             ORDER BY cnt DESC, actor ASC \
             LIMIT $2",
        )
        .bind(since)
        .bind(limit)
        .fetch_all(self.db.pool())
        .await?;

        let counts = rows
            .into_iter()
            .map(|row| ApproverCount {
                actor: row.get("actor"),
                count: row.get("cnt"),
            })
            .collect();

        Ok(counts)
    }
}

fn parse_status(value: &str) -> Result<ReportStatus> {
    ReportStatus::from_str(value).ok_or_else(|| anyhow!("unknown report status: {}", value))
}
