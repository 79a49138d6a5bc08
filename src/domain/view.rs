use serde::{Deserialize, Serialize};

use super::report::{ApproverCount, ChatLine, Report, ReportSummary};

/// View models handed to the presentation adapter. Panels carry every value
/// the adapter needs to dispatch follow-up intents (page numbers, report
/// ids), so nothing is ever re-derived from rendered text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum View {
    Categories(CategoryPanel),
    Queue(ReportQueuePanel),
    History(HistoryPanel),
    Detail(ReportDetailPanel),
    Stats(StatsPanel),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPanel {
    pub categories: Vec<String>,
    pub custom_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportQueuePanel {
    pub page: u32,
    pub page_size: u32,
    pub entries: Vec<ReportSummary>,
    pub has_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPanel {
    pub page: u32,
    pub page_size: u32,
    pub entries: Vec<ReportSummary>,
    pub has_next: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDetailPanel {
    pub report: Report,
    /// Chat lines from the reported subject shortly before the report was
    /// filed; empty when the subject could not be resolved.
    pub context: Vec<ChatLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsPanel {
    pub daily: Vec<ApproverCount>,
    pub weekly: Vec<ApproverCount>,
    pub monthly: Vec<ApproverCount>,
}
