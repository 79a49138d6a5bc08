use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use time::{Duration, OffsetDateTime};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::app::duration::{format_duration_human, parse_duration_ms};
use crate::app::pending::{PendingFlow, PendingInputRegistry};
use crate::app::rate_limiter::{RateLimiter, SubmitCheck};
use crate::config::messages::{render, Messages};
use crate::config::EngineConfig;
use crate::domain::report::{ActionKind, ChatLine, Report, ReportStatus, ReportSummary};
use crate::domain::view::{
    CategoryPanel, HistoryPanel, ReportDetailPanel, ReportQueuePanel, StatsPanel, View,
};
use crate::host::{HostRuntime, Presenter};
use crate::infra::store::{
    NewReport, ReportStore, Resolution, ResolveOutcome, SortOrder, StatusFilter,
};

/// Chat context attached to a report detail view covers this window before
/// the report was filed.
const CHAT_CONTEXT_WINDOW: Duration = Duration::seconds(120);
const TOP_APPROVERS_SHOWN: i64 = 10;
const QUOTA_RESET_PERIOD: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// Everything the presentation adapter and the host's command/chat layer can
/// ask the coordinator to do. Page numbers and report ids are carried here
/// directly; they are never recovered from rendered panel text.
#[derive(Debug, Clone)]
pub enum Intent {
    /// `/report <target>` was issued.
    SubmitReport { user: Uuid, target: String },
    SelectCategory { user: Uuid, label: String },
    SelectCustomReason { user: Uuid },
    OpenQueue { user: Uuid, page: u32 },
    OpenHistory { user: Uuid, page: u32 },
    OpenDetail { user: Uuid, report_id: i64 },
    ClickApprove { user: Uuid, report_id: i64 },
    ClickReject { user: Uuid, report_id: i64 },
    OpenStats { user: Uuid },
    /// A chat line; consumed as wizard input when a flow is armed, otherwise
    /// appended to the chat log.
    Chat { user: Uuid, text: String },
    Disconnect { user: Uuid },
}

/// Result of one unit of worker I/O, applied back on the authority task.
enum Continuation {
    ReportStored {
        user: Uuid,
        reporter: String,
        subject: String,
        outcome: Result<i64>,
    },
    QueueLoaded {
        user: Uuid,
        page: u32,
        outcome: Result<Vec<ReportSummary>>,
    },
    HistoryLoaded {
        user: Uuid,
        page: u32,
        outcome: Result<Vec<ReportSummary>>,
    },
    DetailLoaded {
        user: Uuid,
        outcome: Result<Option<(Report, Vec<ChatLine>)>>,
    },
    Resolved {
        user: Uuid,
        report_id: i64,
        action: ActionKind,
        actor: String,
        duration_ms: i64,
        outcome: Result<ResolveOutcome>,
    },
    StatsLoaded {
        user: Uuid,
        outcome: Result<StatsPanel>,
    },
    ChatStored {
        outcome: Result<()>,
    },
}

enum Event {
    Intent(Intent),
    Continuation(Continuation),
    QuotaReset,
    InFlight(oneshot::Sender<usize>),
}

/// Cloneable entry point; the embedding host keeps one of these and feeds it
/// intents from its command, click and chat handlers.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl CoordinatorHandle {
    pub fn intent(&self, intent: Intent) {
        if self.tx.send(Event::Intent(intent)).is_err() {
            tracing::warn!("coordinator is no longer running, intent dropped");
        }
    }

    /// Clear every submitter's daily quota. The coordinator also ticks this
    /// itself every 24 hours; hosts with their own scheduler may call it
    /// instead.
    pub fn reset_daily_quota(&self) {
        let _ = self.tx.send(Event::QuotaReset);
    }

    /// Number of storage tasks still in flight; lets shutdown paths (and
    /// tests) wait for the pipeline to drain.
    pub async fn in_flight(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Event::InFlight(reply)).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// The single authority over all mutable workflow state. Runs as one task;
/// blocking storage work is handed to workers which post their results back
/// onto the same event queue, so per-user handling stays in submission order.
pub struct Coordinator {
    config: EngineConfig,
    messages: Messages,
    store: Arc<dyn ReportStore>,
    host: Arc<dyn HostRuntime>,
    presenter: Arc<dyn Presenter>,
    tx: mpsc::UnboundedSender<Event>,
    limiter: RateLimiter,
    pending: PendingInputRegistry,
    report_targets: HashMap<Uuid, String>,
    in_flight: usize,
}

impl Coordinator {
    pub fn spawn(
        config: EngineConfig,
        messages: Messages,
        store: Arc<dyn ReportStore>,
        host: Arc<dyn HostRuntime>,
        presenter: Arc<dyn Presenter>,
    ) -> CoordinatorHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let limiter = RateLimiter::new(config.daily_report_limit, config.cooldown_minutes);
        let coordinator = Self {
            config,
            messages,
            store,
            host,
            presenter,
            tx: tx.clone(),
            limiter,
            pending: PendingInputRegistry::new(),
            report_targets: HashMap::new(),
            in_flight: 0,
        };
        tokio::spawn(coordinator.run(rx));
        tokio::spawn(quota_reset_ticker(tx.clone()));
        CoordinatorHandle { tx }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Event>) {
        tracing::info!("report coordinator started");
        while let Some(event) = rx.recv().await {
            self.handle_event(event);
        }
        tracing::info!("report coordinator stopped");
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Intent(intent) => self.handle_intent(intent),
            Event::Continuation(continuation) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.handle_continuation(continuation);
            }
            Event::QuotaReset => {
                self.limiter.reset_all();
                tracing::info!("daily report counters reset");
            }
            Event::InFlight(reply) => {
                let _ = reply.send(self.in_flight);
            }
        }
    }

    /// Hand a unit of blocking work to a worker. The worker owns only cloned
    /// collaborators and produces a pure continuation; it never touches
    /// coordinator state or emits UI.
    fn dispatch<F>(&mut self, work: F)
    where
        F: Future<Output = Continuation> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let _ = tx.send(Event::Continuation(work.await));
        });
    }

    // ------------------------------------------------------------------
    // Intents
    // ------------------------------------------------------------------

    fn handle_intent(&mut self, intent: Intent) {
        match intent {
            Intent::SubmitReport { user, target } => self.submit_report(user, target),
            Intent::SelectCategory { user, label } => self.store_submission(user, label),
            Intent::SelectCustomReason { user } => self.select_custom_reason(user),
            Intent::OpenQueue { user, page } => self.open_queue(user, page),
            Intent::OpenHistory { user, page } => self.open_history(user, page),
            Intent::OpenDetail { user, report_id } => self.open_detail(user, report_id),
            Intent::ClickApprove { user, report_id } => self.click_approve(user, report_id),
            Intent::ClickReject { user, report_id } => self.click_reject(user, report_id),
            Intent::OpenStats { user } => self.open_stats(user),
            Intent::Chat { user, text } => self.handle_chat(user, text),
            Intent::Disconnect { user } => self.disconnect(user),
        }
    }

    fn submit_report(&mut self, user: Uuid, target: String) {
        let target = target.trim().to_string();
        if target.is_empty() {
            self.presenter.tell(user, &self.messages.usage_report);
            return;
        }
        match self.limiter.check(user, self.host.now()) {
            SubmitCheck::DailyLimitExceeded => {
                self.presenter.tell(user, &self.messages.daily_limit_reached);
            }
            SubmitCheck::CooldownActive => {
                self.presenter.tell(user, &self.messages.cooldown_active);
            }
            SubmitCheck::Allowed => {
                self.report_targets.insert(user, target);
                self.presenter.show(
                    user,
                    View::Categories(CategoryPanel {
                        categories: self.config.categories.clone(),
                        custom_label: self.messages.custom_category_label.clone(),
                    }),
                );
            }
        }
    }

    fn select_custom_reason(&mut self, user: Uuid) {
        if !self.report_targets.contains_key(&user) {
            self.presenter.tell(user, &self.messages.no_target);
            return;
        }
        self.pending.begin(user, PendingFlow::CustomReason);
        self.presenter.tell(user, &self.messages.custom_reason_prompt);
    }

    /// Shared tail of the category click and the custom-reason flow: insert
    /// the report with the remembered target.
    fn store_submission(&mut self, user: Uuid, reason: String) {
        let Some(subject) = self.report_targets.get(&user).cloned() else {
            self.presenter.tell(user, &self.messages.no_target);
            return;
        };
        let reporter = self.display_name(user);
        let report = NewReport {
            reporter: reporter.clone(),
            subject: subject.clone(),
            server_tag: self.config.server_tag.clone(),
            created_at: self.host.now(),
            reason,
        };
        let store = self.store.clone();
        self.dispatch(async move {
            let outcome = store.insert_report(report).await;
            Continuation::ReportStored {
                user,
                reporter,
                subject,
                outcome,
            }
        });
    }

    fn open_queue(&mut self, user: Uuid, page: u32) {
        if !self.require_staff(user) {
            return;
        }
        let store = self.store.clone();
        let server_tag = self.config.server_tag.clone();
        let page_size = i64::from(self.config.page_size);
        self.dispatch(async move {
            // one extra row tells us whether a next page exists
            let outcome = store
                .list_reports(
                    &server_tag,
                    StatusFilter::Only(ReportStatus::Pending),
                    SortOrder::OldestFirst,
                    page_size + 1,
                    i64::from(page) * page_size,
                )
                .await;
            Continuation::QueueLoaded { user, page, outcome }
        });
    }

    fn open_history(&mut self, user: Uuid, page: u32) {
        if !self.require_staff(user) {
            return;
        }
        let store = self.store.clone();
        let server_tag = self.config.server_tag.clone();
        let page_size = i64::from(self.config.page_size);
        self.dispatch(async move {
            let outcome = store
                .list_reports(
                    &server_tag,
                    StatusFilter::Any,
                    SortOrder::NewestFirst,
                    page_size + 1,
                    i64::from(page) * page_size,
                )
                .await;
            Continuation::HistoryLoaded { user, page, outcome }
        });
    }

    fn open_detail(&mut self, user: Uuid, report_id: i64) {
        if !self.require_staff(user) {
            return;
        }
        let store = self.store.clone();
        let host = self.host.clone();
        let shown = self.config.context_lines_shown;
        self.dispatch(async move {
            let outcome = load_detail(store, host, report_id, shown).await;
            Continuation::DetailLoaded { user, outcome }
        });
    }

    fn click_approve(&mut self, user: Uuid, report_id: i64) {
        if !self.require_staff(user) {
            return;
        }
        self.pending
            .begin(user, PendingFlow::ApprovalDuration { report_id });
        self.presenter.tell(user, &self.messages.duration_prompt);
    }

    fn click_reject(&mut self, user: Uuid, report_id: i64) {
        if !self.require_staff(user) {
            return;
        }
        self.pending
            .begin(user, PendingFlow::RejectionReason { report_id });
        self.presenter.tell(user, &self.messages.reject_reason_prompt);
    }

    fn open_stats(&mut self, user: Uuid) {
        if !self.require_staff(user) {
            return;
        }
        let store = self.store.clone();
        let now = self.host.now();
        self.dispatch(async move {
            let outcome = load_stats(store, now).await;
            Continuation::StatsLoaded { user, outcome }
        });
    }

    fn handle_chat(&mut self, user: Uuid, text: String) {
        match self.pending.consume(user) {
            Some(PendingFlow::CustomReason) => {
                tracing::debug!(user = %user, "chat consumed as report reason");
                self.store_submission(user, text);
            }
            Some(PendingFlow::ApprovalDuration { report_id }) => {
                match parse_duration_ms(&text) {
                    Some(duration_ms) => {
                        self.pending.begin(
                            user,
                            PendingFlow::ApprovalReason {
                                report_id,
                                duration_ms,
                            },
                        );
                        self.presenter.tell(user, &self.messages.approve_reason_prompt);
                    }
                    None => {
                        // recoverable: re-arm the same step and let them retry
                        self.pending
                            .begin(user, PendingFlow::ApprovalDuration { report_id });
                        self.presenter.tell(user, &self.messages.duration_invalid);
                    }
                }
            }
            Some(PendingFlow::ApprovalReason {
                report_id,
                duration_ms,
            }) => {
                let actor = self.display_name(user);
                let resolution = Resolution::Approve {
                    approver: actor.clone(),
                    reason: text,
                    duration_ms,
                    penalty_kind: self.config.default_penalty_kind.clone(),
                    at: self.host.now(),
                };
                self.finalize(user, report_id, ActionKind::Approve, actor, duration_ms, resolution);
            }
            Some(PendingFlow::RejectionReason { report_id }) => {
                let actor = self.display_name(user);
                let resolution = Resolution::Reject {
                    approver: actor.clone(),
                    reason: text,
                    at: self.host.now(),
                };
                self.finalize(user, report_id, ActionKind::Reject, actor, 0, resolution);
            }
            None => {
                let store = self.store.clone();
                let line = ChatLine {
                    speaker: user,
                    message: text,
                    sent_at: self.host.now(),
                };
                self.dispatch(async move {
                    let outcome = store.insert_chat_line(line).await;
                    Continuation::ChatStored { outcome }
                });
            }
        }
    }

    fn finalize(
        &mut self,
        user: Uuid,
        report_id: i64,
        action: ActionKind,
        actor: String,
        duration_ms: i64,
        resolution: Resolution,
    ) {
        let store = self.store.clone();
        self.dispatch(async move {
            let outcome = store.resolve_report(report_id, resolution).await;
            Continuation::Resolved {
                user,
                report_id,
                action,
                actor,
                duration_ms,
                outcome,
            }
        });
    }

    fn disconnect(&mut self, user: Uuid) {
        self.pending.cancel(user);
        self.report_targets.remove(&user);
        tracing::debug!(user = %user, "cleared pending workflow state on disconnect");
    }

    // ------------------------------------------------------------------
    // Continuations
    // ------------------------------------------------------------------

    fn handle_continuation(&mut self, continuation: Continuation) {
        match continuation {
            Continuation::ReportStored {
                user,
                reporter,
                subject,
                outcome,
            } => self.report_stored(user, reporter, subject, outcome),
            Continuation::QueueLoaded { user, page, outcome } => match outcome {
                Ok(rows) => {
                    let (entries, has_next) = self.clip_page(rows);
                    self.show_if_online(
                        user,
                        View::Queue(ReportQueuePanel {
                            page,
                            page_size: self.config.page_size,
                            entries,
                            has_next,
                        }),
                    );
                }
                Err(err) => self.storage_failure(user, "failed to load report queue", err),
            },
            Continuation::HistoryLoaded { user, page, outcome } => match outcome {
                Ok(rows) => {
                    let (entries, has_next) = self.clip_page(rows);
                    self.show_if_online(
                        user,
                        View::History(HistoryPanel {
                            page,
                            page_size: self.config.page_size,
                            entries,
                            has_next,
                        }),
                    );
                }
                Err(err) => self.storage_failure(user, "failed to load report history", err),
            },
            Continuation::DetailLoaded { user, outcome } => match outcome {
                Ok(Some((report, context))) => {
                    self.show_if_online(user, View::Detail(ReportDetailPanel { report, context }));
                }
                Ok(None) => self.tell_if_online(user, &self.messages.not_found),
                Err(err) => self.storage_failure(user, "failed to load report detail", err),
            },
            Continuation::Resolved {
                user,
                report_id,
                action,
                actor,
                duration_ms,
                outcome,
            } => self.resolved(user, report_id, action, actor, duration_ms, outcome),
            Continuation::StatsLoaded { user, outcome } => match outcome {
                Ok(panel) => self.show_if_online(user, View::Stats(panel)),
                Err(err) => self.storage_failure(user, "failed to load approver stats", err),
            },
            Continuation::ChatStored { outcome } => {
                if let Err(err) = outcome {
                    tracing::error!(error = ?err, "failed to store chat line");
                }
            }
        }
    }

    fn report_stored(
        &mut self,
        user: Uuid,
        reporter: String,
        subject: String,
        outcome: Result<i64>,
    ) {
        match outcome {
            Ok(report_id) => {
                // quota is consumed only now, with the write durable
                self.limiter.record(user, self.host.now());
                self.report_targets.remove(&user);
                tracing::info!(
                    report_id = report_id,
                    reporter = %reporter,
                    subject = %subject,
                    "report submitted"
                );
                self.tell_if_online(user, &self.messages.submit_success);
                let notification = render(
                    &self.messages.staff_notification,
                    &[("subject", subject.as_str()), ("reporter", reporter.as_str())],
                );
                for staff in self.host.online_staff() {
                    self.presenter.tell(staff, &notification);
                }
            }
            Err(err) => {
                tracing::error!(error = ?err, reporter = %reporter, "failed to store report");
                self.tell_if_online(user, &self.messages.save_failure);
            }
        }
    }

    fn resolved(
        &mut self,
        user: Uuid,
        report_id: i64,
        action: ActionKind,
        actor: String,
        duration_ms: i64,
        outcome: Result<ResolveOutcome>,
    ) {
        match outcome {
            Ok(ResolveOutcome::Applied { subject }) => match action {
                ActionKind::Approve => {
                    tracing::info!(
                        report_id = report_id,
                        approver = %actor,
                        duration_ms = duration_ms,
                        "report approved"
                    );
                    self.run_penalty_commands(&subject, &actor, duration_ms);
                    self.tell_if_online(user, &self.messages.approve_success);
                }
                ActionKind::Reject => {
                    tracing::info!(report_id = report_id, actor = %actor, "report rejected");
                    self.tell_if_online(user, &self.messages.reject_success);
                }
            },
            Ok(ResolveOutcome::NotFound) => {
                self.tell_if_online(user, &self.messages.not_found);
            }
            Ok(ResolveOutcome::AlreadyResolved) => {
                self.tell_if_online(user, &self.messages.already_resolved);
            }
            Err(err) => self.storage_failure(user, "failed to resolve report", err),
        }
    }

    /// Penalty application is best-effort: the resolution is already durable
    /// and a failed command is only logged for the host to monitor.
    fn run_penalty_commands(&self, subject: &str, approver: &str, duration_ms: i64) {
        let duration = format_duration_human(duration_ms);
        for template in &self.config.penalty_commands {
            let command = render(
                template,
                &[
                    ("subject", subject),
                    ("approver", approver),
                    ("duration", duration.as_str()),
                    ("penalty", self.config.default_penalty_kind.as_str()),
                ],
            );
            if let Err(err) = self.host.dispatch_command(&command) {
                tracing::warn!(error = ?err, command = %command, "penalty command failed");
            }
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require_staff(&self, user: Uuid) -> bool {
        if self.host.is_staff(user) {
            true
        } else {
            self.presenter.tell(user, &self.messages.no_permission);
            false
        }
    }

    fn display_name(&self, user: Uuid) -> String {
        self.host
            .player_name(user)
            .unwrap_or_else(|| user.to_string())
    }

    /// The list workers fetch one row past the page; the overflow row only
    /// feeds the has-next flag.
    fn clip_page(&self, mut rows: Vec<ReportSummary>) -> (Vec<ReportSummary>, bool) {
        let page_size = self.config.page_size as usize;
        let has_next = rows.len() > page_size;
        rows.truncate(page_size);
        (rows, has_next)
    }

    fn show_if_online(&self, user: Uuid, view: View) {
        if self.host.is_online(user) {
            self.presenter.show(user, view);
        }
    }

    fn tell_if_online(&self, user: Uuid, message: &str) {
        if self.host.is_online(user) {
            self.presenter.tell(user, message);
        }
    }

    fn storage_failure(&self, user: Uuid, what: &str, err: anyhow::Error) {
        tracing::error!(error = ?err, "{}", what);
        self.tell_if_online(user, &self.messages.generic_failure);
    }
}

async fn load_detail(
    store: Arc<dyn ReportStore>,
    host: Arc<dyn HostRuntime>,
    report_id: i64,
    shown: usize,
) -> Result<Option<(Report, Vec<ChatLine>)>> {
    let Some(report) = store.report_by_id(report_id).await? else {
        return Ok(None);
    };
    // an unresolvable subject just means no context, not a failure
    let context = match host.resolve_player_id(&report.subject) {
        Some(speaker) => {
            let lines = store
                .chat_lines_between(speaker, report.created_at - CHAT_CONTEXT_WINDOW, report.created_at)
                .await?;
            let start = lines.len().saturating_sub(shown);
            lines[start..].to_vec()
        }
        None => Vec::new(),
    };
    Ok(Some((report, context)))
}

async fn load_stats(store: Arc<dyn ReportStore>, now: OffsetDateTime) -> Result<StatsPanel> {
    // windows are computed independently, each from its own start
    let daily = store
        .top_approvers(now - Duration::hours(24), TOP_APPROVERS_SHOWN)
        .await?;
    let weekly = store
        .top_approvers(now - Duration::days(7), TOP_APPROVERS_SHOWN)
        .await?;
    let monthly = store
        .top_approvers(now - Duration::days(30), TOP_APPROVERS_SHOWN)
        .await?;
    Ok(StatsPanel {
        daily,
        weekly,
        monthly,
    })
}

async fn quota_reset_ticker(tx: mpsc::UnboundedSender<Event>) {
    let first = tokio::time::Instant::now() + QUOTA_RESET_PERIOD;
    let mut ticker = tokio::time::interval_at(first, QUOTA_RESET_PERIOD);
    loop {
        ticker.tick().await;
        if tx.send(Event::QuotaReset).is_err() {
            break;
        }
    }
}
