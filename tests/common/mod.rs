#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use vigil::app::coordinator::{Coordinator, CoordinatorHandle, Intent};
use vigil::config::messages::Messages;
use vigil::config::EngineConfig;
use vigil::domain::report::{
    ActionKind, ActionLogEntry, ApproverCount, ChatLine, Report, ReportStatus, ReportSummary,
};
use vigil::domain::view::View;
use vigil::host::{HostRuntime, Presenter};
use vigil::infra::store::{
    NewReport, ReportStore, Resolution, ResolveOutcome, SortOrder, StatusFilter,
};

pub const SERVER_TAG: &str = "lobby";

// ---------------------------------------------------------------------------
// MemoryStore — ReportStore over plain tables, plus inspection helpers
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreInner {
    next_report_id: i64,
    next_action_id: i64,
    reports: Vec<Report>,
    actions: Vec<ActionLogEntry>,
    chat: Vec<ChatLine>,
}

pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    fail_writes: AtomicBool,
    insert_delay: Mutex<Option<StdDuration>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            fail_writes: AtomicBool::new(false),
            insert_delay: Mutex::new(None),
        }
    }

    /// Make every write fail until turned off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay report inserts so a test can interleave events while the
    /// worker is still "blocked on I/O".
    pub fn set_insert_delay(&self, delay: StdDuration) {
        *self.insert_delay.lock().unwrap() = Some(delay);
    }

    pub fn report(&self, id: i64) -> Option<Report> {
        self.inner
            .lock()
            .unwrap()
            .reports
            .iter()
            .find(|report| report.id == id)
            .cloned()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.inner.lock().unwrap().reports.clone()
    }

    pub fn actions_for(&self, report_id: i64) -> Vec<ActionLogEntry> {
        self.inner
            .lock()
            .unwrap()
            .actions
            .iter()
            .filter(|entry| entry.report_id == report_id)
            .cloned()
            .collect()
    }

    pub fn chat(&self) -> Vec<ChatLine> {
        self.inner.lock().unwrap().chat.clone()
    }

    /// Seed an action-log entry directly, bypassing the workflow; used by
    /// the stats tests.
    pub fn seed_action(&self, actor: &str, action: ActionKind, at: OffsetDateTime) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_action_id += 1;
        let id = inner.next_action_id;
        inner.actions.push(ActionLogEntry {
            id,
            report_id: 0,
            action,
            actor: actor.to_string(),
            reason: "seeded".to_string(),
            duration_ms: 0,
            penalty_kind: String::new(),
            created_at: at,
        });
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(anyhow!("synthetic storage failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn insert_report(&self, report: NewReport) -> Result<i64> {
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_writable()?;
        let mut inner = self.inner.lock().unwrap();
        inner.next_report_id += 1;
        let id = inner.next_report_id;
        inner.reports.push(Report {
            id,
            reporter: report.reporter,
            subject: report.subject,
            server_tag: report.server_tag,
            created_at: report.created_at,
            status: ReportStatus::Pending,
            reason: report.reason,
            penalty_kind: None,
            duration_ms: None,
            resolved_by: None,
            resolved_at: None,
        });
        Ok(id)
    }

    async fn resolve_report(&self, id: i64, resolution: Resolution) -> Result<ResolveOutcome> {
        self.check_writable()?;
        let mut inner = self.inner.lock().unwrap();
        let Some(index) = inner.reports.iter().position(|report| report.id == id) else {
            return Ok(ResolveOutcome::NotFound);
        };
        if inner.reports[index].status != ReportStatus::Pending {
            return Ok(ResolveOutcome::AlreadyResolved);
        }
        let subject = inner.reports[index].subject.clone();
        inner.next_action_id += 1;
        let action_id = inner.next_action_id;
        match resolution {
            Resolution::Approve {
                approver,
                reason,
                duration_ms,
                penalty_kind,
                at,
            } => {
                let report = &mut inner.reports[index];
                report.status = ReportStatus::Approved;
                report.penalty_kind = Some(penalty_kind.clone());
                report.duration_ms = Some(duration_ms);
                report.resolved_by = Some(approver.clone());
                report.resolved_at = Some(at);
                inner.actions.push(ActionLogEntry {
                    id: action_id,
                    report_id: id,
                    action: ActionKind::Approve,
                    actor: approver,
                    reason,
                    duration_ms,
                    penalty_kind,
                    created_at: at,
                });
            }
            Resolution::Reject { approver, reason, at } => {
                let report = &mut inner.reports[index];
                report.status = ReportStatus::Rejected;
                report.penalty_kind = Some(String::new());
                report.duration_ms = Some(0);
                report.resolved_by = Some(approver.clone());
                report.resolved_at = Some(at);
                inner.actions.push(ActionLogEntry {
                    id: action_id,
                    report_id: id,
                    action: ActionKind::Reject,
                    actor: approver,
                    reason,
                    duration_ms: 0,
                    penalty_kind: String::new(),
                    created_at: at,
                });
            }
        }
        Ok(ResolveOutcome::Applied { subject })
    }

    async fn report_by_id(&self, id: i64) -> Result<Option<Report>> {
        Ok(self.report(id))
    }

    async fn list_reports(
        &self,
        server_tag: &str,
        filter: StatusFilter,
        order: SortOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ReportSummary>> {
        let inner = self.inner.lock().unwrap();
        let mut matching: Vec<&Report> = inner
            .reports
            .iter()
            .filter(|report| report.server_tag == server_tag)
            .filter(|report| match filter {
                StatusFilter::Only(status) => report.status == status,
                StatusFilter::Any => true,
            })
            .collect();
        match order {
            SortOrder::OldestFirst => {
                matching.sort_by_key(|report| (report.created_at, report.id));
            }
            SortOrder::NewestFirst => {
                matching.sort_by_key(|report| (report.created_at, report.id));
                matching.reverse();
            }
        }
        let summaries = matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|report| ReportSummary {
                id: report.id,
                reporter: report.reporter.clone(),
                subject: report.subject.clone(),
                created_at: report.created_at,
                status: report.status,
                reason: report.reason.clone(),
            })
            .collect();
        Ok(summaries)
    }

    async fn insert_chat_line(&self, line: ChatLine) -> Result<()> {
        self.check_writable()?;
        self.inner.lock().unwrap().chat.push(line);
        Ok(())
    }

    async fn chat_lines_between(
        &self,
        speaker: Uuid,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<ChatLine>> {
        let inner = self.inner.lock().unwrap();
        let mut lines: Vec<ChatLine> = inner
            .chat
            .iter()
            .filter(|line| line.speaker == speaker)
            .filter(|line| line.sent_at >= from && line.sent_at <= to)
            .cloned()
            .collect();
        lines.sort_by_key(|line| line.sent_at);
        Ok(lines)
    }

    async fn top_approvers(&self, since: OffsetDateTime, limit: i64) -> Result<Vec<ApproverCount>> {
        let inner = self.inner.lock().unwrap();
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for entry in &inner.actions {
            if entry.action == ActionKind::Approve && entry.created_at >= since {
                *counts.entry(entry.actor.as_str()).or_insert(0) += 1;
            }
        }
        let mut ranked: Vec<ApproverCount> = counts
            .into_iter()
            .map(|(actor, count)| ApproverCount {
                actor: actor.to_string(),
                count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.actor.cmp(&b.actor)));
        ranked.truncate(limit.max(0) as usize);
        Ok(ranked)
    }
}

// ---------------------------------------------------------------------------
// ScriptedHost — controllable clock, roster and command sink
// ---------------------------------------------------------------------------

struct PlayerState {
    name: String,
    online: bool,
    staff: bool,
}

pub struct ScriptedHost {
    now: Mutex<OffsetDateTime>,
    players: Mutex<HashMap<Uuid, PlayerState>>,
    commands: Mutex<Vec<String>>,
    fail_commands: AtomicBool,
}

impl ScriptedHost {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(OffsetDateTime::from_unix_timestamp(1_750_000_000).unwrap()),
            players: Mutex::new(HashMap::new()),
            commands: Mutex::new(Vec::new()),
            fail_commands: AtomicBool::new(false),
        }
    }

    pub fn join(&self, name: &str, staff: bool) -> Uuid {
        let user = Uuid::new_v4();
        self.players.lock().unwrap().insert(
            user,
            PlayerState {
                name: name.to_string(),
                online: true,
                staff,
            },
        );
        user
    }

    pub fn set_online(&self, user: Uuid, online: bool) {
        if let Some(player) = self.players.lock().unwrap().get_mut(&user) {
            player.online = online;
        }
    }

    pub fn advance(&self, delta: time::Duration) {
        *self.now.lock().unwrap() += delta;
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn set_fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }
}

impl HostRuntime for ScriptedHost {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }

    fn resolve_player_id(&self, name: &str) -> Option<Uuid> {
        self.players
            .lock()
            .unwrap()
            .iter()
            .find(|(_, player)| player.name == name)
            .map(|(user, _)| *user)
    }

    fn player_name(&self, user: Uuid) -> Option<String> {
        self.players
            .lock()
            .unwrap()
            .get(&user)
            .map(|player| player.name.clone())
    }

    fn is_online(&self, user: Uuid) -> bool {
        self.players
            .lock()
            .unwrap()
            .get(&user)
            .map(|player| player.online)
            .unwrap_or(false)
    }

    fn is_staff(&self, user: Uuid) -> bool {
        self.players
            .lock()
            .unwrap()
            .get(&user)
            .map(|player| player.staff)
            .unwrap_or(false)
    }

    fn online_staff(&self) -> Vec<Uuid> {
        self.players
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, player)| player.online && player.staff)
            .map(|(user, _)| *user)
            .collect()
    }

    fn dispatch_command(&self, command: &str) -> Result<()> {
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(anyhow!("command dispatch unavailable"));
        }
        self.commands.lock().unwrap().push(command.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingPresenter — captures everything the engine emits
// ---------------------------------------------------------------------------

pub struct RecordingPresenter {
    views: Mutex<Vec<(Uuid, View)>>,
    messages: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self {
            views: Mutex::new(Vec::new()),
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn views_for(&self, user: Uuid) -> Vec<View> {
        self.views
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| *recipient == user)
            .map(|(_, view)| view.clone())
            .collect()
    }

    pub fn last_view_for(&self, user: Uuid) -> Option<View> {
        self.views_for(user).pop()
    }

    pub fn messages_for(&self, user: Uuid) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| *recipient == user)
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.views.lock().unwrap().clear();
        self.messages.lock().unwrap().clear();
    }
}

impl Presenter for RecordingPresenter {
    fn show(&self, user: Uuid, view: View) {
        self.views.lock().unwrap().push((user, view));
    }

    fn tell(&self, user: Uuid, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((user, message.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub handle: CoordinatorHandle,
    pub store: Arc<MemoryStore>,
    pub host: Arc<ScriptedHost>,
    pub presenter: Arc<RecordingPresenter>,
    pub config: EngineConfig,
    pub messages: Messages,
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        server_tag: SERVER_TAG.to_string(),
        daily_report_limit: 3,
        cooldown_minutes: 10,
        context_lines_shown: 3,
        page_size: 45,
        penalty_commands: vec!["tempban {subject} {duration} {penalty} {approver}".to_string()],
        default_penalty_kind: "mute".to_string(),
        ..EngineConfig::default()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let host = Arc::new(ScriptedHost::new());
        let presenter = Arc::new(RecordingPresenter::new());
        let messages = Messages::default();
        let handle = Coordinator::spawn(
            config.clone(),
            messages.clone(),
            store.clone(),
            host.clone(),
            presenter.clone(),
        );
        Self {
            handle,
            store,
            host,
            presenter,
            config,
            messages,
        }
    }

    pub fn intent(&self, intent: Intent) {
        self.handle.intent(intent);
    }

    /// Wait until every queued intent has been handled and every storage
    /// task has posted its continuation back.
    pub async fn settle(&self) {
        for _ in 0..500 {
            if self.handle.in_flight().await == 0 {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(2)).await;
        }
        panic!("storage pipeline did not settle");
    }

    /// Submit a report through the category panel and wait for it to land.
    pub async fn submit_via_category(&self, user: Uuid, target: &str, category: &str) {
        self.intent(Intent::SubmitReport {
            user,
            target: target.to_string(),
        });
        self.intent(Intent::SelectCategory {
            user,
            label: category.to_string(),
        });
        self.settle().await;
    }
}
