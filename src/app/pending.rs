use std::collections::HashMap;

use uuid::Uuid;

/// One step of an in-flight free-text capture sequence. Each variant carries
/// exactly the values the next chat message needs to make progress; steps
/// advance only through `begin`/`consume`, never by mutating in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingFlow {
    CustomReason,
    ApprovalDuration { report_id: i64 },
    ApprovalReason { report_id: i64, duration_ms: i64 },
    RejectionReason { report_id: i64 },
}

/// At most one flow per user. Single-writer from the authority task, so no
/// interior locking.
#[derive(Default)]
pub struct PendingInputRegistry {
    flows: HashMap<Uuid, PendingFlow>,
}

impl PendingInputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm a flow for a user, silently discarding any unfinished older one;
    /// opening a new prompt supersedes whatever was awaiting input before.
    pub fn begin(&mut self, user: Uuid, flow: PendingFlow) {
        self.flows.insert(user, flow);
    }

    /// Remove and return the user's current flow, if any.
    pub fn consume(&mut self, user: Uuid) -> Option<PendingFlow> {
        self.flows.remove(&user)
    }

    /// Remove without returning; used when the user disconnects.
    pub fn cancel(&mut self, user: Uuid) {
        self.flows.remove(&user);
    }
}
