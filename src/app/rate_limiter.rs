use std::collections::HashMap;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitCheck {
    Allowed,
    DailyLimitExceeded,
    CooldownActive,
}

/// In-memory submission throttle: a per-submitter daily quota plus a
/// cooldown between accepted submissions. Counters survive disconnects and
/// are cleared all at once on the global 24-hour cycle, not per user.
/// Single-writer from the authority task.
pub struct RateLimiter {
    daily_limit: u32,
    cooldown: Duration,
    submitted_today: HashMap<Uuid, u32>,
    last_submission: HashMap<Uuid, OffsetDateTime>,
}

impl RateLimiter {
    pub fn new(daily_limit: u32, cooldown_minutes: u64) -> Self {
        Self {
            daily_limit,
            cooldown: Duration::minutes(cooldown_minutes as i64),
            submitted_today: HashMap::new(),
            last_submission: HashMap::new(),
        }
    }

    /// Quota is checked before cooldown, so a submitter who is both out of
    /// quota and cooling down hears about the quota.
    pub fn check(&self, user: Uuid, now: OffsetDateTime) -> SubmitCheck {
        let used = self.submitted_today.get(&user).copied().unwrap_or(0);
        if used >= self.daily_limit {
            return SubmitCheck::DailyLimitExceeded;
        }
        if let Some(last) = self.last_submission.get(&user) {
            if now - *last < self.cooldown {
                return SubmitCheck::CooldownActive;
            }
        }
        SubmitCheck::Allowed
    }

    /// Called exactly once per accepted submission, after the store write
    /// succeeded; a failed write must not consume quota.
    pub fn record(&mut self, user: Uuid, now: OffsetDateTime) {
        *self.submitted_today.entry(user).or_insert(0) += 1;
        self.last_submission.insert(user, now);
    }

    pub fn reset_all(&mut self) {
        self.submitted_today.clear();
    }
}
