use chrono::{DateTime, Duration, Utc};

use crate::model::{PassRequest, PassStatus};

/// Age thresholds for requests and granted passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    /// Requests older than this are deleted regardless of status.
    pub retention: Duration,
    /// How long a warden-approved pass stays valid.
    pub grant_window: Duration,
    /// Requests this close to deletion are flagged urgent.
    pub urgent_window: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            retention: Duration::days(3),
            grant_window: Duration::hours(24),
            urgent_window: Duration::hours(24),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayState {
    Active,
    Urgent,
    PassExpired,
    Stale,
}

impl ExpiryPolicy {
    pub fn deletion_due_at(&self, request: &PassRequest) -> DateTime<Utc> {
        request.created_at + self.retention
    }

    /// `now - createdAt > retention`.
    pub fn is_stale(&self, request: &PassRequest, now: DateTime<Utc>) -> bool {
        now - request.created_at > self.retention
    }

    /// Time left before the sweep deletes the request; negative once stale.
    pub fn time_until_deletion(&self, request: &PassRequest, now: DateTime<Utc>) -> Duration {
        self.deletion_due_at(request) - now
    }

    /// `0 < (createdAt + retention) - now <= urgent_window`.
    pub fn is_urgent(&self, request: &PassRequest, now: DateTime<Utc>) -> bool {
        let left = self.time_until_deletion(request, now);
        left > Duration::zero() && left <= self.urgent_window
    }

    /// A granted pass past its `expiresAt`. Display-only; deletion still
    /// follows the retention rule.
    pub fn is_pass_expired(&self, request: &PassRequest, now: DateTime<Utc>) -> bool {
        request.status == PassStatus::WardenApproved
            && request.expires_at.map(|at| now > at).unwrap_or(false)
    }

    pub fn display_state(&self, request: &PassRequest, now: DateTime<Utc>) -> DisplayState {
        if self.is_stale(request, now) {
            DisplayState::Stale
        } else if self.is_pass_expired(request, now) {
            DisplayState::PassExpired
        } else if self.is_urgent(request, now) {
            DisplayState::Urgent
        } else {
            DisplayState::Active
        }
    }

    /// Ids of every request the hard-delete rule applies to.
    pub fn stale_ids<'a, I>(&self, requests: I, now: DateTime<Utc>) -> Vec<String>
    where
        I: IntoIterator<Item = &'a PassRequest>,
    {
        requests
            .into_iter()
            .filter(|r| self.is_stale(r, now))
            .map(|r| r.id.clone())
            .collect()
    }
}
