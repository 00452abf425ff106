use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;

use crate::model::PassType;

const REASON_PREFIX_CHARS: usize = 30;

/// Signature of a submission: requester, type, date and the start of the
/// reason, case- and whitespace-insensitive.
pub fn signature(
    requester_id: &str,
    pass_type: PassType,
    date: Option<NaiveDate>,
    reason: &str,
) -> String {
    let prefix: String = reason
        .trim()
        .to_lowercase()
        .chars()
        .take(REASON_PREFIX_CHARS)
        .collect();
    let date = date.map(|d| d.to_string()).unwrap_or_default();
    format!("{}|{}|{}|{}", requester_id, pass_type, date, prefix)
}

/// In-memory guard against double submissions. Best-effort only: it lives in
/// one process and forgets everything on restart.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    seen: HashMap<String, DateTime<Utc>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    /// Record `sig` and return true, unless the same signature was recorded
    /// within the window.
    pub fn admit(&mut self, sig: &str, now: DateTime<Utc>) -> bool {
        if let Some(last) = self.seen.get(sig) {
            if now - *last < self.window {
                return false;
            }
        }
        self.seen.insert(sig.to_string(), now);
        true
    }

    /// Forget a signature, e.g. after the write it guarded failed.
    pub fn release(&mut self, sig: &str) {
        self.seen.remove(sig);
    }

    /// Drop entries older than the window; returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.seen.len();
        let window = self.window;
        self.seen.retain(|_, at| now - *at < window);
        before - self.seen.len()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
