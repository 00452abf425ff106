//! Role-gated view model behind each dashboard.
//!
//! Actions update the local list first. If the store write fails the list is
//! restored, the error is logged and a notice is queued for the user. There
//! are no retries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use passes::auth::Session;
use passes::status::{self, Action};
use passes::{PassRequest, User};
use tracing::{error, warn};

use crate::error::EngineError;
use crate::service::PassService;
use crate::store::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

pub struct Dashboard<S: ?Sized> {
    service: Arc<PassService<S>>,
    session: Session,
    items: Vec<PassRequest>,
    notices: Vec<Notice>,
}

impl<S: DocumentStore + ?Sized> Dashboard<S> {
    pub fn new(service: Arc<PassService<S>>, session: Session) -> Self {
        Self {
            service,
            session,
            items: Vec::new(),
            notices: Vec::new(),
        }
    }

    pub fn user(&self) -> &User {
        &self.session.user
    }

    pub fn items(&self) -> &[PassRequest] {
        &self.items
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn info(&mut self, message: String) {
        self.notices.push(Notice {
            level: NoticeLevel::Info,
            message,
        });
    }

    fn fail(&mut self, context: &str, err: &EngineError) {
        if err.is_store() {
            error!(user = %self.session.user.id, error = %err, "{}", context);
        } else {
            warn!(user = %self.session.user.id, error = %err, "{}", context);
        }
        self.notices.push(Notice {
            level: NoticeLevel::Error,
            message: format!("{}: {}", context, err),
        });
    }

    /// Sweep stale requests, then load the queue.
    pub async fn mount(&mut self, now: DateTime<Utc>) {
        if let Err(e) = self.service.sweep(now).await {
            self.fail("cleanup failed", &e);
        }
        self.refresh(now).await;
    }

    /// Reload the queue. On failure the previous items stay.
    pub async fn refresh(&mut self, now: DateTime<Utc>) -> bool {
        match self.service.queue(&self.session.user, now).await {
            Ok(items) => {
                self.items = items;
                true
            }
            Err(e) => {
                self.fail("could not load requests", &e);
                false
            }
        }
    }

    pub async fn approve(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        self.act(id, Action::Approve, now).await
    }

    pub async fn decline(&mut self, id: &str, reason: Option<String>, now: DateTime<Utc>) -> bool {
        self.act(id, Action::Decline { reason }, now).await
    }

    async fn act(&mut self, id: &str, action: Action, now: DateTime<Utc>) -> bool {
        let snapshot = self.items.clone();
        self.items.retain(|r| r.id != id);

        let user = self.session.user.clone();
        match self.service.act(&user, id, action.clone(), now).await {
            Ok(updated) => {
                self.info(format!("request {} is now {}", id, updated.status));
                true
            }
            Err(e) => {
                self.items = snapshot;
                self.fail(&format!("could not {} request {}", action, id), &e);
                false
            }
        }
    }

    /// Withdraw one of the student's own pending requests.
    pub async fn delete(&mut self, id: &str) -> bool {
        let snapshot = self.items.clone();
        self.items.retain(|r| r.id != id);

        let user = self.session.user.clone();
        match self.service.delete_own(&user, id).await {
            Ok(()) => {
                self.info(format!("request {} deleted", id));
                true
            }
            Err(e) => {
                self.items = snapshot;
                self.fail(&format!("could not delete request {}", id), &e);
                false
            }
        }
    }

    pub async fn approve_all(&mut self, now: DateTime<Utc>) -> usize {
        self.act_all(Action::Approve, now).await
    }

    pub async fn decline_all(&mut self, reason: Option<String>, now: DateTime<Utc>) -> usize {
        self.act_all(Action::Decline { reason }, now).await
    }

    /// Returns how many requests were moved. Items whose write failed are
    /// put back in their original position.
    async fn act_all(&mut self, action: Action, now: DateTime<Utc>) -> usize {
        let role = self.session.user.role;
        let snapshot = self.items.clone();
        self.items.retain(|r| !status::actionable_by(r, role));

        let user = self.session.user.clone();
        let outcomes = match self.service.act_all(&user, action.clone(), now).await {
            Ok(o) => o,
            Err(e) => {
                self.items = snapshot;
                self.fail(&format!("could not {} requests", action), &e);
                return 0;
            }
        };

        let mut failed_ids = Vec::new();
        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                self.fail(&format!("could not {} request {}", action, outcome.id), e);
                failed_ids.push(outcome.id.clone());
            }
        }
        if !failed_ids.is_empty() {
            let keep: Vec<PassRequest> = snapshot
                .into_iter()
                .filter(|r| !status::actionable_by(r, role) || failed_ids.contains(&r.id))
                .collect();
            self.items = keep;
        }

        let done = outcomes.len() - failed_ids.len();
        self.info(format!("{} request(s) {}d", done, action));
        done
    }
}
