//! Pass workflow operations over a document store.
//!
//! Every write is a plain read-modify-write against the store: there is no
//! optimistic concurrency control and the last writer wins.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use futures_util::stream::{BoxStream, StreamExt};
use serde_json::Value;
use tracing::{error, info, warn};

use passes::assign;
use passes::auth::{self, Session};
use passes::config::PassesConfig;
use passes::debounce::{self, Debouncer};
use passes::directory::Directory;
use passes::layout::{self, StoredRequest, REQUESTS_ROOT};
use passes::status::{self, Action};
use passes::model::LEGACY_FIELD_NAMES;
use passes::{PassDraft, PassError, PassRequest, PassStatus, PassType, Role, User};

use crate::directory::load_directory;
use crate::error::EngineResult;
use crate::store::{DocumentStore, StoreError, StoreEvent};
use crate::sweeper::{self, SweepReport};

/// Result of one request within a bulk action.
#[derive(Debug)]
pub struct BulkOutcome {
    pub id: String,
    pub result: EngineResult<PassStatus>,
}

/// A change to the `passRequests` tree, already normalised.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestChange {
    Upserted(PassRequest),
    Removed { id: String },
}

pub struct PassService<S: ?Sized> {
    store: Arc<S>,
    directory: Directory,
    config: PassesConfig,
    debouncer: Mutex<Debouncer>,
}

impl<S: DocumentStore + ?Sized> PassService<S> {
    pub fn new(store: Arc<S>, directory: Directory, config: PassesConfig) -> Self {
        let debouncer = Mutex::new(Debouncer::new(config.debounce_window));
        Self {
            store,
            directory,
            config,
            debouncer,
        }
    }

    /// Build a service whose directory is read from the store's user tables.
    pub async fn from_store(store: Arc<S>, config: PassesConfig) -> EngineResult<Self> {
        let directory = load_directory(&*store).await?;
        Ok(Self::new(store, directory, config))
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn config(&self) -> &PassesConfig {
        &self.config
    }

    fn debouncer(&self) -> MutexGuard<'_, Debouncer> {
        self.debouncer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn login(&self, username: &str, credential: &str, now: DateTime<Utc>) -> EngineResult<Session> {
        Ok(auth::login(&self.directory, username, credential, now).map_err(PassError::from)?)
    }

    /// All requests from both layouts, newest first, including stale ones.
    pub async fn fetch_stored(&self) -> EngineResult<Vec<StoredRequest>> {
        let docs = self.store.list(REQUESTS_ROOT).await?;
        Ok(layout::merge(docs))
    }

    /// All live requests from both layouts, newest first. Requests past the
    /// retention window are left out even before the sweep removes them.
    pub async fn fetch_all(&self, now: DateTime<Utc>) -> EngineResult<Vec<PassRequest>> {
        Ok(self
            .live(now)
            .await?
            .into_iter()
            .map(|s| s.request)
            .collect())
    }

    async fn live(&self, now: DateTime<Utc>) -> EngineResult<Vec<StoredRequest>> {
        let policy = self.config.expiry;
        Ok(self
            .fetch_stored()
            .await?
            .into_iter()
            .filter(|s| !policy.is_stale(&s.request, now))
            .collect())
    }

    pub async fn get(&self, id: &str) -> EngineResult<Option<StoredRequest>> {
        Ok(self
            .fetch_stored()
            .await?
            .into_iter()
            .find(|s| s.request.id == id))
    }

    async fn locate(&self, id: &str) -> EngineResult<StoredRequest> {
        self.get(id).await?.ok_or_else(|| {
            PassError::NotFound { id: id.to_string() }.into()
        })
    }

    /// Submit a new request for `student`. Identical submissions inside the
    /// debounce window are rejected with [`PassError::Duplicate`].
    pub async fn submit(
        &self,
        student: &User,
        draft: PassDraft,
        now: DateTime<Utc>,
    ) -> EngineResult<PassRequest> {
        if student.role != Role::Student {
            return Err(PassError::forbidden("only students can submit pass requests").into());
        }
        validate_draft(&draft)?;

        let sig = debounce::signature(&student.id, draft.pass_type, Some(draft.date), &draft.reason);
        if !self.debouncer().admit(&sig, now) {
            info!(student = %student.id, "duplicate submission suppressed");
            return Err(PassError::Duplicate.into());
        }

        let mut request = PassRequest::new(student, draft, now);
        let assignment = assign::resolve(
            &self.directory,
            &self.config.departments,
            request.pass_type,
            &request.block,
            &request.department,
        );
        request.assigned_warden = assignment.warden;
        request.assigned_hod = assignment.hod;

        let value = serde_json::to_value(&request).map_err(StoreError::from)?;
        match self
            .store
            .push(&layout::requester_folder(&student.id), value)
            .await
        {
            Ok(key) => {
                request.id = key;
                info!(
                    id = %request.id,
                    student = %student.id,
                    pass_type = %request.pass_type,
                    warden = ?request.assigned_warden,
                    hod = ?request.assigned_hod,
                    "pass request submitted"
                );
                Ok(request)
            }
            Err(e) => {
                self.debouncer().release(&sig);
                error!(student = %student.id, error = %e, "failed to store pass request");
                Err(e.into())
            }
        }
    }

    /// Whether `actor` is the approver this request routes to. Unassigned
    /// requests fall back to the block and department tables.
    pub fn in_scope(&self, actor: &User, request: &PassRequest) -> bool {
        match actor.role {
            Role::Student => request.requester_id == actor.id,
            Role::Hod => {
                request.pass_type == PassType::HomeVisit
                    && match &request.assigned_hod {
                        Some(hod) => hod == &actor.id,
                        None => {
                            self.config.departments.hod_for(&request.department)
                                == Some(actor.id.as_str())
                        }
                    }
            }
            Role::Warden => match &request.assigned_warden {
                Some(warden) => warden == &actor.id,
                None => actor.block.as_deref() == Some(request.block.as_str()),
            },
        }
    }

    fn ensure_in_scope(&self, actor: &User, request: &PassRequest) -> EngineResult<()> {
        if self.in_scope(actor, request) {
            Ok(())
        } else {
            Err(PassError::forbidden(format!(
                "request {} is not routed to {}",
                request.id, actor.id
            ))
            .into())
        }
    }

    /// Apply `action` to one request on behalf of `actor`.
    pub async fn act(
        &self,
        actor: &User,
        id: &str,
        action: Action,
        now: DateTime<Utc>,
    ) -> EngineResult<PassRequest> {
        let mut stored = self.locate(id).await?;
        if self.config.expiry.is_stale(&stored.request, now) {
            return Err(PassError::NotFound { id: id.to_string() }.into());
        }
        self.ensure_in_scope(actor, &stored.request)?;
        status::apply(
            &mut stored.request,
            actor,
            &action,
            now,
            self.config.expiry.grant_window,
        )?;
        self.write_back(&stored).await?;
        info!(
            id = %stored.request.id,
            status = %stored.request.status,
            actor = %actor.id,
            "pass request updated"
        );
        Ok(stored.request)
    }

    pub async fn approve(&self, actor: &User, id: &str, now: DateTime<Utc>) -> EngineResult<PassRequest> {
        self.act(actor, id, Action::Approve, now).await
    }

    pub async fn decline(
        &self,
        actor: &User,
        id: &str,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<PassRequest> {
        self.act(actor, id, Action::Decline { reason }, now).await
    }

    /// Approve everything in the actor's queue.
    pub async fn approve_all(&self, actor: &User, now: DateTime<Utc>) -> EngineResult<Vec<BulkOutcome>> {
        self.act_all(actor, Action::Approve, now).await
    }

    /// Decline everything in the actor's queue.
    pub async fn decline_all(
        &self,
        actor: &User,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<BulkOutcome>> {
        self.act_all(actor, Action::Decline { reason }, now).await
    }

    pub async fn act_all(
        &self,
        actor: &User,
        action: Action,
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<BulkOutcome>> {
        if actor.role == Role::Student {
            return Err(PassError::forbidden("students cannot approve or decline requests").into());
        }

        let mut outcomes = Vec::new();
        for mut stored in self.live(now).await? {
            if !self.in_scope(actor, &stored.request) || !status::actionable_by(&stored.request, actor.role) {
                continue;
            }
            let id = stored.request.id.clone();
            let result = match status::apply(
                &mut stored.request,
                actor,
                &action,
                now,
                self.config.expiry.grant_window,
            ) {
                Ok(next) => self.write_back(&stored).await.map(|_| next),
                Err(e) => Err(e.into()),
            };
            if let Err(e) = &result {
                warn!(%id, actor = %actor.id, error = %e, "bulk {} failed", action);
            }
            outcomes.push(BulkOutcome { id, result });
        }

        info!(
            actor = %actor.id,
            action = %action,
            total = outcomes.len(),
            failed = outcomes.iter().filter(|o| o.result.is_err()).count(),
            "bulk action finished"
        );
        Ok(outcomes)
    }

    /// Merge the normalised request into its document, dropping legacy
    /// field names so the record stays readable.
    async fn write_back(&self, stored: &StoredRequest) -> EngineResult<()> {
        let Value::Object(mut fields) = serde_json::to_value(&stored.request).map_err(StoreError::from)? else {
            return Err(StoreError::Backend("pass request did not serialise to an object".into()).into());
        };
        for name in LEGACY_FIELD_NAMES {
            fields.insert((*name).to_string(), Value::Null);
        }
        self.store.update(&stored.path, fields).await?;
        Ok(())
    }

    /// Withdraw a request. Only the requester may, and only while pending.
    pub async fn delete_own(&self, student: &User, id: &str) -> EngineResult<()> {
        let stored = self.locate(id).await?;
        if stored.request.requester_id != student.id {
            return Err(PassError::forbidden("only the requester can delete a pass request").into());
        }
        if stored.request.status != PassStatus::Pending {
            return Err(PassError::forbidden(format!(
                "request {} is {} and can no longer be deleted",
                id, stored.request.status
            ))
            .into());
        }
        self.store.remove(&stored.path).await?;
        info!(%id, student = %student.id, "pass request withdrawn");
        Ok(())
    }

    /// The role-filtered view: a student's own requests, or what is waiting
    /// on this HOD or warden. Newest first.
    pub async fn queue(&self, actor: &User, now: DateTime<Utc>) -> EngineResult<Vec<PassRequest>> {
        Ok(self
            .live(now)
            .await?
            .into_iter()
            .map(|s| s.request)
            .filter(|r| match actor.role {
                Role::Student => r.requester_id == actor.id,
                Role::Hod | Role::Warden => {
                    self.in_scope(actor, r) && status::actionable_by(r, actor.role)
                }
            })
            .collect())
    }

    /// Requests `actor` has approved or declined.
    pub async fn history(&self, actor: &User, now: DateTime<Utc>) -> EngineResult<Vec<PassRequest>> {
        Ok(self
            .fetch_all(now)
            .await?
            .into_iter()
            .filter(|r| r.acted_on_by(&actor.id))
            .collect())
    }

    /// Hard-delete every request past the retention window.
    pub async fn sweep(&self, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        Ok(sweeper::sweep_once(&*self.store, &self.config.expiry, now).await?)
    }

    /// Sweep plus housekeeping of in-memory state.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        let mut report = self.sweep(now).await?;
        report.pruned = self.debouncer().prune(now);
        Ok(report)
    }

    /// Live changes to any request, normalised from either layout.
    pub async fn subscribe(&self) -> EngineResult<BoxStream<'static, RequestChange>> {
        let events = self.store.subscribe(REQUESTS_ROOT).await?;
        Ok(events
            .filter_map(|event| {
                let change = match event {
                    StoreEvent::Put { path, value } => {
                        layout::decode(&path, value).map(|s| RequestChange::Upserted(s.request))
                    }
                    StoreEvent::Removed { path } => layout::classify(&path)
                        .map(|(_, id)| RequestChange::Removed { id: id.to_string() }),
                };
                futures_util::future::ready(change)
            })
            .boxed())
    }
}

fn validate_draft(draft: &PassDraft) -> Result<(), PassError> {
    if draft.reason.trim().is_empty() {
        return Err(PassError::invalid("a reason is required"));
    }
    if draft.pass_type == PassType::HomeVisit && draft.return_date.is_none() {
        return Err(PassError::invalid("home visits need a return date"));
    }
    if let Some(back) = draft.return_date {
        if back < draft.date {
            return Err(PassError::invalid("return date is before the departure date"));
        }
    }
    Ok(())
}
