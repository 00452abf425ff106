//! Approval state machine.
//!
//! ```text
//! outing:      pending --warden--> warden_approved
//! home_visit:  pending --hod--> hod_approved --warden--> warden_approved
//! ```
//!
//! Either approver may decline from the state they act on. `warden_approved`
//! and `declined` are terminal.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use thiserror::Error;

use crate::model::{PassRequest, PassStatus, PassType, Role, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Approve,
    Decline { reason: Option<String> },
}

impl Action {
    pub fn decline() -> Self {
        Action::Decline { reason: None }
    }

    fn verb(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Decline { .. } => "decline",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{role} cannot {action} a {pass_type} request in state {status}")]
pub struct TransitionError {
    pub role: Role,
    pub action: &'static str,
    pub pass_type: PassType,
    pub status: PassStatus,
}

/// Next status for `action` taken by `role`, or an error when the role has no
/// such edge from `status`.
pub fn transition(
    pass_type: PassType,
    status: PassStatus,
    role: Role,
    action: &Action,
) -> Result<PassStatus, TransitionError> {
    use PassStatus::*;

    let approving = matches!(action, Action::Approve);
    let next = match (pass_type, status, role) {
        (PassType::Outing, Pending, Role::Warden) => Some(if approving {
            WardenApproved
        } else {
            Declined
        }),
        (PassType::HomeVisit, Pending, Role::Hod) => Some(if approving {
            HodApproved
        } else {
            Declined
        }),
        (PassType::HomeVisit, HodApproved, Role::Warden) => Some(if approving {
            WardenApproved
        } else {
            Declined
        }),
        _ => None,
    };

    next.ok_or(TransitionError {
        role,
        action: action.verb(),
        pass_type,
        status,
    })
}

/// Decline is only ever offered on requests still moving through the chain.
pub fn can_decline(status: PassStatus) -> bool {
    !status.is_terminal()
}

/// Whether `role` has any edge out of the request's current state.
pub fn actionable_by(request: &PassRequest, role: Role) -> bool {
    transition(request.pass_type, request.status, role, &Action::Approve).is_ok()
}

/// Validate and apply `action` by `actor`, stamping approver and timing
/// fields. A warden approval starts the pass window of `grant_window`.
pub fn apply(
    request: &mut PassRequest,
    actor: &User,
    action: &Action,
    now: DateTime<Utc>,
    grant_window: Duration,
) -> Result<PassStatus, TransitionError> {
    let next = transition(request.pass_type, request.status, actor.role, action)?;

    match next {
        PassStatus::HodApproved => {
            request.hod_approved_by = Some(actor.id.clone());
            request.hod_approved_at = Some(now);
        }
        PassStatus::WardenApproved => {
            request.warden_approved_by = Some(actor.id.clone());
            request.granted_at = Some(now);
            request.expires_at = Some(now + grant_window);
        }
        PassStatus::Declined => {
            request.declined_by = Some(actor.id.clone());
            request.declined_at = Some(now);
            if let Action::Decline { reason } = action {
                request.decline_reason = reason.clone().filter(|r| !r.trim().is_empty());
            }
        }
        PassStatus::Pending => {}
    }

    tracing::debug!(
        id = %request.id,
        from = %request.status,
        to = %next,
        actor = %actor.id,
        "pass status transition"
    );
    request.status = next;
    Ok(next)
}
