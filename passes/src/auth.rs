//! Username/credential login against the three user tables.
//!
//! There are no tokens: a successful login yields a [`Session`] holding the
//! user object, which clients persist as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::directory::Directory;
use crate::model::{Role, User};

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid username or credential")]
    InvalidCredentials,

    #[error("not logged in")]
    NoSession,

    #[error("session file {path}: {message}")]
    SessionFile { path: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: User,
    #[serde(rename = "loggedInAt")]
    pub logged_in_at: DateTime<Utc>,
}

impl Session {
    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn save(&self, path: &Path) -> Result<(), AuthError> {
        let io_err = |e: std::io::Error| AuthError::SessionFile {
            path: path.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_vec_pretty(self).map_err(|e| AuthError::SessionFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, json).map_err(io_err)
    }

    /// Load a persisted session; a missing file means nobody is logged in.
    pub fn load(path: &Path) -> Result<Self, AuthError> {
        if !path.exists() {
            return Err(AuthError::NoSession);
        }
        let raw = std::fs::read_to_string(path).map_err(|e| AuthError::SessionFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| AuthError::SessionFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn clear(path: &Path) -> Result<(), AuthError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::SessionFile {
                path: path.display().to_string(),
                message: e.to_string(),
            }),
        }
    }
}

/// Look `username` up in students, then wardens, then HODs. Unknown users and
/// wrong credentials fail the same way.
pub fn login(
    directory: &Directory,
    username: &str,
    credential: &str,
    now: DateTime<Utc>,
) -> Result<Session, AuthError> {
    let username = username.trim();
    let found = [Role::Student, Role::Warden, Role::Hod]
        .into_iter()
        .find_map(|role| directory.table(role).iter().find(|u| u.id == username));

    match found {
        Some(user) if !user.credential.is_empty() && user.credential == credential => {
            debug!(user = %user.id, role = %user.role, "login succeeded");
            Ok(Session {
                user: user.without_credential(),
                logged_in_at: now,
            })
        }
        _ => {
            warn!(%username, "login rejected");
            Err(AuthError::InvalidCredentials)
        }
    }
}
