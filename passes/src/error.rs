use thiserror::Error;

use crate::auth::AuthError;
use crate::status::TransitionError;

#[derive(Error, Debug)]
pub enum PassError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("pass request not found: {id}")]
    NotFound { id: String },

    #[error("not permitted: {reason}")]
    Forbidden { reason: String },

    #[error("duplicate submission suppressed; wait before submitting the same request again")]
    Duplicate,

    #[error("invalid request: {message}")]
    Invalid { message: String },

    #[error("invalid {var}: {message}")]
    Config { var: String, message: String },

    #[error("directory error: {message}")]
    Directory { message: String },
}

impl PassError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        PassError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        PassError::Invalid {
            message: message.into(),
        }
    }
}
