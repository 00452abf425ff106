//! Pass-request rules for the hostel workflow: the request model, approval
//! routing, status transitions and expiry policy. Nothing in this crate talks
//! to a store; see the `pass-engine` crate for that.

pub mod assign;
pub mod auth;
pub mod config;
pub mod debounce;
pub mod directory;
pub mod error;
pub mod expiry;
pub mod layout;
pub mod model;
pub mod status;

pub use error::PassError;
pub use model::{PassDraft, PassRequest, PassStatus, PassType, Role, User};
