//! Pass workflow engine: drives the rules in `passes` against a document store.

pub mod dashboard;
pub mod directory;
pub mod error;
pub mod service;
pub mod store;
pub mod sweeper;

pub use error::EngineError;
pub use service::PassService;
pub use store::{DocumentStore, StoreError, StoreEvent};
