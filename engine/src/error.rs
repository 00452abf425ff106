use passes::status::TransitionError;
use passes::PassError;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Pass(#[from] PassError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<TransitionError> for EngineError {
    fn from(e: TransitionError) -> Self {
        EngineError::Pass(PassError::Transition(e))
    }
}

impl EngineError {
    /// Whether the failure came from the store rather than the rules.
    pub fn is_store(&self) -> bool {
        matches!(self, EngineError::Store(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
