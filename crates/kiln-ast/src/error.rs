//! Error types for statement evaluation and finalization

use thiserror::Error;

use kiln_data::DataError;

pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Debug, Error)]
pub enum EvalError {
    /// Expected control-flow signal: the unit declines to be built.
    /// Caught per variant during finalization, never treated as fatal.
    #[error("Unit skipped: {0}")]
    Skipped(String),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error("Include of '{path}' failed: {reason}")]
    IncludeFailed { path: String, reason: String },

    #[error("Inherit of '{class}' failed: {reason}")]
    InheritFailed { class: String, reason: String },

    #[error("Script execution failed: {0}")]
    Script(String),

    #[error("Provider error: {0}")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EvalError {
    /// Skip signal carrying the reason later recorded on the store
    pub fn skipped(reason: impl Into<String>) -> Self {
        EvalError::Skipped(reason.into())
    }

    /// Wrap an arbitrary collaborator error
    pub fn provider(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        EvalError::Provider(Box::new(err))
    }

    /// Whether this is the expected per-variant skip signal
    pub fn is_skip(&self) -> bool {
        matches!(self, EvalError::Skipped(_))
    }
}
