//! Error types for metadata-store operations

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataError {
    /// A variable reference chain leads back into itself during expansion.
    /// Lookup absence is never an error; a cycle always is.
    #[error("Circular reference while expanding: {var}")]
    CircularReference { var: String },
}
