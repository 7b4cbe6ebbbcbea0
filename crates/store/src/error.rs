use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt store at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("Backend error: {0}")]
    Backend(String),
}
