use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkspaceError>;

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Backend {0:?} is not available in this build")]
    Backend(String),

    #[error(transparent)]
    Search(#[from] grepai_search::SearchError),

    #[error(transparent)]
    Store(#[from] grepai_store::StoreError),
}
