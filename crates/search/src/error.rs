use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Store error: {0}")]
    Store(#[from] grepai_store::StoreError),

    #[error("Embedder error: {0}")]
    Embed(#[from] grepai_embedder::EmbedError),

    #[error("Path error: {0}")]
    Path(String),
}
