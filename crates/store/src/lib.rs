//! # grepai Vector Store
//!
//! Chunk persistence and similarity search for grepai indexes.
//!
//! A [`VectorStore`] holds code chunks with their embedding vectors and
//! answers nearest-neighbor queries scoped by a path prefix. The trait is the
//! seam between the search core and concrete backends; [`LocalStore`] is the
//! embedded single-file backend used for development and tests.
//!
//! ## Example
//!
//! ```no_run
//! use grepai_store::{Chunk, LocalStore, SearchOptions, VectorStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = LocalStore::open("index.json").await?;
//!
//!     let results = store
//!         .search(&[0.1, 0.9, 0.0], 10, &SearchOptions::default())
//!         .await?;
//!
//!     for result in results {
//!         println!("{}: {:.3}", result.chunk.file_path, result.score);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod error;
mod local;
mod traits;
mod types;

pub use error::{Result, StoreError};
pub use local::{LocalStore, LOCAL_STORE_SCHEMA_VERSION};
pub use traits::VectorStore;
pub use types::{
    chunk_hash, unix_timestamp, Chunk, Document, FileStats, SearchOptions, SearchResult,
    StoreStats,
};
