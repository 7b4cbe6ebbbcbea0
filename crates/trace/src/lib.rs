//! Symbol and reference persistence with bounded call-graph queries.
//!
//! Extractors (tree-sitter based, external to this crate) produce flat
//! [`Symbol`] and [`Reference`] records per file; [`SymbolStore`] persists
//! them and answers `get_call_graph` queries with a forward BFS whose
//! admission rules keep unknown and ambiguous names from joining unrelated
//! subgraphs.

mod error;
mod store;
mod types;

pub use error::{Result, TraceError};
pub use store::{SymbolStore, SYMBOL_STORE_SCHEMA_VERSION};
pub use types::{CallEdge, CallGraph, Reference, Symbol, SymbolKind};
