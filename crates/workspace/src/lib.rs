//! Workspace configuration and query scoping.
//!
//! A workspace groups one or more project roots behind one store and one
//! embedder. This crate loads the per-user workspace registry, discovers the
//! active workspace or project from a name, a path, or the current
//! directory, and composes the path prefix pushed down to the store for a
//! scoped search — falling back to a post-filter only for the single
//! combination the store cannot resolve on its own.

mod config;
mod error;
mod marker;
mod scope;

pub use config::{
    EmbedderSettings, ProjectEntry, Registry, StoreSettings, Workspace, WorkspaceConfig,
    WORKSPACE_CONFIG_VERSION,
};
pub use error::{Result, WorkspaceError};
pub use marker::{find_project_marker, load_project_marker, ProjectMarker, MARKER_RELATIVE_PATH};
pub use scope::{
    apply_post_filter, discover_scope, open_embedder, open_store, project_search_scope,
    symbol_store_path, workspace_search_scope, PostFilter, Scope, SearchScope,
};
