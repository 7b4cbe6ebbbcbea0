//! MCP tools for grepai: workspace discovery, scoped semantic search, and
//! call-graph queries.

use crate::encode::OutputFormat;
use anyhow::{Context as AnyhowContext, Result};
use grepai_search::{SearchConfig, Searcher};
use grepai_trace::SymbolStore;
use grepai_workspace::{
    apply_post_filter, discover_scope, open_embedder, open_store, project_search_scope,
    symbol_store_path, workspace_search_scope, Registry, Scope, SearchScope,
};
use rmcp::handler::server::tool::{Parameters, ToolRouter};
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::schemars;
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;

/// grepai MCP service.
#[derive(Clone)]
pub struct GrepaiService {
    tool_router: ToolRouter<Self>,
}

impl Default for GrepaiService {
    fn default() -> Self {
        Self::new()
    }
}

impl GrepaiService {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    /// Registry location, overridable for tests and sandboxed clients.
    fn registry() -> Result<Registry> {
        if let Ok(path) = std::env::var("GREPAI_WORKSPACES") {
            return Ok(Registry::at(PathBuf::from(path)));
        }
        Registry::open_default().context("resolve workspace registry path")
    }

    async fn resolve_scope(workspace: Option<&str>) -> Result<Scope> {
        let registry = Self::registry()?;
        let workspace = workspace.map(str::trim).filter(|name| !name.is_empty());
        Ok(discover_scope(workspace, None, &registry).await?)
    }
}

#[tool_handler]
impl ServerHandler for GrepaiService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "grepai provides semantic code search and call-graph queries over locally \
                 indexed source trees. Use 'list_workspaces' to discover scopes, 'search' for \
                 natural-language queries scoped by workspace/project/path, and \
                 'get_call_graph' to walk callers into callees."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Tool Input/Output Schemas
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListWorkspacesRequest {
    /// Output encoding: json (default) or toon
    #[schemars(description = "Output encoding: \"json\" (default) or \"toon\"")]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
struct WorkspaceSummary {
    name: String,
    projects: Vec<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListProjectsRequest {
    /// Workspace name
    #[schemars(description = "Workspace to list projects for")]
    pub workspace: String,

    #[schemars(description = "Output encoding: \"json\" (default) or \"toon\"")]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProjectSummary {
    name: String,
    path: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchRequest {
    /// Natural-language query
    #[schemars(description = "Natural language search query")]
    pub query: String,

    #[schemars(description = "Workspace name (defaults to discovery from the current directory)")]
    pub workspace: Option<String>,

    #[schemars(description = "Project name inside the workspace")]
    pub project: Option<String>,

    #[schemars(description = "Path prefix filter, project-relative or absolute")]
    pub path: Option<String>,

    #[schemars(description = "Maximum number of results (1-50, default 10)")]
    pub limit: Option<usize>,

    #[schemars(description = "Output encoding: \"json\" (default) or \"toon\"")]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchHit {
    file: String,
    start_line: usize,
    end_line: usize,
    score: f32,
    content: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct CallGraphRequest {
    /// Root symbol name
    #[schemars(description = "Symbol to start the call graph from")]
    pub symbol: String,

    #[schemars(description = "Traversal depth in edges from the root (1-5, default 2)")]
    pub depth: Option<usize>,

    #[schemars(description = "Workspace name (defaults to discovery from the current directory)")]
    pub workspace: Option<String>,

    #[schemars(description = "Output encoding: \"json\" (default) or \"toon\"")]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
struct CallGraphEdgeOut {
    caller: String,
    callee: String,
    file: String,
    line: usize,
}

// ============================================================================
// Tool Implementations
// ============================================================================

fn tool_error(err: impl std::fmt::Display) -> CallToolResult {
    CallToolResult::error(vec![Content::text(format!("Error: {err}"))])
}

fn encoded_result(format: Option<&str>, value: &serde_json::Value) -> CallToolResult {
    let format = match OutputFormat::parse(format) {
        Ok(format) => format,
        Err(err) => return tool_error(err),
    };
    match format.encode(value) {
        Ok(text) => CallToolResult::success(vec![Content::text(text)]),
        Err(err) => tool_error(err),
    }
}

#[tool_router]
impl GrepaiService {
    /// List configured workspaces
    #[tool(
        description = "List configured workspaces and their projects. Use this first to discover searchable scopes."
    )]
    pub async fn list_workspaces(
        &self,
        Parameters(request): Parameters<ListWorkspacesRequest>,
    ) -> Result<CallToolResult, McpError> {
        let registry = match Self::registry() {
            Ok(registry) => registry,
            Err(err) => return Ok(tool_error(err)),
        };
        let config = match registry.load().await {
            Ok(config) => config,
            Err(err) => return Ok(tool_error(err)),
        };

        let workspaces: Vec<WorkspaceSummary> = config
            .workspaces
            .iter()
            .map(|ws| WorkspaceSummary {
                name: ws.name.clone(),
                projects: ws.projects.iter().map(|p| p.name.clone()).collect(),
            })
            .collect();

        let value = serde_json::json!({ "workspaces": workspaces });
        Ok(encoded_result(request.format.as_deref(), &value))
    }

    /// List projects of one workspace
    #[tool(description = "List the projects of a workspace with their root paths.")]
    pub async fn list_projects(
        &self,
        Parameters(request): Parameters<ListProjectsRequest>,
    ) -> Result<CallToolResult, McpError> {
        let registry = match Self::registry() {
            Ok(registry) => registry,
            Err(err) => return Ok(tool_error(err)),
        };
        let workspace = match registry.workspace(request.workspace.trim()).await {
            Ok(workspace) => workspace,
            Err(err) => return Ok(tool_error(err)),
        };

        let projects: Vec<ProjectSummary> = workspace
            .projects
            .iter()
            .map(|project| ProjectSummary {
                name: project.name.clone(),
                path: project.path.display().to_string(),
            })
            .collect();

        let value = serde_json::json!({
            "workspace": workspace.name,
            "projects": projects,
        });
        Ok(encoded_result(request.format.as_deref(), &value))
    }

    /// Semantic code search
    #[tool(
        description = "Search indexed code with natural language. Scope with workspace/project, and narrow further with a path prefix (relative to the project, or absolute)."
    )]
    pub async fn search(
        &self,
        Parameters(request): Parameters<SearchRequest>,
    ) -> Result<CallToolResult, McpError> {
        if request.query.trim().is_empty() {
            return Ok(tool_error("query cannot be empty"));
        }
        let limit = request.limit.unwrap_or(10).clamp(1, 50);
        let user_path = request.path.as_deref().unwrap_or("");
        let project = request.project.as_deref().unwrap_or("");

        let scope = match Self::resolve_scope(request.workspace.as_deref()).await {
            Ok(scope) => scope,
            Err(err) => return Ok(tool_error(err)),
        };

        let (store_settings, embedder_settings, search_scope) = match &scope {
            Scope::Workspace(workspace) => {
                let search_scope = match workspace_search_scope(workspace, project, user_path) {
                    Ok(search_scope) => search_scope,
                    Err(err) => return Ok(tool_error(err)),
                };
                (&workspace.store, &workspace.embedder, search_scope)
            }
            Scope::Project { root, marker } => {
                if !project.is_empty() {
                    return Ok(tool_error(
                        "project filter requires a workspace; this scope is a single project",
                    ));
                }
                let search_scope = match project_search_scope(root, user_path) {
                    Ok(search_scope) => search_scope,
                    Err(err) => return Ok(tool_error(err)),
                };
                (&marker.store, &marker.embedder, search_scope)
            }
        };

        let store = match open_store(store_settings).await {
            Ok(store) => store,
            Err(err) => return Ok(tool_error(err)),
        };
        let embedder = match open_embedder(embedder_settings) {
            Ok(embedder) => embedder,
            Err(err) => return Ok(tool_error(err)),
        };

        let searcher = Searcher::new(store, embedder, SearchConfig::default());
        let SearchScope {
            search_prefix,
            post_filter,
        } = search_scope;

        let results = match searcher.search(&request.query, limit, &search_prefix).await {
            Ok(results) => results,
            Err(err) => return Ok(tool_error(err)),
        };
        let results = match &post_filter {
            Some(filter) => apply_post_filter(results, filter),
            None => results,
        };

        let hits: Vec<SearchHit> = results
            .into_iter()
            .map(|result| SearchHit {
                file: result.chunk.file_path,
                start_line: result.chunk.start_line,
                end_line: result.chunk.end_line,
                score: result.score,
                content: result.chunk.content,
            })
            .collect();

        let value = serde_json::json!({
            "query": request.query,
            "results": hits,
        });
        Ok(encoded_result(request.format.as_deref(), &value))
    }

    /// Call-graph query
    #[tool(
        description = "Walk the forward call graph from a symbol: who it calls, and transitively who those call, bounded by depth. Unknown or ambiguous callees terminate traversal but keep their edge."
    )]
    pub async fn get_call_graph(
        &self,
        Parameters(request): Parameters<CallGraphRequest>,
    ) -> Result<CallToolResult, McpError> {
        if request.symbol.trim().is_empty() {
            return Ok(tool_error("symbol cannot be empty"));
        }
        let depth = request.depth.unwrap_or(2).clamp(1, 5);

        let scope = match Self::resolve_scope(request.workspace.as_deref()).await {
            Ok(scope) => scope,
            Err(err) => return Ok(tool_error(err)),
        };
        let store_path = match symbol_store_path(&scope) {
            Ok(path) => path,
            Err(err) => return Ok(tool_error(err)),
        };

        let store = match SymbolStore::open(&store_path).await {
            Ok(store) => store,
            Err(err) => return Ok(tool_error(err)),
        };
        let graph = match store.get_call_graph(request.symbol.trim(), depth).await {
            Ok(graph) => graph,
            Err(err) => return Ok(tool_error(err)),
        };

        let edges: Vec<CallGraphEdgeOut> = graph
            .edges
            .iter()
            .map(|edge| CallGraphEdgeOut {
                caller: edge.caller.clone(),
                callee: edge.callee.clone(),
                file: edge.file.clone(),
                line: edge.line,
            })
            .collect();

        let value = serde_json::json!({
            "root": request.symbol.trim(),
            "depth": depth,
            "nodes": graph.nodes,
            "edges": edges,
        });
        Ok(encoded_result(request.format.as_deref(), &value))
    }
}
