//! grepai command line: scoped semantic search, call-graph queries, and
//! workspace inspection over locally built indexes. Indexing itself is
//! driven by the chunking host; this binary only queries.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use grepai_search::{SearchConfig, Searcher};
use grepai_store::VectorStore;
use grepai_trace::SymbolStore;
use grepai_workspace::{
    apply_post_filter, discover_scope, open_embedder, open_store, project_search_scope,
    symbol_store_path, workspace_search_scope, Registry, Scope, SearchScope,
};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grepai")]
#[command(about = "Local semantic code search with call-graph queries", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workspace name (defaults to discovery from the current directory)
    #[arg(long, global = true)]
    workspace: Option<String>,

    /// Override the workspace registry file
    #[arg(long, global = true, env = "GREPAI_WORKSPACES")]
    registry: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search indexed code with a natural-language query
    Search {
        query: String,

        /// Project name inside the workspace
        #[arg(long)]
        project: Option<String>,

        /// Path prefix filter, project-relative or absolute
        #[arg(long)]
        path: Option<String>,

        /// Maximum number of results
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Walk the forward call graph from a symbol
    Trace {
        symbol: String,

        /// Traversal depth in edges from the root
        #[arg(long, default_value_t = 2)]
        depth: usize,

        /// Print the graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// List known symbols, optionally filtered by name prefix
    Symbols {
        prefix: Option<String>,
    },

    /// Inspect the workspace registry
    #[command(subcommand)]
    Workspace(WorkspaceCommands),

    /// Show index statistics for the active scope
    Stats,

    /// Read documents stored alongside the index
    #[command(subcommand)]
    Docs(DocsCommands),
}

#[derive(Subcommand)]
enum DocsCommands {
    /// List stored documents
    List,
    /// Print one document by name
    Get { name: String },
}

#[derive(Subcommand)]
enum WorkspaceCommands {
    /// List configured workspaces
    List,
    /// List the projects of one workspace
    Projects { name: String },
}

fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn registry_from(cli: &Cli) -> Result<Registry> {
    match &cli.registry {
        Some(path) => Ok(Registry::at(path.clone())),
        None => Ok(Registry::open_default()?),
    }
}

async fn resolve_scope(cli: &Cli) -> Result<Scope> {
    let registry = registry_from(cli)?;
    let workspace = cli
        .workspace
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    Ok(discover_scope(workspace, None, &registry).await?)
}

async fn run_search(
    cli: &Cli,
    query: &str,
    project: Option<&str>,
    path: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let scope = resolve_scope(cli).await?;
    let project = project.unwrap_or("");
    let user_path = path.unwrap_or("");

    let (store_settings, embedder_settings, search_scope) = match &scope {
        Scope::Workspace(workspace) => {
            let search_scope = workspace_search_scope(workspace, project, user_path)?;
            (&workspace.store, &workspace.embedder, search_scope)
        }
        Scope::Project { root, marker } => {
            if !project.is_empty() {
                bail!("--project requires --workspace; the active scope is a single project");
            }
            let search_scope = project_search_scope(root, user_path)?;
            (&marker.store, &marker.embedder, search_scope)
        }
    };

    let store = open_store(store_settings).await?;
    let embedder = open_embedder(embedder_settings)?;
    let searcher = Searcher::new(store, embedder, SearchConfig::default());

    let SearchScope {
        search_prefix,
        post_filter,
    } = search_scope;
    let results = searcher.search(query, limit, &search_prefix).await?;
    let results = match &post_filter {
        Some(filter) => apply_post_filter(results, filter),
        None => results,
    };

    if json {
        let hits: Vec<serde_json::Value> = results
            .iter()
            .map(|result| {
                serde_json::json!({
                    "file": result.chunk.file_path,
                    "start_line": result.chunk.start_line,
                    "end_line": result.chunk.end_line,
                    "score": result.score,
                    "content": result.chunk.content,
                })
            })
            .collect();
        return print_stdout(&serde_json::to_string_pretty(&hits)?);
    }

    if results.is_empty() {
        return print_stdout("No results.");
    }
    for result in results {
        print_stdout(&format!(
            "{}:{}-{}  ({:.3})",
            result.chunk.file_path, result.chunk.start_line, result.chunk.end_line, result.score
        ))?;
        for line in result.chunk.content.lines().take(3) {
            print_stdout(&format!("    {line}"))?;
        }
    }
    Ok(())
}

async fn run_trace(cli: &Cli, symbol: &str, depth: usize, json: bool) -> Result<()> {
    let scope = resolve_scope(cli).await?;
    let store = SymbolStore::open(symbol_store_path(&scope)?).await?;
    let graph = store.get_call_graph(symbol, depth).await?;

    if json {
        return print_stdout(&serde_json::to_string_pretty(&graph)?);
    }

    if graph.is_empty() {
        return print_stdout(&format!("No symbol named {symbol:?} in the index."));
    }
    print_stdout(&format!(
        "{} nodes, {} edges from {symbol:?} (depth {depth})",
        graph.nodes.len(),
        graph.edges.len()
    ))?;
    for edge in &graph.edges {
        print_stdout(&format!(
            "  {} -> {}  {}:{}",
            edge.caller, edge.callee, edge.file, edge.line
        ))?;
    }
    Ok(())
}

async fn run_symbols(cli: &Cli, prefix: Option<&str>) -> Result<()> {
    let scope = resolve_scope(cli).await?;
    let store = SymbolStore::open(symbol_store_path(&scope)?).await?;
    let symbols = store.list_symbols(prefix.unwrap_or("")).await?;

    if symbols.is_empty() {
        return print_stdout("No symbols.");
    }
    for symbol in symbols {
        print_stdout(&format!(
            "{:<12} {}  {}:{}",
            symbol.kind.as_str(),
            symbol.name,
            symbol.file,
            symbol.line
        ))?;
    }
    Ok(())
}

async fn run_workspace(cli: &Cli, command: &WorkspaceCommands) -> Result<()> {
    let registry = registry_from(cli)?;
    match command {
        WorkspaceCommands::List => {
            let config = registry.load().await?;
            if config.workspaces.is_empty() {
                return print_stdout("No workspaces configured.");
            }
            for workspace in config.workspaces {
                print_stdout(&format!(
                    "{}  ({} projects)",
                    workspace.name,
                    workspace.projects.len()
                ))?;
            }
        }
        WorkspaceCommands::Projects { name } => {
            let workspace = registry.workspace(name).await?;
            for project in workspace.projects {
                print_stdout(&format!("{}  {}", project.name, project.path.display()))?;
            }
        }
    }
    Ok(())
}

async fn run_stats(cli: &Cli) -> Result<()> {
    let store = open_scope_store(cli).await?;
    let stats = store.stats().await?;

    print_stdout(&format!(
        "{} chunks across {} files (dimension: {})",
        stats.chunks,
        stats.files,
        stats
            .dimension
            .map(|d| d.to_string())
            .unwrap_or_else(|| "unset".to_string())
    ))?;
    for file in store.list_files_with_stats().await? {
        print_stdout(&format!("  {:<50} {} chunks", file.path, file.chunks))?;
    }
    Ok(())
}

async fn open_scope_store(cli: &Cli) -> Result<std::sync::Arc<dyn VectorStore>> {
    let scope = resolve_scope(cli).await?;
    let settings = match &scope {
        Scope::Workspace(workspace) => &workspace.store,
        Scope::Project { marker, .. } => &marker.store,
    };
    Ok(open_store(settings).await?)
}

async fn run_docs(cli: &Cli, command: &DocsCommands) -> Result<()> {
    let store = open_scope_store(cli).await?;
    match command {
        DocsCommands::List => {
            let documents = store.list_documents().await?;
            if documents.is_empty() {
                return print_stdout("No documents.");
            }
            for document in documents {
                print_stdout(&format!(
                    "{}  ({} bytes)",
                    document.name,
                    document.content.len()
                ))?;
            }
        }
        DocsCommands::Get { name } => match store.get_document(name).await? {
            Some(document) => print_stdout(&document.content)?,
            None => bail!("no document named {name:?}"),
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Stderr)
        .init();

    match &cli.command {
        Commands::Search {
            query,
            project,
            path,
            limit,
            json,
        } => {
            run_search(
                &cli,
                query,
                project.as_deref(),
                path.as_deref(),
                *limit,
                *json,
            )
            .await
        }
        Commands::Trace {
            symbol,
            depth,
            json,
        } => run_trace(&cli, symbol, *depth, *json).await,
        Commands::Symbols { prefix } => run_symbols(&cli, prefix.as_deref()).await,
        Commands::Workspace(command) => run_workspace(&cli, command).await,
        Commands::Stats => run_stats(&cli).await,
        Commands::Docs(command) => run_docs(&cli, command).await,
    }
}
