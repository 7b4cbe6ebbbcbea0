//! grepai MCP Server
//!
//! Exposes the grepai index to AI agents over the MCP protocol.
//!
//! ## Tools
//!
//! - `list_workspaces` - Configured workspaces and their projects
//! - `list_projects` - Projects of one workspace with root paths
//! - `search` - Semantic search scoped by workspace/project/path
//! - `get_call_graph` - Bounded forward call-graph walk from a symbol
//!
//! Every tool accepts `format: "json" | "toon"` (json by default).
//!
//! ## Usage
//!
//! Add to your MCP client configuration:
//! ```json
//! {
//!   "mcpServers": {
//!     "grepai": {
//!       "command": "grepai-mcp"
//!     }
//!   }
//! }
//! ```

use anyhow::Result;
use rmcp::{transport::stdio, ServiceExt};
use std::env;

mod encode;
mod tools;

use tools::GrepaiService;

fn print_help() {
    println!("grepai MCP server");
    println!();
    println!("Usage: grepai-mcp [--version|--help]");
    println!();
    println!("Env:");
    println!("  GREPAI_MCP_LOG=1       Enable stderr logging (stdout is protocol-only)");
    println!("  GREPAI_WORKSPACES=...  Override the workspace registry path");
}

fn handle_cli_args() -> Option<i32> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        return None;
    }

    match args[0].as_str() {
        // Some MCP clients unconditionally pass `--stdio`.
        "--stdio" | "stdio" => None,
        "--version" | "-V" => {
            println!("grepai-mcp {}", env!("CARGO_PKG_VERSION"));
            Some(0)
        }
        "--help" | "-h" => {
            print_help();
            Some(0)
        }
        _ => {
            // Be permissive: agent tooling can append wrapper args, and
            // starting the server beats failing the toolchain.
            if logging_enabled() {
                log::warn!("Ignoring unknown arguments: {}", args.join(" "));
            }
            None
        }
    }
}

fn logging_enabled() -> bool {
    // Any non-MCP bytes on stdout break clients, and some clients merge
    // stderr into stdout. Stay silent unless explicitly enabled.
    std::env::var("GREPAI_MCP_LOG")
        .ok()
        .map(|v| {
            let v = v.trim();
            !(v.is_empty() || v == "0" || v.eq_ignore_ascii_case("false"))
        })
        .unwrap_or(false)
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Some(code) = handle_cli_args() {
        std::process::exit(code);
    }

    if logging_enabled() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
            .target(env_logger::Target::Stderr)
            .init();
        log::info!("Starting grepai MCP server");
    }

    let service = GrepaiService::new();
    let server = service.serve(stdio()).await?;

    server.waiting().await?;

    if logging_enabled() {
        log::info!("grepai MCP server stopped");
    }
    Ok(())
}
