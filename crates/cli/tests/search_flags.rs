use assert_cmd::Command;
use grepai_embedder::{Embedder, StubEmbedder};
use grepai_store::{chunk_hash, unix_timestamp, Chunk, LocalStore, VectorStore};
use grepai_trace::{Reference, Symbol, SymbolKind, SymbolStore};
use grepai_workspace::{
    EmbedderSettings, ProjectEntry, Registry, StoreSettings, Workspace, WorkspaceConfig,
    WORKSPACE_CONFIG_VERSION,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const DIMENSIONS: usize = 64;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn seed_fixture(dir: &Path) -> PathBuf {
    block_on(async {
        let index_path = dir.join("ws").join("index.json");
        let embedder = StubEmbedder::new(DIMENSIONS);

        let store = LocalStore::open(&index_path).await.unwrap();
        let seeds = [
            (
                "1",
                "myworkspace/myproject/src/handlers/auth.go",
                "func HandleAuth() { user session }",
            ),
            (
                "2",
                "myworkspace/myproject/src/models/user.go",
                "type User struct { name string }",
            ),
            (
                "3",
                "myworkspace/otherproject/src/main.go",
                "func main() { run() }",
            ),
        ];
        let mut chunks = Vec::new();
        for (id, path, content) in seeds {
            chunks.push(Chunk {
                id: id.to_string(),
                file_path: path.to_string(),
                start_line: 1,
                end_line: 10,
                content: content.to_string(),
                hash: chunk_hash(content),
                vector: embedder.embed(content).await.unwrap(),
                updated_at: unix_timestamp(),
            });
        }
        store.save_chunks(chunks).await.unwrap();
        store.persist().await.unwrap();

        let symbols = SymbolStore::open(dir.join("ws").join("symbols.json"))
            .await
            .unwrap();
        symbols
            .save_file(
                "main.go",
                vec![
                    Symbol {
                        name: "Main".to_string(),
                        kind: SymbolKind::Function,
                        file: "main.go".to_string(),
                        line: 1,
                        language: "go".to_string(),
                    },
                    Symbol {
                        name: "Run".to_string(),
                        kind: SymbolKind::Function,
                        file: "main.go".to_string(),
                        line: 10,
                        language: "go".to_string(),
                    },
                ],
                vec![Reference {
                    symbol_name: "Run".to_string(),
                    file: "main.go".to_string(),
                    line: 3,
                    caller_name: "Main".to_string(),
                }],
            )
            .await
            .unwrap();
        symbols.persist().await.unwrap();

        let my_root = dir.join("roots").join("myproject");
        let other_root = dir.join("roots").join("otherproject");
        std::fs::create_dir_all(&my_root).unwrap();
        std::fs::create_dir_all(&other_root).unwrap();

        let registry_path = dir.join("workspaces.json");
        Registry::at(&registry_path)
            .save(&WorkspaceConfig {
                version: WORKSPACE_CONFIG_VERSION,
                workspaces: vec![Workspace {
                    name: "myworkspace".to_string(),
                    store: StoreSettings::Local { path: index_path },
                    embedder: EmbedderSettings {
                        provider: "stub".to_string(),
                        model: "stub".to_string(),
                        endpoint: String::new(),
                        dimensions: Some(DIMENSIONS),
                    },
                    projects: vec![
                        ProjectEntry {
                            name: "myproject".to_string(),
                            path: my_root,
                        },
                        ProjectEntry {
                            name: "otherproject".to_string(),
                            path: other_root,
                        },
                    ],
                }],
            })
            .await
            .unwrap();
        registry_path
    })
}

fn grepai(registry: &Path) -> Command {
    let mut cmd = Command::cargo_bin("grepai").expect("binary");
    cmd.env("GREPAI_WORKSPACES", registry);
    cmd
}

#[test]
fn search_json_scopes_to_project() {
    let tmp = tempdir().unwrap();
    let registry = seed_fixture(tmp.path());

    let output = grepai(&registry)
        .args([
            "search",
            "user",
            "--workspace",
            "myworkspace",
            "--project",
            "myproject",
            "--json",
        ])
        .output()
        .expect("command run");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let hits: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 2);
    for hit in hits {
        assert!(hit["file"]
            .as_str()
            .unwrap()
            .starts_with("myworkspace/myproject/"));
    }
}

#[test]
fn search_path_without_project_narrows_to_first_project() {
    let tmp = tempdir().unwrap();
    let registry = seed_fixture(tmp.path());

    let output = grepai(&registry)
        .args([
            "search",
            "user",
            "--workspace",
            "myworkspace",
            "--path",
            "src/",
            "--json",
        ])
        .output()
        .expect("command run");
    assert!(output.status.success());

    // The project-relative path commits the scope to the first configured
    // project: exactly the two myproject hits, nothing from otherproject.
    let hits: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 2);
    for hit in hits {
        let file = hit["file"].as_str().unwrap();
        assert!(
            file.starts_with("myworkspace/myproject/"),
            "unexpected hit {file}"
        );
        let relative = file.splitn(3, '/').nth(2).unwrap();
        assert!(relative.starts_with("src/"), "unexpected hit {file}");
    }
}

#[test]
fn trace_prints_call_graph_edges() {
    let tmp = tempdir().unwrap();
    let registry = seed_fixture(tmp.path());

    let output = grepai(&registry)
        .args(["trace", "Main", "--workspace", "myworkspace", "--json"])
        .output()
        .expect("command run");
    assert!(output.status.success());

    let graph: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    let edges = graph["edges"].as_array().unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["caller"], "Main");
    assert_eq!(edges[0]["callee"], "Run");
}

#[test]
fn workspace_list_names_configured_workspaces() {
    let tmp = tempdir().unwrap();
    let registry = seed_fixture(tmp.path());

    let output = grepai(&registry)
        .args(["workspace", "list"])
        .output()
        .expect("command run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("myworkspace"));
}

#[test]
fn unknown_workspace_fails_with_config_error() {
    let tmp = tempdir().unwrap();
    let registry = seed_fixture(tmp.path());

    let output = grepai(&registry)
        .args(["search", "user", "--workspace", "ghost"])
        .output()
        .expect("command run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}
