use crate::config::{EmbedderSettings, Registry, StoreSettings, Workspace};
use crate::error::{Result, WorkspaceError};
use crate::marker::{find_project_marker, load_project_marker, ProjectMarker};
use grepai_embedder::{Embedder, OllamaEmbedder, OpenAiEmbedder, StubEmbedder};
use grepai_search::{normalize_project_path, normalize_workspace_path, ProjectRoot};
use grepai_store::{LocalStore, SearchResult, VectorStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The resolved query target: a registered workspace, or a standalone
/// project found through its `.grepai` marker.
#[derive(Debug, Clone)]
pub enum Scope {
    Workspace(Workspace),
    Project {
        root: PathBuf,
        marker: ProjectMarker,
    },
}

/// Path scoping for one search: the prefix pushed down to the store, plus an
/// optional post-filter for the one combination the store cannot resolve
/// (workspace + user path, no project — the store does not know where
/// project names end inside chunk paths).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchScope {
    pub search_prefix: String,
    pub post_filter: Option<PostFilter>,
}

/// Project-scoped result filter. A project-relative user path is a narrowing
/// signal: the scope commits to one project, and results must sit under that
/// project with an intra-project path starting with `user_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFilter {
    pub project: String,
    pub user_path: String,
}

impl SearchScope {
    pub fn pushed_down(search_prefix: impl Into<String>) -> Self {
        Self {
            search_prefix: search_prefix.into(),
            post_filter: None,
        }
    }
}

/// Resolve the active scope from an explicit workspace name, an explicit
/// project path, or by discovery from the current directory.
pub async fn discover_scope(
    workspace_name: Option<&str>,
    project_path: Option<&Path>,
    registry: &Registry,
) -> Result<Scope> {
    if let Some(name) = workspace_name {
        return Ok(Scope::Workspace(registry.workspace(name).await?));
    }

    if let Some(path) = project_path {
        let marker = load_project_marker(path).await?;
        return Ok(Scope::Project {
            root: path.to_path_buf(),
            marker,
        });
    }

    let cwd = std::env::current_dir()?;
    let cwd = std::fs::canonicalize(&cwd).unwrap_or(cwd);

    // Workspace membership wins over a local marker: a project inside a
    // registered workspace queries the workspace store.
    let config = registry.load().await?;
    for workspace in config.workspaces {
        let member = workspace.projects.iter().any(|project| {
            let root = std::fs::canonicalize(&project.path)
                .unwrap_or_else(|_| project.path.clone());
            cwd.starts_with(&root)
        });
        if member {
            return Ok(Scope::Workspace(workspace));
        }
    }

    if let Some(root) = find_project_marker(&cwd) {
        let marker = load_project_marker(&root).await?;
        return Ok(Scope::Project { root, marker });
    }

    Err(WorkspaceError::Config(
        "no workspace or project found from the current directory".to_string(),
    ))
}

/// Compose the search scope for workspace mode, where stored chunk paths are
/// `{workspace}/{project}/{relative}`. Push-down is always preferred; the
/// post-filter only survives when neither an explicit project nor an
/// absolute user path can narrow the scope.
pub fn workspace_search_scope(
    workspace: &Workspace,
    project: &str,
    user_path: &str,
) -> Result<SearchScope> {
    if !project.is_empty() && workspace.project(project).is_none() {
        return Err(WorkspaceError::Config(format!(
            "project {project:?} not found in workspace {:?}",
            workspace.name
        )));
    }

    let selected: Vec<String> = if project.is_empty() {
        Vec::new()
    } else {
        vec![project.to_string()]
    };
    let roots: Vec<ProjectRoot> = workspace
        .projects
        .iter()
        .map(|entry| ProjectRoot {
            name: entry.name.clone(),
            path: entry.path.clone(),
        })
        .collect();

    // Absolute paths narrow the selection to exactly one project; relative
    // paths pass through with the selection unchanged.
    let (rel, narrowed) =
        normalize_workspace_path(user_path, &workspace.name, &roots, &selected)?;

    let scoped_project = match narrowed.as_slice() {
        [single] => Some(single.clone()),
        _ => None,
    };

    let scope = match (scoped_project, rel.is_empty()) {
        (Some(name), true) => {
            SearchScope::pushed_down(format!("{}/{}/", workspace.name, name))
        }
        (Some(name), false) => {
            SearchScope::pushed_down(format!("{}/{}/{}", workspace.name, name, rel))
        }
        (None, true) => SearchScope::pushed_down(format!("{}/", workspace.name)),
        (None, false) => {
            // A project-relative user path narrows the scope to one project
            // even without an explicit project argument. The first configured
            // project is authoritative, matching the configuration-order
            // tie-break absolute paths get.
            let Some(first) = workspace.projects.first() else {
                return Err(WorkspaceError::Config(format!(
                    "workspace {:?} has no projects configured",
                    workspace.name
                )));
            };
            SearchScope {
                search_prefix: format!("{}/", workspace.name),
                post_filter: Some(PostFilter {
                    project: first.name.clone(),
                    user_path: rel,
                }),
            }
        }
    };
    Ok(scope)
}

/// Compose the search scope for single-project mode: the normalized relative
/// path goes straight to the store.
pub fn project_search_scope(root: &Path, user_path: &str) -> Result<SearchScope> {
    let prefix = normalize_project_path(user_path, &root.to_string_lossy())?;
    Ok(SearchScope::pushed_down(prefix))
}

/// Keep only results inside the filter's project whose intra-project path
/// starts with the user path. Workspace chunk paths have at most three
/// segments of interest: `{workspace}/{project}/{relative...}`.
pub fn apply_post_filter(results: Vec<SearchResult>, filter: &PostFilter) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|result| {
            let mut parts = result.chunk.file_path.splitn(3, '/');
            let _workspace = parts.next();
            let project = parts.next();
            let relative = parts.next();
            project == Some(filter.project.as_str())
                && relative.is_some_and(|rel| rel.starts_with(&filter.user_path))
        })
        .collect()
}

/// Where the symbol store lives for a scope: next to a local chunk index,
/// or under `.grepai/` for a standalone project. Server-backed chunk stores
/// have no local symbol file to offer.
pub fn symbol_store_path(scope: &Scope) -> Result<PathBuf> {
    let settings = match scope {
        Scope::Workspace(workspace) => &workspace.store,
        Scope::Project { root, .. } => {
            return Ok(root.join(".grepai").join("symbols.json"));
        }
    };
    match settings {
        StoreSettings::Local { path } => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            Ok(dir.join("symbols.json"))
        }
        StoreSettings::Qdrant { .. } => Err(WorkspaceError::Backend("qdrant".to_string())),
        StoreSettings::Postgres { .. } => Err(WorkspaceError::Backend("postgres".to_string())),
    }
}

/// Open the configured store backend. Server backends are external
/// collaborators; this build serves `local` only.
pub async fn open_store(settings: &StoreSettings) -> Result<Arc<dyn VectorStore>> {
    match settings {
        StoreSettings::Local { path } => {
            let store = LocalStore::open(path).await?;
            Ok(Arc::new(store))
        }
        StoreSettings::Qdrant { .. } => Err(WorkspaceError::Backend("qdrant".to_string())),
        StoreSettings::Postgres { .. } => Err(WorkspaceError::Backend("postgres".to_string())),
    }
}

/// Instantiate the configured embedding provider.
pub fn open_embedder(settings: &EmbedderSettings) -> Result<Arc<dyn Embedder>> {
    match settings.provider.as_str() {
        "ollama" => {
            let endpoint = if settings.endpoint.is_empty() {
                "http://localhost:11434"
            } else {
                &settings.endpoint
            };
            Ok(Arc::new(OllamaEmbedder::new(
                endpoint,
                &settings.model,
                settings.dimensions.unwrap_or(768),
            )))
        }
        "openai" => {
            let api_key = std::env::var("GREPAI_OPENAI_API_KEY").map_err(|_| {
                WorkspaceError::Config(
                    "openai embedder requires GREPAI_OPENAI_API_KEY".to_string(),
                )
            })?;
            let endpoint = if settings.endpoint.is_empty() {
                "https://api.openai.com"
            } else {
                &settings.endpoint
            };
            Ok(Arc::new(OpenAiEmbedder::new(
                endpoint,
                &api_key,
                &settings.model,
                settings.dimensions.unwrap_or(1536),
            )))
        }
        "stub" => Ok(Arc::new(StubEmbedder::new(
            settings.dimensions.unwrap_or(384),
        ))),
        other => Err(WorkspaceError::Config(format!(
            "unknown embedder provider {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectEntry;
    use grepai_store::{chunk_hash, unix_timestamp, Chunk};
    use tempfile::TempDir;

    fn workspace_fixture(tmp: &TempDir) -> Workspace {
        let my = tmp.path().join("myproject");
        let other = tmp.path().join("otherproject");
        std::fs::create_dir_all(my.join("src")).unwrap();
        std::fs::create_dir_all(other.join("src")).unwrap();
        Workspace {
            name: "myworkspace".to_string(),
            store: StoreSettings::Local {
                path: tmp.path().join("index.json"),
            },
            embedder: EmbedderSettings {
                provider: "stub".to_string(),
                model: "stub".to_string(),
                endpoint: String::new(),
                dimensions: Some(64),
            },
            projects: vec![
                ProjectEntry {
                    name: "myproject".to_string(),
                    path: my,
                },
                ProjectEntry {
                    name: "otherproject".to_string(),
                    path: other,
                },
            ],
        }
    }

    #[test]
    fn prefix_composition_table() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace_fixture(&tmp);

        // Workspace only.
        assert_eq!(
            workspace_search_scope(&ws, "", "").unwrap(),
            SearchScope::pushed_down("myworkspace/")
        );

        // Workspace + project.
        assert_eq!(
            workspace_search_scope(&ws, "myproject", "").unwrap(),
            SearchScope::pushed_down("myworkspace/myproject/")
        );

        // Workspace + project + user path: full push-down.
        assert_eq!(
            workspace_search_scope(&ws, "myproject", "src/handlers/").unwrap(),
            SearchScope::pushed_down("myworkspace/myproject/src/handlers/")
        );

        // Workspace + user path, no project: push the workspace prefix and
        // post-filter inside the first configured project.
        assert_eq!(
            workspace_search_scope(&ws, "", "src/").unwrap(),
            SearchScope {
                search_prefix: "myworkspace/".to_string(),
                post_filter: Some(PostFilter {
                    project: "myproject".to_string(),
                    user_path: "src/".to_string(),
                }),
            }
        );
    }

    #[test]
    fn absolute_user_path_narrows_to_one_project() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace_fixture(&tmp);
        let inside = ws.projects[1].path.join("src").join("main.go");

        let scope = workspace_search_scope(&ws, "", &inside.to_string_lossy()).unwrap();
        assert_eq!(
            scope,
            SearchScope::pushed_down("myworkspace/otherproject/src/main.go")
        );
    }

    #[test]
    fn unknown_project_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let ws = workspace_fixture(&tmp);
        let err = workspace_search_scope(&ws, "ghost", "").unwrap_err();
        assert!(matches!(err, WorkspaceError::Config(_)));
    }

    #[test]
    fn post_filter_restricts_to_project_and_relative_prefix() {
        let chunk = |path: &str| SearchResult {
            chunk: Chunk {
                id: path.to_string(),
                file_path: path.to_string(),
                start_line: 1,
                end_line: 2,
                content: String::new(),
                hash: chunk_hash(""),
                vector: Vec::new(),
                updated_at: unix_timestamp(),
            },
            score: 1.0,
        };

        let results = vec![
            chunk("myworkspace/myproject/src/handlers/auth.go"),
            chunk("myworkspace/myproject/src/models/user.go"),
            chunk("myworkspace/myproject/docs/readme.md"),
            chunk("myworkspace/otherproject/src/main.go"),
            chunk("myworkspace/short"),
        ];

        let filter = PostFilter {
            project: "myproject".to_string(),
            user_path: "src/".to_string(),
        };
        let filtered = apply_post_filter(results, &filter);
        let paths: Vec<&str> = filtered
            .iter()
            .map(|r| r.chunk.file_path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec![
                "myworkspace/myproject/src/handlers/auth.go",
                "myworkspace/myproject/src/models/user.go",
            ]
        );
    }

    #[tokio::test]
    async fn server_backends_are_unavailable_in_this_build() {
        let err = match open_store(&StoreSettings::Qdrant {
            endpoint: "localhost".to_string(),
            port: 6334,
        })
        .await
        {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(err, WorkspaceError::Backend(_)));

        let err = match open_store(&StoreSettings::Postgres {
            dsn: "postgres://localhost/grepai".to_string(),
        })
        .await
        {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(err, WorkspaceError::Backend(_)));
    }

    #[test]
    fn embedder_provider_dispatch() {
        let stub = EmbedderSettings {
            provider: "stub".to_string(),
            model: String::new(),
            endpoint: String::new(),
            dimensions: Some(32),
        };
        let embedder = open_embedder(&stub).unwrap();
        assert_eq!(embedder.dimensions(), 32);

        let ollama = EmbedderSettings {
            provider: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            endpoint: String::new(),
            dimensions: None,
        };
        let embedder = open_embedder(&ollama).unwrap();
        assert_eq!(embedder.dimensions(), 768);

        let unknown = EmbedderSettings {
            provider: "mystery".to_string(),
            model: String::new(),
            endpoint: String::new(),
            dimensions: None,
        };
        let err = match open_embedder(&unknown) {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(err, WorkspaceError::Config(_)));
    }

    #[tokio::test]
    async fn discover_by_explicit_workspace_name() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::at(tmp.path().join("workspaces.json"));
        let ws = workspace_fixture(&tmp);
        registry
            .save(&crate::config::WorkspaceConfig {
                version: crate::config::WORKSPACE_CONFIG_VERSION,
                workspaces: vec![ws.clone()],
            })
            .await
            .unwrap();

        let scope = discover_scope(Some("myworkspace"), None, &registry)
            .await
            .unwrap();
        assert!(matches!(scope, Scope::Workspace(w) if w.name == "myworkspace"));

        let err = discover_scope(Some("ghost"), None, &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Config(_)));
    }

    #[tokio::test]
    async fn discover_by_project_path_requires_marker() {
        let tmp = TempDir::new().unwrap();
        let registry = Registry::at(tmp.path().join("workspaces.json"));
        let root = tmp.path().join("standalone");
        std::fs::create_dir_all(root.join(".grepai")).unwrap();
        std::fs::write(
            root.join(".grepai").join("config.yaml"),
            "version: 1\nproject: standalone\n",
        )
        .unwrap();

        let scope = discover_scope(None, Some(&root), &registry).await.unwrap();
        match scope {
            Scope::Project { marker, .. } => assert_eq!(marker.project, "standalone"),
            other => panic!("unexpected scope: {other:?}"),
        }

        let bare = tmp.path().join("bare");
        std::fs::create_dir_all(&bare).unwrap();
        let err = discover_scope(None, Some(&bare), &registry)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::Config(_)));
    }
}
