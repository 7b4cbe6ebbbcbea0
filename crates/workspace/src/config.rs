use crate::error::{Result, WorkspaceError};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const WORKSPACE_CONFIG_VERSION: u32 = 1;

/// Per-user workspace registry, as persisted at
/// `<config_dir>/grepai/workspaces.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    pub version: u32,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            version: WORKSPACE_CONFIG_VERSION,
            workspaces: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    pub store: StoreSettings,
    pub embedder: EmbedderSettings,
    #[serde(default)]
    pub projects: Vec<ProjectEntry>,
}

impl Workspace {
    pub fn project(&self, name: &str) -> Option<&ProjectEntry> {
        self.projects.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    /// Absolute project root. Canonicalized before containment matching.
    pub path: PathBuf,
}

/// Store backend selection. `local` is served by the embedded single-file
/// backend; the server backends parse and round-trip so configs stay
/// portable, but opening them is delegated to builds that carry the wire
/// protocols.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StoreSettings {
    Local { path: PathBuf },
    Qdrant { endpoint: String, port: u16 },
    Postgres { dsn: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderSettings {
    /// `ollama`, `openai`, or `stub`.
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub dimensions: Option<usize>,
}

/// Handle to the registry file. Loading is on demand; writes take an
/// exclusive lock on a sibling lock file and replace the registry
/// atomically, so concurrent writers serialize and readers never observe a
/// torn file.
pub struct Registry {
    path: PathBuf,
}

impl Registry {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<user config dir>/grepai/workspaces.json`.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| WorkspaceError::Config("user config directory unavailable".into()))?;
        Ok(base.join("grepai").join("workspaces.json"))
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::at(Self::default_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry; a missing file is an empty registry.
    pub async fn load(&self) -> Result<WorkspaceConfig> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(WorkspaceConfig::default());
            }
            Err(err) => return Err(err.into()),
        };
        let config: WorkspaceConfig = serde_json::from_slice(&bytes).map_err(|err| {
            WorkspaceError::Config(format!(
                "malformed workspace registry {}: {err}",
                self.path.display()
            ))
        })?;
        if config.version != WORKSPACE_CONFIG_VERSION {
            return Err(WorkspaceError::Config(format!(
                "unsupported workspace registry version {}",
                config.version
            )));
        }
        log::debug!(
            "Loaded {} workspaces from {}",
            config.workspaces.len(),
            self.path.display()
        );
        Ok(config)
    }

    /// Look up one workspace by name.
    pub async fn workspace(&self, name: &str) -> Result<Workspace> {
        let config = self.load().await?;
        config
            .workspaces
            .into_iter()
            .find(|ws| ws.name == name)
            .ok_or_else(|| WorkspaceError::Config(format!("workspace {name:?} not found")))
    }

    /// Replace the registry under an exclusive file lock.
    pub async fn save(&self, config: &WorkspaceConfig) -> Result<()> {
        let path = self.path.clone();
        let data = serde_json::to_vec_pretty(config)?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let lock_path = path.with_extension("lock");
            let lock_file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .open(&lock_path)?;
            lock_file.lock_exclusive()?;

            let tmp = path.with_extension("json.tmp");
            let write_result = std::fs::write(&tmp, &data)
                .and_then(|()| std::fs::rename(&tmp, &path));

            let _ = lock_file.unlock();
            write_result?;
            Ok(())
        })
        .await
        .map_err(|err| WorkspaceError::Config(format!("registry write task failed: {err}")))?
    }
}
