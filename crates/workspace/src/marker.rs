use crate::config::{EmbedderSettings, StoreSettings};
use crate::error::{Result, WorkspaceError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Location of the project marker relative to a project root.
pub const MARKER_RELATIVE_PATH: &str = ".grepai/config.yaml";

/// Parsed `.grepai/config.yaml`. The file is a flat two-level document:
/// top-level scalars plus `store:`/`embedder:` sections of scalars, covered
/// by a small dedicated parser rather than a full YAML implementation.
#[derive(Debug, Clone)]
pub struct ProjectMarker {
    pub version: u32,
    pub project: String,
    pub store: StoreSettings,
    pub embedder: EmbedderSettings,
}

/// Read and parse the marker under `root`. A missing marker is a config
/// error: the caller asked for this specific path.
pub async fn load_project_marker(root: &Path) -> Result<ProjectMarker> {
    let path = root.join(MARKER_RELATIVE_PATH);
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(WorkspaceError::Config(format!(
                "no {MARKER_RELATIVE_PATH} found at {}",
                root.display()
            )));
        }
        Err(err) => return Err(err.into()),
    };
    parse_marker(&raw, root)
}

/// Walk upward from `start` looking for a directory containing the marker.
pub fn find_project_marker(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(MARKER_RELATIVE_PATH).is_file())
        .map(Path::to_path_buf)
}

fn parse_marker(raw: &str, root: &Path) -> Result<ProjectMarker> {
    let mut top: HashMap<String, String> = HashMap::new();
    let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
    let mut current_section: Option<String> = None;

    for line in raw.lines() {
        let trimmed = line.trim_end();
        if trimmed.trim().is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }

        let indented = trimmed.starts_with(' ') || trimmed.starts_with('\t');
        let Some((key, value)) = trimmed.trim().split_once(':') else {
            return Err(WorkspaceError::Config(format!(
                "malformed line in {MARKER_RELATIVE_PATH}: {trimmed:?}"
            )));
        };
        let key = key.trim().to_string();
        let value = unquote(value.trim());

        if indented {
            let Some(section) = current_section.as_ref() else {
                return Err(WorkspaceError::Config(format!(
                    "indented entry outside a section in {MARKER_RELATIVE_PATH}: {trimmed:?}"
                )));
            };
            sections
                .entry(section.clone())
                .or_default()
                .insert(key, value);
        } else if value.is_empty() {
            current_section = Some(key.clone());
            sections.entry(key).or_default();
        } else {
            current_section = None;
            top.insert(key, value);
        }
    }

    let version = top
        .get("version")
        .map(|v| {
            v.parse::<u32>().map_err(|_| {
                WorkspaceError::Config(format!("invalid version {v:?} in {MARKER_RELATIVE_PATH}"))
            })
        })
        .transpose()?
        .unwrap_or(1);

    let project = top
        .get("project")
        .cloned()
        .or_else(|| {
            root.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "project".to_string());

    let store = store_from_section(sections.get("store"), root)?;
    let embedder = embedder_from_section(sections.get("embedder"))?;

    Ok(ProjectMarker {
        version,
        project,
        store,
        embedder,
    })
}

fn store_from_section(
    section: Option<&HashMap<String, String>>,
    root: &Path,
) -> Result<StoreSettings> {
    let default_path = || root.join(".grepai").join("index.json");

    let Some(section) = section else {
        return Ok(StoreSettings::Local {
            path: default_path(),
        });
    };

    let backend = section.get("backend").map(String::as_str).unwrap_or("local");
    match backend {
        "local" => {
            let path = section
                .get("path")
                .map(PathBuf::from)
                .map(|p| if p.is_absolute() { p } else { root.join(p) })
                .unwrap_or_else(default_path);
            Ok(StoreSettings::Local { path })
        }
        "qdrant" => {
            let endpoint = section
                .get("endpoint")
                .cloned()
                .ok_or_else(|| WorkspaceError::Config("qdrant store requires endpoint".into()))?;
            let port = section
                .get("port")
                .map(|p| {
                    p.parse::<u16>().map_err(|_| {
                        WorkspaceError::Config(format!("invalid qdrant port {p:?}"))
                    })
                })
                .transpose()?
                .unwrap_or(6334);
            Ok(StoreSettings::Qdrant { endpoint, port })
        }
        "postgres" => {
            let dsn = section
                .get("dsn")
                .cloned()
                .ok_or_else(|| WorkspaceError::Config("postgres store requires dsn".into()))?;
            Ok(StoreSettings::Postgres { dsn })
        }
        other => Err(WorkspaceError::Config(format!(
            "unknown store backend {other:?}"
        ))),
    }
}

fn embedder_from_section(section: Option<&HashMap<String, String>>) -> Result<EmbedderSettings> {
    let empty = HashMap::new();
    let section = section.unwrap_or(&empty);

    let dimensions = section
        .get("dimensions")
        .map(|d| {
            d.parse::<usize>().map_err(|_| {
                WorkspaceError::Config(format!("invalid embedder dimensions {d:?}"))
            })
        })
        .transpose()?;

    Ok(EmbedderSettings {
        provider: section
            .get("provider")
            .cloned()
            .unwrap_or_else(|| "ollama".to_string()),
        model: section
            .get("model")
            .cloned()
            .unwrap_or_else(|| "nomic-embed-text".to_string()),
        endpoint: section.get("endpoint").cloned().unwrap_or_default(),
        dimensions,
    })
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    if value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
    {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}
