use crate::error::{Result, SearchError};
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

/// A named project root inside a workspace, canonical-path matching input
/// for [`normalize_workspace_path`].
#[derive(Debug, Clone)]
pub struct ProjectRoot {
    pub name: String,
    pub path: PathBuf,
}

/// Normalize a search path prefix for single-project mode. Relative prefixes
/// pass through with separators converted to `/`; absolute prefixes are
/// resolved against the project root and must be contained in it.
pub fn normalize_project_path(path_prefix: &str, project_root: &str) -> Result<String> {
    if path_prefix.is_empty() {
        return Ok(String::new());
    }
    if !Path::new(path_prefix).is_absolute() {
        return Ok(to_slash(path_prefix));
    }
    if project_root.is_empty() {
        return Err(SearchError::Path(format!(
            "cannot resolve absolute path {path_prefix:?} without project root"
        )));
    }

    let root = normalize_for_match(Path::new(project_root));
    let target = normalize_for_match(Path::new(path_prefix));
    relative_if_contained(&root, &target).ok_or_else(|| {
        SearchError::Path(format!(
            "path {path_prefix:?} is outside project root {project_root:?}"
        ))
    })
}

/// Normalize a search path prefix for workspace mode. An absolute prefix is
/// resolved to the project whose root contains it — the longest root wins,
/// ties break by configuration order — and the selection narrows to that one
/// project so the disambiguation can be pushed down to the store.
pub fn normalize_workspace_path(
    path_prefix: &str,
    workspace_name: &str,
    projects: &[ProjectRoot],
    selected_projects: &[String],
) -> Result<(String, Vec<String>)> {
    if path_prefix.is_empty() {
        return Ok((String::new(), selected_projects.to_vec()));
    }
    if !Path::new(path_prefix).is_absolute() {
        return Ok((to_slash(path_prefix), selected_projects.to_vec()));
    }
    if projects.is_empty() {
        return Err(SearchError::Path(format!(
            "workspace {workspace_name:?} has no projects configured"
        )));
    }

    let target = normalize_for_match(Path::new(path_prefix));

    struct Match<'a> {
        project: &'a ProjectRoot,
        rel: String,
        root_len: usize,
    }
    let mut best: Option<Match> = None;

    for project in projects {
        let root = normalize_for_match(&project.path);
        let Some(rel) = relative_if_contained(&root, &target) else {
            continue;
        };
        let root_len = root.as_os_str().len();
        if best.as_ref().map_or(true, |b| root_len > b.root_len) {
            best = Some(Match {
                project,
                rel,
                root_len,
            });
        }
    }

    let Some(best) = best else {
        return Err(SearchError::Path(format!(
            "path {path_prefix:?} does not belong to any project in workspace {workspace_name:?}"
        )));
    };

    if !selected_projects.is_empty() {
        let allowed = selected_projects
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .any(|name| name == best.project.name);
        if !allowed {
            return Err(SearchError::Path(format!(
                "path {path_prefix:?} belongs to project {:?}, which is not in selected projects",
                best.project.name
            )));
        }
    }

    Ok((best.rel, vec![best.project.name.clone()]))
}

fn to_slash(path: &str) -> String {
    path.replace('\\', "/")
}

/// Clean, absolutize, and symlink-resolve a path for containment matching.
/// Resolving symlinks keeps `~/link-to-proj/src` from being rejected as
/// outside the real project root.
fn normalize_for_match(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        lexical_clean(path)
    } else {
        match std::env::current_dir() {
            Ok(cwd) => lexical_clean(&cwd.join(path)),
            Err(_) => lexical_clean(path),
        }
    };
    canonicalize_best_effort(&absolute)
}

/// `fs::canonicalize` that tolerates non-existent leaves: the deepest
/// existing ancestor is resolved and the remaining components are appended
/// unchanged, so both sides of a containment check normalize consistently.
fn canonicalize_best_effort(path: &Path) -> PathBuf {
    if let Ok(resolved) = std::fs::canonicalize(path) {
        return resolved;
    }

    let mut current = path.to_path_buf();
    let mut tail: Vec<OsString> = Vec::new();
    while let Some(parent) = current.parent() {
        match current.file_name() {
            Some(name) => tail.push(name.to_os_string()),
            None => break,
        }
        if let Ok(resolved) = std::fs::canonicalize(parent) {
            let mut out = resolved;
            for name in tail.iter().rev() {
                out.push(name);
            }
            return out;
        }
        current = parent.to_path_buf();
    }
    path.to_path_buf()
}

/// Remove `.` components and resolve `..` lexically.
fn lexical_clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = out.pop();
                if !popped && !path.is_absolute() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Slash-joined relative path of `target` under `root`; `None` when `target`
/// is not contained. Equality yields the empty string. Component-wise
/// matching on normalized paths means the result can never contain `..`.
fn relative_if_contained(root: &Path, target: &Path) -> Option<String> {
    let rel = target.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return Some(String::new());
    }
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
