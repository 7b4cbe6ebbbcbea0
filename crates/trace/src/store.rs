use crate::error::{Result, TraceError};
use crate::types::{CallEdge, CallGraph, Reference, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

pub const SYMBOL_STORE_SCHEMA_VERSION: u32 = 1;

/// Single-file symbol and reference store. Data is keyed by source file;
/// `save_file` replaces a file's records wholesale, and the name-keyed
/// lookup indices are rebuilt under the same write guard so readers never
/// see the store half-updated.
pub struct SymbolStore {
    path: PathBuf,
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    files: BTreeMap<String, FileRecord>,

    // Rebuilt from `files` on every mutation.
    definitions: HashMap<String, Vec<Symbol>>,
    refs_by_caller: HashMap<String, Vec<Reference>>,
}

#[derive(Clone, Serialize, Deserialize)]
struct FileRecord {
    symbols: Vec<Symbol>,
    references: Vec<Reference>,
}

#[derive(Serialize, Deserialize)]
struct PersistedSymbolStore {
    schema_version: u32,
    files: BTreeMap<String, FileRecord>,
}

impl State {
    fn rebuild_indices(&mut self) {
        self.definitions.clear();
        self.refs_by_caller.clear();
        // `files` is a BTreeMap, so index order is deterministic.
        for record in self.files.values() {
            for symbol in &record.symbols {
                self.definitions
                    .entry(symbol.name.clone())
                    .or_default()
                    .push(symbol.clone());
            }
            for reference in &record.references {
                if reference.caller_name.is_empty() {
                    continue;
                }
                self.refs_by_caller
                    .entry(reference.caller_name.clone())
                    .or_default()
                    .push(reference.clone());
            }
        }
    }

    fn is_definition_line(&self, name: &str, file: &str, line: usize) -> bool {
        self.definitions
            .get(name)
            .map(|defs| defs.iter().any(|s| s.file == file && s.line == line))
            .unwrap_or(false)
    }
}

impl SymbolStore {
    /// Open a symbol store file, loading existing state when present.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut state = match tokio::fs::read(&path).await {
            Ok(bytes) => Self::decode(&path, &bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => State::default(),
            Err(err) => return Err(err.into()),
        };
        state.rebuild_indices();
        log::debug!(
            "Opened symbol store at {} ({} files)",
            path.display(),
            state.files.len()
        );
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn decode(path: &Path, bytes: &[u8]) -> Result<State> {
        let persisted: PersistedSymbolStore =
            serde_json::from_slice(bytes).map_err(|err| TraceError::Corrupt {
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;
        if persisted.schema_version != SYMBOL_STORE_SCHEMA_VERSION {
            return Err(TraceError::Corrupt {
                path: path.display().to_string(),
                reason: format!("unsupported schema_version {}", persisted.schema_version),
            });
        }
        Ok(State {
            files: persisted.files,
            ..State::default()
        })
    }

    /// Replace all symbols and references recorded for `path`.
    pub async fn save_file(
        &self,
        path: &str,
        symbols: Vec<Symbol>,
        references: Vec<Reference>,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        state.files.insert(
            path.to_string(),
            FileRecord {
                symbols,
                references,
            },
        );
        state.rebuild_indices();
        Ok(())
    }

    /// Drop all records for `path`. Returns whether the file was known.
    pub async fn delete_file(&self, path: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state.files.remove(path).is_some();
        if removed {
            state.rebuild_indices();
        }
        Ok(removed)
    }

    /// All definitions of `name`, in file order.
    pub async fn find_definitions(&self, name: &str) -> Result<Vec<Symbol>> {
        let state = self.state.read().await;
        Ok(state.definitions.get(name).cloned().unwrap_or_default())
    }

    /// All known symbols whose name starts with `prefix` (empty prefix lists
    /// everything), sorted by name then file.
    pub async fn list_symbols(&self, prefix: &str) -> Result<Vec<Symbol>> {
        let state = self.state.read().await;
        let mut symbols: Vec<Symbol> = state
            .files
            .values()
            .flat_map(|record| record.symbols.iter())
            .filter(|symbol| prefix.is_empty() || symbol.name.starts_with(prefix))
            .cloned()
            .collect();
        symbols.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.file.cmp(&b.file)));
        Ok(symbols)
    }

    /// Forward call graph reachable from symbols named `root`, bounded by
    /// `max_depth` edges from the root (`max_depth == 0` returns the root
    /// node only; unknown root returns an empty graph).
    ///
    /// Admission rules:
    /// - an edge is emitted for every reference whose caller is an expanded
    ///   node, deduplicated on `(caller, callee, file, line)`;
    /// - a self-reference sitting exactly on a same-named definition line is
    ///   a declaration artifact from the extractor and is dropped — real
    ///   recursive calls at other lines are kept;
    /// - a callee is expanded further only when its name resolves to exactly
    ///   one known definition. Zero (external) or two-plus (ambiguous)
    ///   definitions still get their incoming edge, but traversal stops
    ///   there so a common short name cannot join unrelated subgraphs;
    /// - each node expands at most once, which also terminates cycles.
    pub async fn get_call_graph(&self, root: &str, max_depth: usize) -> Result<CallGraph> {
        let state = self.state.read().await;
        let mut graph = CallGraph::default();

        if !state.definitions.contains_key(root) {
            return Ok(graph);
        }
        graph.nodes.insert(root.to_string());

        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(root.to_string());
        let mut seen_edges: HashSet<(String, String, String, usize)> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((root.to_string(), 0));

        while let Some((name, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let Some(references) = state.refs_by_caller.get(&name) else {
                continue;
            };

            for reference in references {
                if reference.caller_name == reference.symbol_name
                    && state.is_definition_line(
                        &reference.symbol_name,
                        &reference.file,
                        reference.line,
                    )
                {
                    continue;
                }

                let key = (
                    name.clone(),
                    reference.symbol_name.clone(),
                    reference.file.clone(),
                    reference.line,
                );
                if !seen_edges.insert(key) {
                    continue;
                }

                graph.nodes.insert(reference.symbol_name.clone());
                graph.edges.push(CallEdge {
                    caller: name.clone(),
                    callee: reference.symbol_name.clone(),
                    file: reference.file.clone(),
                    line: reference.line,
                });

                let definition_count = state
                    .definitions
                    .get(&reference.symbol_name)
                    .map(Vec::len)
                    .unwrap_or(0);
                if definition_count == 1 && !visited.contains(&reference.symbol_name) {
                    visited.insert(reference.symbol_name.clone());
                    queue.push_back((reference.symbol_name.clone(), depth + 1));
                }
            }
        }

        Ok(graph)
    }

    pub async fn persist(&self) -> Result<()> {
        let state = self.state.read().await;
        let persisted = PersistedSymbolStore {
            schema_version: SYMBOL_STORE_SCHEMA_VERSION,
            files: state.files.clone(),
        };
        drop(state);

        let data = serde_json::to_vec_pretty(&persisted)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
