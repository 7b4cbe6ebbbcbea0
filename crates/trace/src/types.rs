use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named definition at a specific file and line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub file: String,
    /// 1-based line of the definition.
    pub line: usize,
    pub language: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Method,
    Type,
    Class,
    Interface,
    Variable,
    Constant,
    Module,
}

impl SymbolKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::Type => "type",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::Variable => "variable",
            Self::Constant => "constant",
            Self::Module => "module",
        }
    }
}

/// A call-site record. `caller_name` is the enclosing symbol at `file:line`,
/// or empty when the call happens at top level. The callee name stays
/// unresolved until query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub symbol_name: String,
    pub file: String,
    pub line: usize,
    pub caller_name: String,
}

/// Directed caller→callee edge at a concrete call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallEdge {
    pub caller: String,
    pub callee: String,
    pub file: String,
    pub line: usize,
}

/// Result of a call-graph query: the symbol names reached and the admitted
/// edges. `(caller, callee, file, line)` is unique across `edges`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallGraph {
    pub nodes: BTreeSet<String>,
    pub edges: Vec<CallEdge>,
}

impl CallGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}
