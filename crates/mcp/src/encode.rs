use anyhow::{bail, Result};
use serde_json::Value;

/// Output encoding, chosen once per tool call. JSON is the default and must
/// round-trip losslessly; TOON is the compact token-oriented line format for
/// context-constrained clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Toon,
}

impl OutputFormat {
    /// Empty selects the default. Anything other than `json`/`toon` is the
    /// caller's mistake and is reported, not guessed at.
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::trim).unwrap_or("") {
            "" | "json" => Ok(Self::Json),
            "toon" => Ok(Self::Toon),
            other => bail!("unknown output format {other:?} (expected \"json\" or \"toon\")"),
        }
    }

    pub fn encode(self, value: &Value) -> Result<String> {
        match self {
            Self::Json => Ok(serde_json::to_string_pretty(value)?),
            Self::Toon => Ok(encode_toon(value)),
        }
    }
}

/// Encode a JSON value as TOON lines:
///
/// ```text
/// name: grepai
/// count: 3
/// tags[2]: fast,local
/// edges[2]{caller,callee}:
///   Main,Run
///   Run,Load
/// nested:
///   key: value
/// ```
pub fn encode_toon(value: &Value) -> String {
    let mut lines = Vec::new();
    match value {
        Value::Object(map) => {
            for (key, entry) in map {
                encode_entry(key, entry, 0, &mut lines);
            }
        }
        other => lines.push(scalar(other)),
    }
    lines.join("\n")
}

fn encode_entry(key: &str, value: &Value, indent: usize, lines: &mut Vec<String>) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            lines.push(format!("{pad}{key}:"));
            for (child_key, child) in map {
                encode_entry(child_key, child, indent + 1, lines);
            }
        }
        Value::Array(items) => encode_array(key, items, indent, lines),
        scalar_value => lines.push(format!("{pad}{key}: {}", scalar(scalar_value))),
    }
}

fn encode_array(key: &str, items: &[Value], indent: usize, lines: &mut Vec<String>) {
    let pad = "  ".repeat(indent);

    if items.is_empty() {
        lines.push(format!("{pad}{key}[0]:"));
        return;
    }

    // Uniform object arrays render as a header plus CSV rows.
    if let Some(fields) = uniform_fields(items) {
        lines.push(format!("{pad}{key}[{}]{{{}}}:", items.len(), fields.join(",")));
        let row_pad = "  ".repeat(indent + 1);
        for item in items {
            let row: Vec<String> = fields
                .iter()
                .map(|field| scalar(item.get(field.as_str()).unwrap_or(&Value::Null)))
                .collect();
            lines.push(format!("{row_pad}{}", row.join(",")));
        }
        return;
    }

    if items.iter().all(|item| !item.is_object() && !item.is_array()) {
        let rendered: Vec<String> = items.iter().map(scalar).collect();
        lines.push(format!("{pad}{key}[{}]: {}", items.len(), rendered.join(",")));
        return;
    }

    // Mixed arrays fall back to one indexed entry per element.
    lines.push(format!("{pad}{key}[{}]:", items.len()));
    for (index, item) in items.iter().enumerate() {
        encode_entry(&index.to_string(), item, indent + 1, lines);
    }
}

/// Field list shared by every object in the array, in first-object order.
fn uniform_fields(items: &[Value]) -> Option<Vec<String>> {
    let first = items.first()?.as_object()?;
    let fields: Vec<String> = first.keys().cloned().collect();
    for item in items {
        let object = item.as_object()?;
        if object.len() != fields.len() || !fields.iter().all(|f| object.contains_key(f)) {
            return None;
        }
        if object.values().any(|v| v.is_object() || v.is_array()) {
            return None;
        }
    }
    Some(fields)
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => {
            if text.is_empty()
                || text.contains(',')
                || text.contains(':')
                || text.contains('\n')
                || text.starts_with(' ')
                || text.ends_with(' ')
            {
                format!("{:?}", text)
            } else {
                text.clone()
            }
        }
        other => other.to_string(),
    }
}
