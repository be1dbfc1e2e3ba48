//! Canonical normalization of JSON/YAML schema documents.
//!
//! Parses either format into a `serde_json::Value`, recursively sorts
//! object keys lexicographically (array order is left untouched), and
//! re-serializes as indented or compact JSON. This is deliberately a
//! hand-rolled key sort rather than the teacher's JCS-based
//! `emit_jcs`/`serde_json_canonicalizer` pipeline — JCS's number formatting
//! rules are stricter than schema documents need, see `DESIGN.md`.

use fulmen_error::{Error, ErrorCode};
use serde_json::Value;

/// Source format of a schema document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// Infer a format from a file extension, returning `None` for anything
    /// that isn't `.json`, `.yaml`, or `.yml`.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Format> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }
}

/// Parse `content` as `format` into a `serde_json::Value`.
pub fn parse(content: &str, format: Format) -> Result<Value, Error> {
    match format {
        Format::Json => serde_json::from_str(content).map_err(|e| {
            Error::new(ErrorCode::DataInvalid, format!("invalid JSON: {e}")).with_cause(e)
        }),
        Format::Yaml => serde_yaml::from_str(content).map_err(|e| {
            Error::new(ErrorCode::DataInvalid, format!("invalid YAML: {e}")).with_cause(e)
        }),
    }
}

/// Recursively sort object keys lexicographically. Arrays keep their order;
/// every other value passes through unchanged. Idempotent:
/// `sort_keys(sort_keys(v)) == sort_keys(v)`.
#[must_use]
pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = serde_json::Map::new();
            for k in keys {
                sorted.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// Emit `value` as JSON text: `pretty` selects indented vs. compact form.
#[must_use]
pub fn emit(value: &Value, pretty: bool) -> String {
    if pretty {
        serde_json::to_string_pretty(value).expect("Value serialization cannot fail")
    } else {
        serde_json::to_string(value).expect("Value serialization cannot fail")
    }
}

/// Parse, sort, and re-emit `content` as canonical JSON text.
///
/// `normalize(normalize(x)) == normalize(x)`, and
/// `normalize(yaml(x)) == normalize(json(x))` for documents representing
/// the same value, since both paths converge on the same `Value` and the
/// same sort/emit pass.
pub fn normalize_schema(content: &str, format: Format, pretty: bool) -> Result<String, Error> {
    let value = parse(content, format)?;
    Ok(emit(&sort_keys(&value), pretty))
}
