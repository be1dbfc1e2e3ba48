//! Deterministic schema export (C7).
//!
//! Reuses the C2 registry and normalizer directly: export's determinism
//! guarantee depends on running the exact same sort/emit pass the validator
//! uses, so there is no separate export-only serialization path.

use std::path::PathBuf;

use chrono::Utc;
use fulmen_error::{Error, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::{emit, parse, sort_keys, Format};
use crate::registry::Registry;
use crate::validate::validate_schema;

const CRUCIBLE_VERSION: &str = "1";

/// Options controlling [`export_schema`].
pub struct ExportOptions {
    pub schema_id: String,
    pub out_path: PathBuf,
    /// `None` means "infer from `out_path`'s extension".
    pub format: Option<Format>,
    pub include_provenance: bool,
    pub validate: bool,
    pub overwrite: bool,
}

impl ExportOptions {
    #[must_use]
    pub fn new(schema_id: impl Into<String>, out_path: impl Into<PathBuf>) -> Self {
        ExportOptions {
            schema_id: schema_id.into(),
            out_path: out_path.into(),
            format: None,
            include_provenance: true,
            validate: true,
            overwrite: false,
        }
    }
}

/// The provenance block attached to exports when `include_provenance` is
/// set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub schema_id: String,
    pub crucible_version: String,
    pub library_version: String,
    pub revision: String,
    pub exported_at: String,
    pub export_source: String,
}

fn current_revision() -> String {
    std::env::var("FULMEN_REVISION").unwrap_or_else(|_| "0".repeat(40))
}

fn build_provenance(schema_id: &str) -> Provenance {
    Provenance {
        schema_id: schema_id.to_string(),
        crucible_version: CRUCIBLE_VERSION.to_string(),
        library_version: env!("CARGO_PKG_VERSION").to_string(),
        revision: current_revision(),
        exported_at: Utc::now().to_rfc3339(),
        export_source: "fulmen-schema".to_string(),
    }
}

fn resolve_format(options: &ExportOptions) -> Result<Format, Error> {
    if let Some(f) = options.format {
        return Ok(f);
    }
    options
        .out_path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(Format::from_extension)
        .ok_or_else(|| {
            Error::new(
                ErrorCode::SchemaExportInvalidFormat,
                format!(
                    "cannot infer export format from '{}': use .json, .yaml, or .yml",
                    options.out_path.display()
                ),
            )
        })
}

fn inject_json_provenance(value: &mut Value, prov: &Provenance) {
    let obj = value
        .as_object_mut()
        .expect("schema documents are objects at the top level");
    let comment = obj
        .entry("$comment")
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Value::Object(comment_map) = comment {
        comment_map.insert(
            "x-crucible-source".to_string(),
            serde_json::to_value(prov).expect("Provenance serializes"),
        );
    }
}

fn yaml_provenance_comment(prov: &Provenance) -> String {
    format!(
        "# x-crucible-source:\n#   schema_id: {}\n#   crucible_version: {}\n#   library_version: {}\n#   revision: {}\n#   exported_at: {}\n#   export_source: {}\n",
        prov.schema_id,
        prov.crucible_version,
        prov.library_version,
        prov.revision,
        prov.exported_at,
        prov.export_source
    )
}

/// Export the schema registered as `options.schema_id` to `options.out_path`.
///
/// 1. Resolve through `registry` (fails `schema-not-found`).
/// 2. Resolve format, explicit or inferred from extension (fails
///    `INVALID_FORMAT`).
/// 3. Refuse to clobber an existing file unless `overwrite` is set (fails
///    `FILE_EXISTS`).
/// 4. Meta-validate when `validate` is set.
/// 5. Attach provenance when `include_provenance` is set.
/// 6. Serialize canonically and write, creating parent directories.
///
/// Two exports with `include_provenance: false` of the same schema are
/// byte-identical.
pub fn export_schema(registry: &Registry, options: &ExportOptions) -> Result<(), Error> {
    let entry = registry.get_schema(&options.schema_id)?;
    let format = resolve_format(options)?;

    if !options.overwrite && options.out_path.exists() {
        return Err(Error::new(
            ErrorCode::SchemaExportFileExists,
            format!("{} already exists and overwrite is false", options.out_path.display()),
        ));
    }

    let raw = std::fs::read_to_string(&entry.path).map_err(|e| {
        Error::new(
            ErrorCode::FileNotFound,
            format!("failed to read {}: {e}", entry.path.display()),
        )
        .with_cause(e)
    })?;
    let mut value = parse(&raw, entry.format)?;

    if options.validate {
        validate_schema(&value)?;
    }

    let provenance = options.include_provenance.then(|| build_provenance(&options.schema_id));

    if let (Format::Json, Some(prov)) = (format, &provenance) {
        inject_json_provenance(&mut value, prov);
    }

    let body = match format {
        Format::Json => emit(&sort_keys(&value), true),
        Format::Yaml => serde_yaml::to_string(&sort_keys(&value)).map_err(|e| {
            Error::new(ErrorCode::SchemaExportWriteFailed, format!("YAML serialization failed: {e}"))
        })?,
    };

    let final_text = match (format, &provenance) {
        (Format::Yaml, Some(prov)) => format!("{}{}", yaml_provenance_comment(prov), body),
        _ => body,
    };

    if let Some(parent) = options.out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::new(
                ErrorCode::SchemaExportWriteFailed,
                format!("failed to create {}: {e}", parent.display()),
            )
            .with_cause(e)
        })?;
    }
    std::fs::write(&options.out_path, final_text).map_err(|e| {
        Error::new(
            ErrorCode::SchemaExportWriteFailed,
            format!("failed to write {}: {e}", options.out_path.display()),
        )
        .with_cause(e)
    })
}

/// Remove a provenance block from exported `content`.
///
/// For JSON, parses the document, removes `$comment["x-crucible-source"]`
/// (dropping `$comment` entirely if it becomes empty), and re-emits
/// canonically. For YAML, trims the leading `# x-crucible-source:` comment
/// block (and any blank lines left behind) without reparsing, since the
/// provenance there lives outside the parsed document.
pub fn strip_provenance(content: &str, format: Format) -> Result<String, Error> {
    match format {
        Format::Json => {
            let mut value = parse(content, Format::Json)?;
            if let Some(obj) = value.as_object_mut() {
                let mut drop_comment = false;
                if let Some(Value::Object(comment_map)) = obj.get_mut("$comment") {
                    comment_map.remove("x-crucible-source");
                    drop_comment = comment_map.is_empty();
                }
                if drop_comment {
                    obj.remove("$comment");
                }
            }
            Ok(emit(&sort_keys(&value), true))
        }
        Format::Yaml => {
            let lines: Vec<&str> = content.lines().collect();
            let mut idx = 0;
            while idx < lines.len()
                && (lines[idx].trim_start().starts_with('#') || lines[idx].trim().is_empty())
            {
                idx += 1;
            }
            Ok(lines[idx..].join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn setup_registry() -> (tempfile::TempDir, Registry) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("widget.schema.json"),
            r#"{"type":"object","properties":{"name":{"type":"string"}}}"#,
        )
        .unwrap();
        let registry = Registry::new(dir.path());
        (dir, registry)
    }

    #[test]
    fn export_without_provenance_is_deterministic() {
        let (dir, registry) = setup_registry();
        let out_a = dir.path().join("a.schema.json");
        let out_b = dir.path().join("b.schema.json");
        let mut opts_a = ExportOptions::new("widget", &out_a);
        opts_a.include_provenance = false;
        let mut opts_b = ExportOptions::new("widget", &out_b);
        opts_b.include_provenance = false;
        export_schema(&registry, &opts_a).unwrap();
        export_schema(&registry, &opts_b).unwrap();
        assert_eq!(fs::read_to_string(out_a).unwrap(), fs::read_to_string(out_b).unwrap());
    }

    #[test]
    fn export_refuses_to_overwrite_by_default() {
        let (dir, registry) = setup_registry();
        let out = dir.path().join("out.schema.json");
        fs::write(&out, "{}").unwrap();
        let opts = ExportOptions::new("widget", &out);
        let err = export_schema(&registry, &opts).unwrap_err();
        assert_eq!(err.code(), fulmen_error::ErrorCode::SchemaExportFileExists);
    }

    #[test]
    fn export_rejects_unresolvable_format() {
        let (dir, registry) = setup_registry();
        let out = dir.path().join("out.unknown");
        let opts = ExportOptions::new("widget", &out);
        let err = export_schema(&registry, &opts).unwrap_err();
        assert_eq!(err.code(), fulmen_error::ErrorCode::SchemaExportInvalidFormat);
    }

    #[test]
    fn round_trip_strips_back_to_runtime_schema() {
        let (dir, registry) = setup_registry();
        let out = dir.path().join("out.schema.json");
        let opts = ExportOptions::new("widget", &out);
        export_schema(&registry, &opts).unwrap();

        let exported = fs::read_to_string(&out).unwrap();
        let stripped = strip_provenance(&exported, Format::Json).unwrap();

        let runtime_entry = registry.get_schema("widget").unwrap();
        let runtime_raw = fs::read_to_string(&runtime_entry.path).unwrap();
        let runtime_normalized =
            crate::normalize::normalize_schema(&runtime_raw, runtime_entry.format, true).unwrap();

        assert_eq!(stripped, runtime_normalized);
    }
}
