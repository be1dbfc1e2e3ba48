//! Schema compilation and data validation (C2).
//!
//! Built on the `jsonschema` crate, which natively dialect-sniffs `$schema`
//! across draft-04 through 2020-12. Compilation/meta-validation failures
//! raise [`fulmen_error::Error`]; data validation never raises — it always
//! returns a [`ValidationOutcome`] with `valid: false` and diagnostics on
//! failure, per spec.

use std::path::Path;
use std::process::Command;

use fulmen_error::{Error, ErrorCode};
use serde_json::Value;

use crate::registry::Registry;

/// Where a validation result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    InProcess,
    Goneat,
}

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warn,
}

/// A single validation finding.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub pointer: String,
    pub message: String,
    pub keyword: String,
    pub severity: DiagnosticSeverity,
    pub source: Source,
    pub data: Option<Value>,
}

/// Result of validating data against a compiled schema.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub source: Source,
}

/// A compiled, reusable validator.
pub struct CompiledValidator {
    validator: jsonschema::Validator,
    schema_id: Option<String>,
}

/// Compile `schema` into a reusable [`CompiledValidator`].
pub fn compile_schema(schema: &Value) -> Result<CompiledValidator, Error> {
    let validator = jsonschema::options()
        .build(schema)
        .map_err(|e| Error::new(ErrorCode::SchemaCompile, format!("schema compilation failed: {e}")))?;
    Ok(CompiledValidator {
        validator,
        schema_id: None,
    })
}

/// Resolve `id` through `registry`, load and parse it, and compile it.
pub fn compile_schema_by_id(registry: &Registry, id: &str) -> Result<CompiledValidator, Error> {
    let entry = registry.get_schema(id)?;
    let content = std::fs::read_to_string(&entry.path).map_err(|e| {
        Error::new(
            ErrorCode::FileNotFound,
            format!("failed to read schema {}: {e}", entry.path.display()),
        )
        .with_cause(e)
    })?;
    let value = crate::normalize::parse(&content, entry.format)?;
    let mut compiled = compile_schema(&value)?;
    compiled.schema_id = Some(id.to_string());
    Ok(compiled)
}

/// Meta-validate `schema`: does it conform to its own declared dialect?
pub fn validate_schema(schema: &Value) -> Result<(), Error> {
    jsonschema::meta::validate(schema)
        .map_err(|e| Error::new(ErrorCode::SchemaCompile, format!("schema is not meta-valid: {e}")))
}

/// Validate `data` against `validator`. Never fails; returns a
/// [`ValidationOutcome`] reflecting the result. Delegates to the external
/// `GONEAT_PATH` binary first when configured and executable; falls back to
/// the in-process `jsonschema` validator otherwise, appending a
/// `goneat-unavailable` diagnostic when no external binary was found.
#[must_use]
pub fn validate_data(data: &Value, validator: &CompiledValidator) -> ValidationOutcome {
    if let Some(schema_id) = &validator.schema_id {
        if let Some(outcome) = try_goneat_validate(schema_id, data) {
            return outcome;
        }
    }
    let mut diagnostics = Vec::new();
    for error in validator.validator.iter_errors(data) {
        diagnostics.push(Diagnostic {
            pointer: error.instance_path.to_string(),
            message: error.to_string(),
            keyword: keyword_of(&error),
            severity: DiagnosticSeverity::Error,
            source: Source::InProcess,
            data: None,
        });
    }
    if goneat_path().is_none() {
        diagnostics.push(Diagnostic {
            pointer: String::new(),
            message: "GONEAT_PATH not configured or binary not executable; used in-process validator".to_string(),
            keyword: "goneat-unavailable".to_string(),
            severity: DiagnosticSeverity::Warn,
            source: Source::InProcess,
            data: None,
        });
    }
    ValidationOutcome {
        valid: diagnostics
            .iter()
            .all(|d| d.severity != DiagnosticSeverity::Error),
        diagnostics,
        source: Source::InProcess,
    }
}

fn keyword_of(error: &jsonschema::ValidationError<'_>) -> String {
    error
        .schema_path
        .to_string()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Validate the file at `path` against `validator`.
pub fn validate_file(path: &Path, validator: &CompiledValidator) -> Result<ValidationOutcome, Error> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::new(
            ErrorCode::FileNotFound,
            format!("failed to read {}: {e}", path.display()),
        )
        .with_cause(e)
    })?;
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(crate::normalize::Format::from_extension)
        .ok_or_else(|| {
            Error::new(
                ErrorCode::SchemaExportInvalidFormat,
                format!("cannot infer format for {}", path.display()),
            )
        })?;
    let data = crate::normalize::parse(&content, format)?;
    Ok(validate_data(&data, validator))
}

/// `"No validation issues found."` if `diagnostics` is empty; otherwise one
/// line per diagnostic, in the document order they were reported.
#[must_use]
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "No validation issues found.".to_string();
    }
    diagnostics
        .iter()
        .map(|d| format!("[{:?}] {} ({}): {}", d.severity, d.pointer, d.keyword, d.message))
        .collect::<Vec<_>>()
        .join("\n")
}

fn goneat_path() -> Option<std::path::PathBuf> {
    if let Ok(p) = std::env::var("GONEAT_PATH") {
        let path = std::path::PathBuf::from(p);
        if path.is_file() {
            return Some(path);
        }
        return None;
    }
    which::which("goneat").ok()
}

/// Best-effort delegation to an external `goneat` binary. Returns `None`
/// (falling back to the in-process path) when no binary is configured, it
/// isn't executable, or invocation fails for any reason — this bridge is a
/// single synchronous call with captured output, not a supervised process.
fn try_goneat_validate(_schema_id: &str, data: &Value) -> Option<ValidationOutcome> {
    let bin = goneat_path()?;
    let payload = serde_json::to_string(data).ok()?;
    let output = Command::new(&bin)
        .arg("validate")
        .arg("-")
        .env("GONEAT_STDIN_PAYLOAD", payload)
        .output()
        .ok()?;
    let valid = output.status.success();
    Some(ValidationOutcome {
        valid,
        diagnostics: Vec::new(),
        source: Source::Goneat,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn valid_data_passes_with_no_diagnostics_besides_goneat_note() {
        std::env::remove_var("GONEAT_PATH");
        let schema = json!({"type": "object", "required": ["name"], "properties": {"name": {"type": "string"}}});
        let validator = compile_schema(&schema).unwrap();
        let outcome = validate_data(&json!({"name": "ok"}), &validator);
        assert!(outcome.valid);
    }

    #[test]
    fn invalid_data_reports_diagnostics_without_raising() {
        std::env::remove_var("GONEAT_PATH");
        let schema = json!({"type": "object", "required": ["name"]});
        let validator = compile_schema(&schema).unwrap();
        let outcome = validate_data(&json!({}), &validator);
        assert!(!outcome.valid);
        assert!(outcome.diagnostics.iter().any(|d| d.severity == DiagnosticSeverity::Error));
    }

    #[test]
    fn format_diagnostics_empty_case() {
        assert_eq!(format_diagnostics(&[]), "No validation issues found.");
    }

    #[test]
    fn compile_schema_rejects_malformed_schema() {
        let schema = json!({"type": "not-a-real-type"});
        assert!(compile_schema(&schema).is_err());
    }

    #[test]
    fn meta_validate_accepts_trivial_schema() {
        assert!(validate_schema(&json!({"type": "object"})).is_ok());
    }
}
