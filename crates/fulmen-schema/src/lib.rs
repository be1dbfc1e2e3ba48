//! JSON Schema compilation, validation, normalization, file-addressed
//! registry, and deterministic export (C2 + C7).

pub mod export;
pub mod normalize;
pub mod registry;
pub mod validate;

pub use export::{export_schema, strip_provenance, ExportOptions, Provenance};
pub use normalize::{normalize_schema, Format};
pub use registry::{Registry, SchemaEntry};
pub use validate::{
    compile_schema, compile_schema_by_id, format_diagnostics, validate_data, validate_file,
    validate_schema, CompiledValidator, Diagnostic, DiagnosticSeverity, Source, ValidationOutcome,
};
