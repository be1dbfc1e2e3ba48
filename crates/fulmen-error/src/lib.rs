//! Cross-cutting error taxonomy (C8) shared by every fulmen runtime crate.
//!
//! Every public operation in the fulmen workspace that can fail at
//! construction time returns [`Error`]: a structured envelope carrying a
//! stable [`ErrorCode`], a [`Severity`], a correlation id, free-form context,
//! and an optional cause chain. Runtime dispatch failures (handler panics,
//! sink write failures, external validator timeouts) are *not* represented
//! as `Error` return values — per spec they are reported via logging and
//! telemetry and the caller keeps running; see each component's module docs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity of an error envelope, independent of the error's Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Stable error codes named in spec §4.8 and §7.
///
/// Codes double as the `code` field of the error envelope and, for the
/// construction-time subset with a conventional exit code, map to the
/// numbers in spec §4.8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ConfigInvalid,
    DataInvalid,
    FileNotFound,
    FileWrite,
    OperationFailed,
    CatalogMissing,
    CatalogInvalidSchema,
    SchemaNotFound,
    SchemaValidation,
    SchemaCompile,
    SchemaExportFileExists,
    SchemaExportInvalidFormat,
    SchemaExportWriteFailed,
    PolicyViolation,
    DigestState,
    InvalidChecksum,
    UnsupportedAlgorithm,
    HandlerTimeout,
    HandlerError,
    ConfigReloadValidationFailed,
    ConfigReloadError,
    HttpAuthFailed,
    HttpRateLimited,
}

impl ErrorCode {
    /// Conventional exit code, where spec §4.8 defines one. Codes without an
    /// explicit mapping return `None`; callers needing a process exit code
    /// for those (there are none in this library — it never calls
    /// `process::exit` on their account) should treat `None` as "not
    /// applicable to process exit".
    #[must_use]
    pub fn conventional_exit_code(self) -> Option<i32> {
        match self {
            ErrorCode::ConfigInvalid => Some(30),
            ErrorCode::DataInvalid => Some(40),
            ErrorCode::FileNotFound => Some(51),
            ErrorCode::FileWrite => Some(54),
            _ => None,
        }
    }

    /// Default severity for this code, used when a caller doesn't override
    /// it explicitly via [`Error::new`]'s `severity` argument.
    #[must_use]
    pub fn default_severity(self) -> Severity {
        use ErrorCode::*;
        match self {
            ConfigInvalid => Severity::High,
            DataInvalid => Severity::Medium,
            FileNotFound => Severity::Medium,
            FileWrite => Severity::High,
            OperationFailed => Severity::Medium,
            CatalogMissing => Severity::High,
            CatalogInvalidSchema => Severity::High,
            SchemaNotFound => Severity::Medium,
            SchemaValidation => Severity::Medium,
            SchemaCompile => Severity::High,
            SchemaExportFileExists => Severity::Low,
            SchemaExportInvalidFormat => Severity::Medium,
            SchemaExportWriteFailed => Severity::High,
            PolicyViolation => Severity::High,
            DigestState => Severity::Medium,
            InvalidChecksum => Severity::Medium,
            UnsupportedAlgorithm => Severity::Medium,
            HandlerTimeout => Severity::Medium,
            HandlerError => Severity::Medium,
            ConfigReloadValidationFailed => Severity::Medium,
            ConfigReloadError => Severity::High,
            HttpAuthFailed => Severity::Low,
            HttpRateLimited => Severity::Low,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            ConfigInvalid => "config_invalid",
            DataInvalid => "data_invalid",
            FileNotFound => "file_not_found",
            FileWrite => "file_write",
            OperationFailed => "operation_failed",
            CatalogMissing => "catalog_missing",
            CatalogInvalidSchema => "catalog_invalid_schema",
            SchemaNotFound => "schema_not_found",
            SchemaValidation => "schema_validation",
            SchemaCompile => "schema_compile",
            SchemaExportFileExists => "export_file_exists",
            SchemaExportInvalidFormat => "export_invalid_format",
            SchemaExportWriteFailed => "schema_export_write_failed",
            PolicyViolation => "policy_violation",
            DigestState => "digest_state",
            InvalidChecksum => "invalid_checksum",
            UnsupportedAlgorithm => "unsupported_algorithm",
            HandlerTimeout => "handler_timeout",
            HandlerError => "handler_error",
            ConfigReloadValidationFailed => "config_reload_validation_failed",
            ConfigReloadError => "config_reload_error",
            HttpAuthFailed => "http_auth_failed",
            HttpRateLimited => "http_rate_limited",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured error envelope described in spec §3/§4.8.
///
/// Immutable once constructed. Wrapping (via [`wrap`]) preserves the cause
/// chain by nesting rather than discarding the original error.
#[derive(Debug)]
pub struct Error {
    code: ErrorCode,
    message: String,
    severity: Severity,
    correlation_id: Uuid,
    cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    context: BTreeMap<String, serde_json::Value>,
}

impl Error {
    /// Build a new envelope with the code's default severity.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            severity: code.default_severity(),
            correlation_id: Uuid::new_v4(),
            cause: None,
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    #[must_use]
    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn context(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.context
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{code}] {message} (severity={severity}, correlation_id={correlation_id})",
            code = self.code,
            message = self.message,
            severity = self.severity,
            correlation_id = self.correlation_id
        )
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Lift any opaque error into the envelope, preserving it as the cause.
///
/// Mirrors the teacher's `XCheckerError`-aggregation idiom: library code
/// never constructs an envelope for an error it didn't itself raise without
/// going through this function or [`wrap`], so the original error is never
/// silently dropped.
pub fn from_error(
    e: impl std::error::Error + Send + Sync + 'static,
    code: ErrorCode,
    severity: Option<Severity>,
) -> Error {
    let message = e.to_string();
    let mut err = Error::new(code, message).with_cause(e);
    if let Some(s) = severity {
        err = err.with_severity(s);
    }
    err
}

/// Add context to an existing envelope without losing the cause chain.
///
/// The returned `Error` keeps `err`'s code, severity, and correlation id;
/// the supplied context entries are merged in (new keys win on conflict),
/// and `err` itself becomes the cause of the returned envelope so the full
/// chain remains inspectable via [`std::error::Error::source`].
#[must_use]
pub fn wrap(err: Error, extra_context: impl IntoIterator<Item = (String, serde_json::Value)>) -> Error {
    let code = err.code;
    let severity = err.severity;
    let correlation_id = err.correlation_id;
    let message = err.message.clone();
    let mut context = err.context.clone();
    for (k, v) in extra_context {
        context.insert(k, v);
    }
    Error {
        code,
        message,
        severity,
        correlation_id,
        cause: Some(Box::new(err)),
        context,
    }
}

/// Convenience `Result` alias used throughout the fulmen workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_spec_table() {
        assert_eq!(ErrorCode::ConfigInvalid.conventional_exit_code(), Some(30));
        assert_eq!(ErrorCode::DataInvalid.conventional_exit_code(), Some(40));
        assert_eq!(ErrorCode::FileNotFound.conventional_exit_code(), Some(51));
        assert_eq!(ErrorCode::FileWrite.conventional_exit_code(), Some(54));
        assert_eq!(ErrorCode::OperationFailed.conventional_exit_code(), None);
    }

    #[test]
    fn wrap_preserves_cause_chain() {
        let base = Error::new(ErrorCode::SchemaValidation, "bad schema");
        let wrapped = wrap(base, [("file".to_string(), serde_json::json!("a.schema.json"))]);
        assert_eq!(wrapped.code(), ErrorCode::SchemaValidation);
        assert!(std::error::Error::source(&wrapped).is_some());
        assert_eq!(
            wrapped.context().get("file"),
            Some(&serde_json::json!("a.schema.json"))
        );
    }

    #[test]
    fn from_error_preserves_source() {
        let io_err = std::io::Error::other("disk full");
        let err = from_error(io_err, ErrorCode::FileWrite, None);
        assert_eq!(err.severity(), Severity::High);
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn correlation_ids_are_unique() {
        let a = Error::new(ErrorCode::DataInvalid, "x");
        let b = Error::new(ErrorCode::DataInvalid, "x");
        assert_ne!(a.correlation_id(), b.correlation_id());
    }
}
