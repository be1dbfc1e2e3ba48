//! The logger itself: profiles, construction, emission, and child loggers.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use fulmen_error::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::event::{ErrorDetail, LogEvent, Severity};
use crate::middleware::{AddFieldsMiddleware, Middleware, Pipeline, RedactionMiddleware};
use crate::policy::{load_policy_from_path, resolve_policy_path, PolicyDocument};
use crate::sinks::{ConsoleSink, FileSink, Sink};

/// Logging profile, selected at construction (spec §3/§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Profile {
    Simple,
    Structured,
    Enterprise,
    Custom,
}

struct Shared {
    service: String,
    profile: Profile,
    pipeline: Pipeline,
    sinks: Vec<Box<dyn Sink>>,
    inject_correlation_id: bool,
}

/// The logging engine. `SIMPLE`/`STRUCTURED`/`ENTERPRISE` are views over
/// the same construction path; `CUSTOM` exposes [`Builder`] directly.
pub struct Logger {
    shared: Arc<Shared>,
    bindings: BTreeMap<String, Value>,
}

impl Logger {
    #[must_use]
    pub fn simple(service: impl Into<String>) -> Self {
        Builder::new(service, Profile::Simple).build()
    }

    #[must_use]
    pub fn structured(service: impl Into<String>, file_path: Option<&Path>) -> Self {
        let mut builder = Builder::new(service, Profile::Structured).with_correlation_injection(true);
        if let Some(path) = file_path {
            builder = builder.with_sink(Box::new(FileSink::new(path)));
        }
        builder.build()
    }

    #[must_use]
    pub fn enterprise(service: impl Into<String>, sinks: Vec<Box<dyn Sink>>) -> Self {
        let mut builder = Builder::new(service, Profile::Enterprise)
            .with_correlation_injection(true)
            .with_middleware(Box::new(RedactionMiddleware::new()));
        for sink in sinks {
            builder = builder.with_sink(sink);
        }
        builder.build()
    }

    #[must_use]
    pub fn builder(service: impl Into<String>) -> Builder {
        Builder::new(service, Profile::Custom)
    }

    #[must_use]
    pub fn profile(&self) -> Profile {
        self.shared.profile
    }

    /// Emits an event through the middleware pipeline to every sink.
    pub fn log(&self, severity: Severity, message: impl Into<String>, fields: BTreeMap<String, Value>) {
        let mut event = LogEvent::new(&self.shared.service, severity, message);
        if self.shared.inject_correlation_id && event.correlation_id.is_none() {
            event.correlation_id = Some(Uuid::new_v4());
        }
        if self.shared.profile == Profile::Enterprise {
            event.host = hostname();
            event.pid = Some(std::process::id());
        }
        event.merge_context(&self.bindings);
        event.merge_context(&fields);
        let event = self.shared.pipeline.run(event);
        for sink in &self.shared.sinks {
            sink.write(&event);
        }
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(Severity::Debug, message, BTreeMap::new());
    }
    pub fn info(&self, message: impl Into<String>) {
        self.log(Severity::Info, message, BTreeMap::new());
    }
    pub fn warn(&self, message: impl Into<String>) {
        self.log(Severity::Warn, message, BTreeMap::new());
    }
    pub fn error(&self, message: impl Into<String>, error: Option<ErrorDetail>) {
        let mut event = LogEvent::new(&self.shared.service, Severity::Error, message);
        event.error = error;
        if self.shared.inject_correlation_id && event.correlation_id.is_none() {
            event.correlation_id = Some(Uuid::new_v4());
        }
        event.merge_context(&self.bindings);
        let event = self.shared.pipeline.run(event);
        for sink in &self.shared.sinks {
            sink.write(&event);
        }
    }
    pub fn fatal(&self, message: impl Into<String>) {
        self.log(Severity::Fatal, message, BTreeMap::new());
    }

    /// Returns a logger that merges `bindings` into every event emitted
    /// through it. Middleware, sinks, and policy are inherited; nested
    /// children accumulate bindings with later keys winning.
    #[must_use]
    pub fn child(&self, bindings: BTreeMap<String, Value>) -> Logger {
        let mut merged = self.bindings.clone();
        for (k, v) in bindings {
            merged.insert(k, v);
        }
        Logger { shared: Arc::clone(&self.shared), bindings: merged }
    }
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok().or_else(|| {
        std::process::Command::new("hostname")
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
    })
}

/// Pass-through builder backing all four profiles.
pub struct Builder {
    service: String,
    profile: Profile,
    pipeline: Pipeline,
    sinks: Vec<Box<dyn Sink>>,
    inject_correlation_id: bool,
    policy_file: Option<std::path::PathBuf>,
    environment: Option<String>,
    app_type: Option<String>,
}

impl Builder {
    #[must_use]
    pub fn new(service: impl Into<String>, profile: Profile) -> Self {
        let mut pipeline = Pipeline::new();
        let mut sinks: Vec<Box<dyn Sink>> = Vec::new();
        if profile == Profile::Simple || profile == Profile::Structured {
            sinks.push(Box::new(ConsoleSink));
        }
        if profile == Profile::Enterprise {
            pipeline.push(Box::new(AddFieldsMiddleware::new(BTreeMap::new())));
            sinks.push(Box::new(ConsoleSink));
        }
        Builder {
            service: service.into(),
            profile,
            pipeline,
            sinks,
            inject_correlation_id: false,
            policy_file: None,
            environment: None,
            app_type: None,
        }
    }

    #[must_use]
    pub fn with_middleware(mut self, middleware: Box<dyn Middleware>) -> Self {
        self.pipeline.push(middleware);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sinks.push(sink);
        self
    }

    #[must_use]
    pub fn with_correlation_injection(mut self, enabled: bool) -> Self {
        self.inject_correlation_id = enabled;
        self
    }

    #[must_use]
    pub fn with_policy_file(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.policy_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    #[must_use]
    pub fn with_app_type(mut self, app_type: impl Into<String>) -> Self {
        self.app_type = Some(app_type.into());
        self
    }

    /// Builds the logger, enforcing policy if one is configured. Policy
    /// violations at construction time are fatal.
    pub fn try_build(self) -> Result<Logger, Error> {
        if let Some(path) = &self.policy_file {
            let resolved = resolve_policy_path(Some(path))?;
            if let Some(resolved) = resolved {
                let policy: PolicyDocument = load_policy_from_path(&resolved)?;
                policy
                    .validate(self.profile, self.environment.as_deref(), self.app_type.as_deref())
                    .map_err(|e| {
                        fulmen_error::Error::new(fulmen_error::ErrorCode::PolicyViolation, e.message)
                    })?;
            }
        }
        Ok(Logger {
            shared: Arc::new(Shared {
                service: self.service,
                profile: self.profile,
                pipeline: self.pipeline,
                sinks: self.sinks,
                inject_correlation_id: self.inject_correlation_id,
            }),
            bindings: BTreeMap::new(),
        })
    }

    /// Infallible construction for profiles built without a policy file.
    #[must_use]
    pub fn build(self) -> Logger {
        self.try_build().expect("logger construction without a policy file cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_profile_has_console_sink() {
        let logger = Logger::simple("svc");
        assert_eq!(logger.profile(), Profile::Simple);
        logger.info("hello");
    }

    #[test]
    fn child_logger_accumulates_bindings() {
        let logger = Logger::simple("svc");
        let child = logger.child([("req_id".to_string(), Value::from("abc"))].into_iter().collect());
        let grandchild = child.child([("user".to_string(), Value::from("alice"))].into_iter().collect());
        assert_eq!(grandchild.bindings["req_id"], Value::from("abc"));
        assert_eq!(grandchild.bindings["user"], Value::from("alice"));
    }

    #[test]
    fn policy_violation_at_construction_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let policy_path = dir.path().join("policy.yaml");
        std::fs::write(&policy_path, "allowedProfiles:\n  - STRUCTURED\n").unwrap();
        let result = Builder::new("svc", Profile::Simple).with_policy_file(&policy_path).try_build();
        assert!(result.is_err());
    }
}
