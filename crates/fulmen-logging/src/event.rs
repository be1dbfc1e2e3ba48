//! Log event data model (spec §3).

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Severity levels, ordered least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

/// Error detail carried on a log event, analogous to a caught exception.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// A single structured log event. Immutable once the middleware pipeline
/// has finished running; every sink receives the same finalized value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub service: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(flatten)]
    pub context: BTreeMap<String, Value>,
}

impl LogEvent {
    #[must_use]
    pub fn new(service: impl Into<String>, severity: Severity, message: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Utc::now().to_rfc3339(),
            service: service.into(),
            severity,
            message: message.into(),
            correlation_id: None,
            host: None,
            pid: None,
            error: None,
            context: BTreeMap::new(),
        }
    }

    /// Shallow-merge `bindings` into the event's context, later keys
    /// overwriting existing ones — the rule child loggers and the
    /// add-fields middleware both rely on.
    pub fn merge_context(&mut self, bindings: &BTreeMap<String, Value>) {
        for (k, v) in bindings {
            self.context.insert(k.clone(), v.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_has_no_optional_fields() {
        let event = LogEvent::new("svc", Severity::Info, "hello");
        assert!(event.correlation_id.is_none());
        assert!(event.host.is_none());
        assert!(event.context.is_empty());
    }

    #[test]
    fn merge_context_later_keys_win() {
        let mut event = LogEvent::new("svc", Severity::Info, "hello");
        event.context.insert("a".to_string(), Value::from(1));
        let mut bindings = BTreeMap::new();
        bindings.insert("a".to_string(), Value::from(2));
        event.merge_context(&bindings);
        assert_eq!(event.context["a"], Value::from(2));
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Debug < Severity::Info);
        assert!(Severity::Error < Severity::Fatal);
    }
}
