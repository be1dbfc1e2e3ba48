//! Recursive field and pattern redaction.
//!
//! Grounded on the teacher's `SecretRedactor`: a `RegexSet` pre-filter over
//! a linear, id-sorted pattern list for deterministic, fast string scanning.
//! Generalized from whole-file text scanning to recursive JSON value
//! traversal: object keys matching the redact-set (case-insensitive) have
//! their value replaced outright; every other string value is still run
//! through the pattern scanner. Recursion only descends into `Object` and
//! `Array` — every other `Value` variant is a leaf, which is exactly the
//! boundary the spec's "Date/Error/Buffer/Regex are left untouched"
//! requirement describes, since JSON has no such variants.

use std::collections::HashSet;

use regex::RegexSet;
use serde_json::Value;

use super::Middleware;
use crate::event::LogEvent;

pub const DEFAULT_REDACT_FIELDS: &[&str] = &[
    "password",
    "apikey",
    "api_key",
    "token",
    "secret",
    "authorization",
    "accesstoken",
    "access_token",
    "refreshtoken",
    "refresh_token",
];

pub const DEFAULT_REDACT_PATTERNS: &[(&str, &str)] = &[
    ("secret_prefixed", r"^SECRET_.*"),
    ("token_suffixed", r".*_TOKEN$"),
    ("key_suffixed", r".*_KEY$"),
    ("base64_blob", r"^[A-Za-z0-9+/]{40,}={0,2}$"),
    ("email", r"^[^\s@]+@[^\s@]+\.[^\s@]+$"),
    ("card_like", r"^\d{13,19}$"),
];

const REDACTED: &str = "[REDACTED]";
const PATTERN_SCAN_LIMIT: usize = 10 * 1024;

/// Redacts both fields-by-key and values-by-pattern on every emitted event.
pub struct RedactionMiddleware {
    redact_fields: HashSet<String>,
    pattern_set: RegexSet,
}

impl RedactionMiddleware {
    /// Default field list and default patterns.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_REDACT_FIELDS.iter().map(|s| (*s).to_string()).collect(),
            DEFAULT_REDACT_PATTERNS.iter().map(|(id, p)| ((*id).to_string(), (*p).to_string())).collect(),
        )
    }

    /// Custom field list and/or custom patterns, replacing the defaults.
    /// Pass `use_default_patterns: false` by omitting defaults from `patterns`.
    #[must_use]
    pub fn with_config(fields: Vec<String>, patterns: Vec<(String, String)>) -> Self {
        let redact_fields = fields.into_iter().map(|f| f.to_lowercase()).collect();
        let mut sortable: Vec<(String, String)> = patterns;
        sortable.sort_by(|a, b| a.0.cmp(&b.0));
        let regexes: Vec<String> = sortable.into_iter().map(|(_, pattern)| pattern).collect();
        let pattern_set = RegexSet::new(&regexes).expect("redaction pattern set must compile");
        RedactionMiddleware { redact_fields, pattern_set }
    }

    /// Extend the default field set and default patterns with additions,
    /// rather than replacing them.
    #[must_use]
    pub fn extend_defaults(extra_fields: &[&str], extra_patterns: &[(&str, &str)]) -> Self {
        let mut fields: Vec<String> = DEFAULT_REDACT_FIELDS.iter().map(|s| (*s).to_string()).collect();
        fields.extend(extra_fields.iter().map(|s| (*s).to_string()));
        let mut patterns: Vec<(String, String)> =
            DEFAULT_REDACT_PATTERNS.iter().map(|(id, p)| ((*id).to_string(), (*p).to_string())).collect();
        patterns.extend(extra_patterns.iter().map(|(id, p)| ((*id).to_string(), (*p).to_string())));
        Self::with_config(fields, patterns)
    }

    fn scan_string(&self, s: &str) -> String {
        if s.len() > PATTERN_SCAN_LIMIT {
            return s.to_string();
        }
        if self.pattern_set.matches(s).matched_any() {
            REDACTED.to_string()
        } else {
            s.to_string()
        }
    }

    fn redact_value(&self, key: Option<&str>, value: Value) -> Value {
        if let Some(key) = key {
            if self.redact_fields.contains(&key.to_lowercase()) {
                return Value::String(REDACTED.to_string());
            }
        }
        match value {
            Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k.clone(), self.redact_value(Some(&k), v))).collect())
            }
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.redact_value(None, v)).collect()),
            Value::String(s) => Value::String(self.scan_string(&s)),
            other => other,
        }
    }
}

impl Default for RedactionMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for RedactionMiddleware {
    fn apply(&self, mut event: LogEvent) -> LogEvent {
        let context = std::mem::take(&mut event.context);
        for (k, v) in context {
            let redacted = self.redact_value(Some(&k), v);
            event.context.insert(k, redacted);
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;
    use serde_json::json;

    #[test]
    fn redacts_matching_field_key_case_insensitively() {
        let mw = RedactionMiddleware::new();
        let mut event = LogEvent::new("svc", Severity::Info, "login");
        event.context.insert("ApiKey".to_string(), json!("sk-abc123"));
        let event = mw.apply(event);
        assert_eq!(event.context["ApiKey"], json!("[REDACTED]"));
    }

    #[test]
    fn recurses_into_nested_objects_and_arrays() {
        let mw = RedactionMiddleware::new();
        let mut event = LogEvent::new("svc", Severity::Info, "login");
        event.context.insert(
            "user".to_string(),
            json!({"profile": {"token": "abc"}, "sessions": [{"secret": "xyz"}]}),
        );
        let event = mw.apply(event);
        assert_eq!(event.context["user"]["profile"]["token"], json!("[REDACTED]"));
        assert_eq!(event.context["user"]["sessions"][0]["secret"], json!("[REDACTED]"));
    }

    #[test]
    fn non_matching_fields_are_left_alone() {
        let mw = RedactionMiddleware::new();
        let mut event = LogEvent::new("svc", Severity::Info, "login");
        event.context.insert("username".to_string(), json!("alice"));
        let event = mw.apply(event);
        assert_eq!(event.context["username"], json!("alice"));
    }

    #[test]
    fn long_strings_skip_pattern_scanning() {
        let mw = RedactionMiddleware::new();
        let long_value = "A".repeat(PATTERN_SCAN_LIMIT + 1);
        let mut event = LogEvent::new("svc", Severity::Info, "dump");
        event.context.insert("blob".to_string(), json!(long_value.clone()));
        let event = mw.apply(event);
        assert_eq!(event.context["blob"], json!(long_value));
    }

    #[test]
    fn email_like_values_are_pattern_redacted() {
        let mw = RedactionMiddleware::new();
        let mut event = LogEvent::new("svc", Severity::Info, "signup");
        event.context.insert("contact".to_string(), json!("person@example.com"));
        let event = mw.apply(event);
        assert_eq!(event.context["contact"], json!("[REDACTED]"));
    }

    #[test]
    fn depth_100_nested_structure_completes_without_stack_overflow() {
        let mw = RedactionMiddleware::new();
        let mut value = json!({"password": "leaf-secret"});
        for _ in 0..100 {
            value = json!({"child": value});
        }
        let mut event = LogEvent::new("svc", Severity::Info, "deep");
        event.context.insert("root".to_string(), value);
        let event = mw.apply(event);
        let mut cursor = &event.context["root"];
        for _ in 0..100 {
            cursor = &cursor["child"];
        }
        assert_eq!(cursor["password"], json!("[REDACTED]"));
    }

    proptest::proptest! {
        // Redaction of fields is case-insensitive: any casing of a known
        // redact-field key is redacted the same way.
        #[test]
        fn field_redaction_is_case_insensitive(mixed_case in "[Pp][Aa][Ss][Ss][Ww][Oo][Rr][Dd]") {
            let mw = RedactionMiddleware::new();
            let mut event = LogEvent::new("svc", Severity::Info, "login");
            event.context.insert(mixed_case.clone(), json!("hunter2"));
            let event = mw.apply(event);
            proptest::prop_assert_eq!(event.context[&mixed_case].clone(), json!("[REDACTED]"));
        }
    }
}
