//! Metric taxonomy: the catalog of known metric names, validated at
//! first emission (spec §3/§4.6).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    pub kind: MetricKind,
    pub unit: String,
    pub description: String,
    #[serde(default)]
    pub required_labels: Vec<String>,
    #[serde(default)]
    pub default_buckets: Option<Vec<f64>>,
}

/// The catalog of metric definitions a [`crate::registry::Telemetry`]
/// validates emissions against.
pub struct Taxonomy {
    definitions: HashMap<String, MetricDefinition>,
}

impl Taxonomy {
    #[must_use]
    pub fn new(definitions: Vec<MetricDefinition>) -> Self {
        Taxonomy { definitions: definitions.into_iter().map(|d| (d.name.clone(), d)).collect() }
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&MetricDefinition> {
        self.definitions.get(name)
    }

    /// The built-in HTTP family plus common extension points, matching
    /// the metric names this crate itself emits from `http.rs`.
    #[must_use]
    pub fn builtin() -> Self {
        Taxonomy::new(vec![
            MetricDefinition {
                name: "http_requests_total".to_string(),
                kind: MetricKind::Counter,
                unit: "1".to_string(),
                description: "Total HTTP requests handled".to_string(),
                required_labels: vec!["method".to_string(), "route".to_string(), "status".to_string()],
                default_buckets: None,
            },
            MetricDefinition {
                name: "http_request_duration_seconds".to_string(),
                kind: MetricKind::Histogram,
                unit: "seconds".to_string(),
                description: "HTTP request duration".to_string(),
                required_labels: vec!["method".to_string(), "route".to_string()],
                default_buckets: Some(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            },
            MetricDefinition {
                name: "http_request_duration_ms".to_string(),
                kind: MetricKind::Histogram,
                unit: "ms".to_string(),
                description: "HTTP request duration in milliseconds".to_string(),
                required_labels: vec![],
                default_buckets: None,
            },
            MetricDefinition {
                name: "http_active_requests".to_string(),
                kind: MetricKind::Gauge,
                unit: "1".to_string(),
                description: "In-flight HTTP requests".to_string(),
                required_labels: vec![],
                default_buckets: None,
            },
            MetricDefinition {
                name: "http_request_size_bytes".to_string(),
                kind: MetricKind::Histogram,
                unit: "bytes".to_string(),
                description: "HTTP request body size".to_string(),
                required_labels: vec![],
                default_buckets: Some(vec![100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0]),
            },
            MetricDefinition {
                name: "http_response_size_bytes".to_string(),
                kind: MetricKind::Histogram,
                unit: "bytes".to_string(),
                description: "HTTP response body size".to_string(),
                required_labels: vec![],
                default_buckets: Some(vec![100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0, 10_000_000.0]),
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_taxonomy_has_http_family() {
        let taxonomy = Taxonomy::builtin();
        assert!(taxonomy.lookup("http_requests_total").is_some());
        assert!(taxonomy.lookup("nonexistent").is_none());
    }
}
