//! Telemetry engine (C6): counters, gauges, histograms behind a
//! process-global registry, taxonomy enforcement, and route normalization.

pub mod http;
pub mod registry;
pub mod route;
pub mod taxonomy;

pub use http::{record_http_request, track_active_request, ActiveRequestGuard, HttpRequestRecord};
pub use registry::{metrics, MetricsEvent, Telemetry, ADR_0007_MS_BUCKETS};
pub use route::{estimate_cardinality, has_cardinality_risk, normalize_route, NormalizeOptions};
pub use taxonomy::{MetricDefinition, MetricKind, Taxonomy};
