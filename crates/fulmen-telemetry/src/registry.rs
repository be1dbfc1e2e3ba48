//! Global metrics registry: counters, gauges, histograms, keyed by
//! `(name, sorted label tuple)`.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use fulmen_error::{Error, ErrorCode};
use fulmen_schema::validate::CompiledValidator;
use serde::Serialize;

use crate::taxonomy::{self, MetricKind, Taxonomy};

/// ADR-0007 default bucket set for `_ms`-suffixed histograms.
pub const ADR_0007_MS_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0, 10000.0];

pub type LabelSet = Vec<(String, String)>;

fn sorted_labels(labels: &[(&str, &str)]) -> LabelSet {
    let mut v: LabelSet = labels.iter().map(|(k, val)| (k.to_string(), val.to_string())).collect();
    v.sort();
    v
}

type SeriesKey = (String, LabelSet);

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum SeriesValue {
    Counter { value: f64 },
    Gauge { value: f64 },
    Histogram { count: u64, sum: f64, buckets: Vec<(f64, u64)> },
}

/// A snapshot of one series, returned by [`Telemetry::export`].
#[derive(Debug, Clone, Serialize)]
pub struct MetricsEvent {
    pub name: String,
    pub labels: LabelSet,
    #[serde(flatten)]
    value: SeriesValue,
}

struct State {
    series: HashMap<SeriesKey, SeriesValue>,
    permissive: bool,
}

/// Process-wide metrics engine. Grounded on the general "registry of named
/// series behind a process-global handle" shape seen across the retrieved
/// telemetry crates, simplified here since this spec targets OTLP-shaped
/// export rather than a Prometheus text encoder.
pub struct Telemetry {
    state: Mutex<State>,
    taxonomy: Taxonomy,
    event_validator: Option<CompiledValidator>,
}

static METRICS: OnceLock<Telemetry> = OnceLock::new();

/// The process-wide telemetry handle, using the built-in taxonomy.
pub fn metrics() -> &'static Telemetry {
    METRICS.get_or_init(|| Telemetry::new(Taxonomy::builtin(), false))
}

impl Telemetry {
    #[must_use]
    pub fn new(taxonomy: Taxonomy, permissive: bool) -> Self {
        Telemetry {
            state: Mutex::new(State { series: HashMap::new(), permissive }),
            taxonomy,
            event_validator: None,
        }
    }

    /// Compile-once, validate-many: every emitted [`MetricsEvent`] is
    /// checked against `schema` before being handed to consumers (export
    /// callers, `flush`'s `emit` callback).
    pub fn with_event_schema(mut self, schema: &serde_json::Value) -> Result<Self, Error> {
        self.event_validator = Some(fulmen_schema::validate::compile_schema(schema)?);
        Ok(self)
    }

    fn validate_event(&self, event: &MetricsEvent) {
        let Some(validator) = &self.event_validator else { return };
        let json = serde_json::to_value(event).unwrap_or(serde_json::Value::Null);
        let outcome = fulmen_schema::validate::validate_data(&json, validator);
        if !outcome.valid {
            tracing::warn!(
                metric = %event.name,
                diagnostics = %fulmen_schema::validate::format_diagnostics(&outcome.diagnostics),
                "emitted metrics event failed schema validation"
            );
        }
    }

    fn ensure_known(&self, name: &str, kind: MetricKind) -> Result<Option<taxonomy::MetricDefinition>, Error> {
        match self.taxonomy.lookup(name) {
            Some(def) => {
                if def.kind != kind {
                    return Err(Error::new(
                        ErrorCode::DataInvalid,
                        format!("metric '{name}' is registered as {:?}, not {kind:?}", def.kind),
                    ));
                }
                Ok(Some(def.clone()))
            }
            None => {
                let state = self.state.lock().expect("telemetry registry poisoned");
                if state.permissive {
                    tracing::warn!(metric = name, "emitting unknown metric in permissive mode");
                    Ok(None)
                } else {
                    Err(Error::new(ErrorCode::DataInvalid, format!("unknown metric '{name}'; not found in taxonomy")))
                }
            }
        }
    }

    pub fn counter_inc(&self, name: &str, delta: f64, labels: &[(&str, &str)]) -> Result<(), Error> {
        if delta < 0.0 {
            return Err(Error::new(ErrorCode::DataInvalid, "counter delta must be >= 0"));
        }
        self.ensure_known(name, MetricKind::Counter)?;
        let key = (name.to_string(), sorted_labels(labels));
        let mut state = self.state.lock().expect("telemetry registry poisoned");
        match state.series.entry(key).or_insert(SeriesValue::Counter { value: 0.0 }) {
            SeriesValue::Counter { value } => *value += delta,
            _ => unreachable!("series kind mismatch guarded by ensure_known"),
        }
        Ok(())
    }

    pub fn gauge_set(&self, name: &str, value: f64, labels: &[(&str, &str)]) -> Result<(), Error> {
        self.ensure_known(name, MetricKind::Gauge)?;
        let key = (name.to_string(), sorted_labels(labels));
        let mut state = self.state.lock().expect("telemetry registry poisoned");
        state.series.insert(key, SeriesValue::Gauge { value });
        Ok(())
    }

    pub fn gauge_inc(&self, name: &str, delta: f64, labels: &[(&str, &str)]) -> Result<(), Error> {
        self.ensure_known(name, MetricKind::Gauge)?;
        let key = (name.to_string(), sorted_labels(labels));
        let mut state = self.state.lock().expect("telemetry registry poisoned");
        match state.series.entry(key).or_insert(SeriesValue::Gauge { value: 0.0 }) {
            SeriesValue::Gauge { value } => *value += delta,
            _ => unreachable!("series kind mismatch guarded by ensure_known"),
        }
        Ok(())
    }

    pub fn gauge_dec(&self, name: &str, delta: f64, labels: &[(&str, &str)]) -> Result<(), Error> {
        self.gauge_inc(name, -delta, labels)
    }

    pub fn histogram_observe(&self, name: &str, value: f64, labels: &[(&str, &str)]) -> Result<(), Error> {
        let def = self.ensure_known(name, MetricKind::Histogram)?;
        let explicit = def.as_ref().and_then(|d| d.default_buckets.clone());
        let buckets = match explicit {
            Some(buckets) => buckets,
            None if name.ends_with("_ms") => ADR_0007_MS_BUCKETS.to_vec(),
            None => {
                return Err(Error::new(
                    ErrorCode::DataInvalid,
                    format!(
                        "histogram '{name}' has no explicit default_buckets and doesn't end in '_ms'; \
                         the ADR-0007 bucket set is scaled for milliseconds and can't be assumed for other units"
                    ),
                ));
            }
        };
        let key = (name.to_string(), sorted_labels(labels));
        let mut state = self.state.lock().expect("telemetry registry poisoned");
        let entry = state.series.entry(key).or_insert_with(|| SeriesValue::Histogram {
            count: 0,
            sum: 0.0,
            buckets: buckets.iter().map(|b| (*b, 0)).collect(),
        });
        match entry {
            SeriesValue::Histogram { count, sum, buckets } => {
                *count += 1;
                *sum += value;
                for (upper, bucket_count) in buckets.iter_mut() {
                    if value <= *upper {
                        *bucket_count += 1;
                    }
                }
            }
            _ => unreachable!("series kind mismatch guarded by ensure_known"),
        }
        Ok(())
    }

    /// Snapshot of all series; does not mutate.
    #[must_use]
    pub fn export(&self) -> Vec<MetricsEvent> {
        let events: Vec<MetricsEvent> = {
            let state = self.state.lock().expect("telemetry registry poisoned");
            state
                .series
                .iter()
                .map(|((name, labels), value)| MetricsEvent { name: name.clone(), labels: labels.clone(), value: value.clone() })
                .collect()
        };
        for event in &events {
            self.validate_event(event);
        }
        events
    }

    /// Emits via `emit`, then clears all series.
    pub fn flush(&self, mut emit: impl FnMut(&MetricsEvent)) {
        let events = self.export();
        for event in &events {
            emit(event);
        }
        let mut state = self.state.lock().expect("telemetry registry poisoned");
        state.series.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_n_times_delta() {
        let telemetry = Telemetry::new(Taxonomy::builtin(), false);
        for _ in 0..5 {
            telemetry.counter_inc("http_requests_total", 2.0, &[("method", "GET")]).unwrap();
        }
        let events = telemetry.export();
        let event = events.iter().find(|e| e.name == "http_requests_total").unwrap();
        match &event.value {
            SeriesValue::Counter { value } => assert_eq!(*value, 10.0),
            _ => panic!("expected counter"),
        }
    }

    #[test]
    fn histogram_bucket_counts_are_cumulative() {
        let telemetry = Telemetry::new(Taxonomy::builtin(), false);
        for v in [0.5, 3.0, 50.0, 2000.0] {
            telemetry.histogram_observe("http_request_duration_ms", v, &[]).unwrap();
        }
        let events = telemetry.export();
        let event = events.iter().find(|e| e.name == "http_request_duration_ms").unwrap();
        match &event.value {
            SeriesValue::Histogram { count, sum, buckets } => {
                assert_eq!(*count, 4);
                assert!((*sum - 2053.5).abs() < 1e-9);
                let bucket_1 = buckets.iter().find(|(b, _)| *b == 1.0).unwrap();
                assert_eq!(bucket_1.1, 1);
                let bucket_5000 = buckets.iter().find(|(b, _)| *b == 5000.0).unwrap();
                assert_eq!(bucket_5000.1, 4);
            }
            _ => panic!("expected histogram"),
        }
    }

    #[test]
    fn unknown_metric_rejected_by_default() {
        let telemetry = Telemetry::new(Taxonomy::builtin(), false);
        assert!(telemetry.counter_inc("totally_unknown_metric", 1.0, &[]).is_err());
    }

    #[test]
    fn permissive_mode_warns_and_emits() {
        let telemetry = Telemetry::new(Taxonomy::builtin(), true);
        assert!(telemetry.counter_inc("totally_unknown_metric", 1.0, &[]).is_ok());
    }

    #[test]
    fn flush_clears_series() {
        let telemetry = Telemetry::new(Taxonomy::builtin(), false);
        telemetry.counter_inc("http_requests_total", 1.0, &[]).unwrap();
        let mut seen = 0;
        telemetry.flush(|_| seen += 1);
        assert_eq!(seen, 1);
        assert!(telemetry.export().is_empty());
    }

    #[test]
    fn negative_counter_delta_rejected() {
        let telemetry = Telemetry::new(Taxonomy::builtin(), false);
        assert!(telemetry.counter_inc("http_requests_total", -1.0, &[]).is_err());
    }

    #[test]
    fn non_ms_histogram_without_explicit_buckets_is_rejected() {
        let taxonomy = Taxonomy::new(vec![taxonomy::MetricDefinition {
            name: "job_duration_seconds".to_string(),
            kind: MetricKind::Histogram,
            unit: "seconds".to_string(),
            description: "test".to_string(),
            required_labels: vec![],
            default_buckets: None,
        }]);
        let telemetry = Telemetry::new(taxonomy, false);
        assert!(telemetry.histogram_observe("job_duration_seconds", 1.0, &[]).is_err());
    }

    proptest::proptest! {
        // For all observations on histogram(name_ms): reported count=n,
        // sum=sum(v_i), and for each bucket upper-bound b, bucket count
        // = |{i: v_i <= b}|.
        #[test]
        fn histogram_reports_match_cumulative_definition(values in proptest::collection::vec(0.0f64..12_000.0, 1..30)) {
            let telemetry = Telemetry::new(Taxonomy::builtin(), false);
            for v in &values {
                telemetry.histogram_observe("http_request_duration_ms", *v, &[]).unwrap();
            }
            let events = telemetry.export();
            let event = events.iter().find(|e| e.name == "http_request_duration_ms").unwrap();
            match &event.value {
                SeriesValue::Histogram { count, sum, buckets } => {
                    proptest::prop_assert_eq!(*count as usize, values.len());
                    let expected_sum: f64 = values.iter().sum();
                    proptest::prop_assert!((*sum - expected_sum).abs() < 1e-6);
                    for (upper, bucket_count) in buckets {
                        let expected = values.iter().filter(|v| **v <= *upper).count();
                        proptest::prop_assert_eq!(*bucket_count as usize, expected);
                    }
                }
                _ => proptest::prop_assert!(false, "expected histogram"),
            }
        }
    }

    #[test]
    fn export_validates_against_configured_schema() {
        let schema = serde_json::json!({
            "type": "object",
            "required": ["name", "kind"],
            "properties": { "name": { "type": "string" }, "kind": { "type": "string" } }
        });
        let telemetry = Telemetry::new(Taxonomy::builtin(), false).with_event_schema(&schema).unwrap();
        telemetry.counter_inc("http_requests_total", 1.0, &[]).unwrap();
        let events = telemetry.export();
        assert_eq!(events.len(), 1);
    }
}
