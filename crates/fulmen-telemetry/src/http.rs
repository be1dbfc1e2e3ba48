//! HTTP instrumentation helpers.
//!
//! Named web-framework adapters (Express/Fastify/Bun-equivalent) are out
//! of Rust's domain; instead this module exposes a generic instrumentation
//! function any caller's own middleware can invoke with the four facts it
//! already has (method, route, status, duration). This deliberately avoids
//! depending on `axum`/`tower`, consistent with the Non-goal excluding a
//! transport-layer HTTP protocol implementation.

use fulmen_error::Error;

use crate::registry::Telemetry;

/// Request facts a caller's own middleware extracts before this engine
/// gets involved.
#[derive(Debug, Clone)]
pub struct HttpRequestRecord<'a> {
    pub method: &'a str,
    pub route: &'a str,
    pub status: u16,
    pub duration_ms: f64,
    pub request_bytes: Option<f64>,
    pub response_bytes: Option<f64>,
    pub service: Option<&'a str>,
}

/// Records, atomically for one request, every applicable series of the
/// HTTP metric family.
pub fn record_http_request(telemetry: &Telemetry, record: &HttpRequestRecord<'_>) -> Result<(), Error> {
    let status = record.status.to_string();
    let mut labels = vec![("method", record.method), ("route", record.route), ("status", status.as_str())];
    if let Some(service) = record.service {
        labels.push(("service", service));
    }
    telemetry.counter_inc("http_requests_total", 1.0, &labels)?;
    telemetry.histogram_observe("http_request_duration_seconds", record.duration_ms / 1000.0, &labels)?;
    if let Some(bytes) = record.request_bytes {
        telemetry.histogram_observe("http_request_size_bytes", bytes, &labels)?;
    }
    if let Some(bytes) = record.response_bytes {
        telemetry.histogram_observe("http_response_size_bytes", bytes, &labels)?;
    }
    Ok(())
}

/// Increments `http_active_requests` and returns a guard that decrements
/// it on drop, so callers get release-on-every-exit-path for free instead
/// of needing a manual try/finally.
pub struct ActiveRequestGuard<'a> {
    telemetry: &'a Telemetry,
    service: Option<String>,
    released: bool,
}

impl<'a> ActiveRequestGuard<'a> {
    pub fn release(mut self) {
        self.do_release();
    }

    fn do_release(&mut self) {
        if !self.released {
            let labels: Vec<(&str, &str)> =
                self.service.as_deref().map(|s| vec![("service", s)]).unwrap_or_default();
            let _ = self.telemetry.gauge_dec("http_active_requests", 1.0, &labels);
            self.released = true;
        }
    }
}

impl Drop for ActiveRequestGuard<'_> {
    fn drop(&mut self) {
        self.do_release();
    }
}

pub fn track_active_request<'a>(telemetry: &'a Telemetry, service: Option<&str>) -> ActiveRequestGuard<'a> {
    let labels: Vec<(&str, &str)> = service.map(|s| vec![("service", s)]).unwrap_or_default();
    let _ = telemetry.gauge_inc("http_active_requests", 1.0, &labels);
    ActiveRequestGuard { telemetry, service: service.map(str::to_string), released: false }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::Taxonomy;

    #[test]
    fn duration_ms_converted_to_seconds() {
        let telemetry = Telemetry::new(Taxonomy::builtin(), false);
        record_http_request(
            &telemetry,
            &HttpRequestRecord {
                method: "GET",
                route: "/users/:id",
                status: 200,
                duration_ms: 150.0,
                request_bytes: None,
                response_bytes: None,
                service: None,
            },
        )
        .unwrap();
        let events = telemetry.export();
        let hist = events.iter().find(|e| e.name == "http_request_duration_seconds").unwrap();
        let json = serde_json::to_value(hist).unwrap();
        assert_eq!(json["sum"], serde_json::json!(0.150));
        let buckets = json["buckets"].as_array().unwrap();
        let le_100ms = buckets.iter().find(|b| b[0].as_f64().unwrap() == 0.1).unwrap();
        let le_250ms = buckets.iter().find(|b| b[0].as_f64().unwrap() == 0.25).unwrap();
        assert_eq!(le_100ms[1], serde_json::json!(0));
        assert_eq!(le_250ms[1], serde_json::json!(1));
    }

    #[test]
    fn active_request_guard_decrements_on_release() {
        let telemetry = Telemetry::new(Taxonomy::builtin(), false);
        let guard = track_active_request(&telemetry, None);
        let events = telemetry.export();
        let gauge = events.iter().find(|e| e.name == "http_active_requests").unwrap();
        assert_eq!(serde_json::to_value(gauge).unwrap()["value"], serde_json::json!(1.0));
        guard.release();
        let events = telemetry.export();
        let gauge = events.iter().find(|e| e.name == "http_active_requests").unwrap();
        assert_eq!(serde_json::to_value(gauge).unwrap()["value"], serde_json::json!(0.0));
    }

    #[test]
    fn active_request_guard_decrements_on_drop_for_error_paths() {
        let telemetry = Telemetry::new(Taxonomy::builtin(), false);
        {
            let _guard = track_active_request(&telemetry, None);
        }
        let events = telemetry.export();
        let gauge = events.iter().find(|e| e.name == "http_active_requests").unwrap();
        assert_eq!(serde_json::to_value(gauge).unwrap()["value"], serde_json::json!(0.0));
    }
}
