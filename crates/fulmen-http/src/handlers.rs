//! Framework-agnostic `(payload, req) -> response` handlers for the
//! signal-trigger, config-reload, and control-discovery admin endpoints.

use fulmen_signal::{catalog, HandlerOptions, SignalManager, SignalSource};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::auth::{AuthHook, RequestMeta};
use crate::rate_limit::RateLimiter;

/// HTTP-like status codes this module's handlers return.
pub mod status {
    pub const OK: u16 = 200;
    pub const ACCEPTED: u16 = 202;
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const VALIDATION_FAILED: u16 = 422;
    pub const RATE_LIMITED: u16 = 429;
    pub const INTERNAL: u16 = 500;
}

#[derive(Debug, Clone, Serialize)]
pub struct SignalTriggerResponse {
    pub status: String,
    pub correlation_id: Uuid,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

fn emit_outcome(family: &str, outcome: &str) {
    tracing::info!(event = format!("fulmen.{family}.{outcome}"), family, outcome, "admin endpoint outcome");
}

/// `{signal, reason?, correlation_id?}` -> `{status, correlation_id, message, statusCode}`.
pub fn handle_signal_trigger<S: SignalSource + 'static>(
    manager: &SignalManager<S>,
    payload: &Value,
    req: &RequestMeta,
    auth: &dyn AuthHook,
    rate_limiter: &dyn RateLimiter,
) -> SignalTriggerResponse {
    let correlation_id = payload
        .get("correlation_id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    if !auth.authenticate(req) {
        emit_outcome("signal", "unauthorized");
        return SignalTriggerResponse {
            status: "error".to_string(),
            correlation_id,
            message: "authentication failed".to_string(),
            status_code: status::UNAUTHORIZED,
        };
    }

    let client_id = req.client_id.as_deref().unwrap_or("anonymous");
    if !rate_limiter.allow(client_id) {
        emit_outcome("signal", "rate_limited");
        return SignalTriggerResponse {
            status: "error".to_string(),
            correlation_id,
            message: "rate limit exceeded".to_string(),
            status_code: status::RATE_LIMITED,
        };
    }

    let Some(signal_name) = payload.get("signal").and_then(Value::as_str) else {
        emit_outcome("signal", "bad_request");
        return SignalTriggerResponse {
            status: "error".to_string(),
            correlation_id,
            message: "missing 'signal' field".to_string(),
            status_code: status::BAD_REQUEST,
        };
    };

    match manager.ensure_supported(signal_name) {
        Ok(_) => {
            manager.trigger(signal_name);
            emit_outcome("signal", "accepted");
            SignalTriggerResponse {
                status: "accepted".to_string(),
                correlation_id,
                message: format!("signal '{signal_name}' dispatched"),
                status_code: status::ACCEPTED,
            }
        }
        Err(e) => {
            emit_outcome("signal", "error");
            SignalTriggerResponse {
                status: "error".to_string(),
                correlation_id,
                message: e.message().to_string(),
                status_code: status::INTERNAL,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigReloadResponse {
    pub status: String,
    pub correlation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<String>>,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
}

/// `{reason?, correlation_id?}` -> `{status, correlation_id, message | validation_errors, statusCode}`.
pub fn handle_config_reload(
    payload: &Value,
    read_config: impl FnOnce() -> Value,
    validate: impl FnOnce(&Value) -> Result<(), Vec<String>>,
    on_reload: Option<impl FnOnce(&Value)>,
) -> ConfigReloadResponse {
    let correlation_id = payload
        .get("correlation_id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);

    let config = read_config();
    match validate(&config) {
        Ok(()) => {
            if let Some(cb) = on_reload {
                cb(&config);
            }
            emit_outcome("config_reload", "reloaded");
            ConfigReloadResponse {
                status: "reloaded".to_string(),
                correlation_id,
                message: Some("configuration reloaded".to_string()),
                validation_errors: None,
                status_code: status::OK,
            }
        }
        Err(errors) => {
            emit_outcome("config_reload", "validation_failed");
            ConfigReloadResponse {
                status: "error".to_string(),
                correlation_id,
                message: None,
                validation_errors: Some(errors),
                status_code: status::VALIDATION_FAILED,
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub vendor: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeInfo {
    pub name: String,
    pub version: String,
    pub platform: String,
    pub arch: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlDiscoveryResponse {
    pub service: ServiceInfo,
    pub runtime: RuntimeInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_summary: Option<String>,
    pub endpoints: Vec<String>,
}

/// Returns `{service{name,vendor,version}, runtime{name,version,platform,arch}, auth_summary?, endpoints[]}`.
pub fn handle_control_discovery(
    service_name: &str,
    service_version: &str,
    auth_summary: Option<&str>,
) -> ControlDiscoveryResponse {
    emit_outcome("control_discovery", "ok");
    ControlDiscoveryResponse {
        service: ServiceInfo {
            name: service_name.to_string(),
            vendor: "fulmenhq".to_string(),
            version: service_version.to_string(),
        },
        runtime: RuntimeInfo {
            name: "fulmen".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            platform: if catalog::is_windows() { "windows".to_string() } else { "posix".to_string() },
            arch: std::env::consts::ARCH.to_string(),
        },
        auth_summary: auth_summary.map(str::to_string),
        endpoints: vec![
            "/admin/signal".to_string(),
            "/admin/config-reload".to_string(),
            "/admin/control".to_string(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{BearerTokenAuth, NoAuth};
    use crate::rate_limit::{InMemoryRateLimiter, NoRateLimit};
    use fulmen_signal::BuiltinSignalSource;
    use serde_json::json;

    #[test]
    fn signal_trigger_unauthorized_without_valid_token() {
        let manager = SignalManager::new(BuiltinSignalSource::default());
        let auth = BearerTokenAuth::new(vec!["right".to_string()]);
        let req = RequestMeta { authorization_header: Some("Bearer wrong".to_string()), client_id: None };
        let response = handle_signal_trigger(&manager, &json!({"signal": "SIGTERM"}), &req, &auth, &NoRateLimit);
        assert_eq!(response.status_code, status::UNAUTHORIZED);
    }

    #[test]
    fn signal_trigger_accepted_for_known_signal() {
        let manager = SignalManager::new(BuiltinSignalSource::default());
        let response = handle_signal_trigger(&manager, &json!({"signal": "SIGUSR1"}), &RequestMeta::default(), &NoAuth, &NoRateLimit);
        assert_eq!(response.status_code, status::ACCEPTED);
        assert_eq!(response.status, "accepted");
    }

    #[test]
    fn signal_trigger_bad_request_without_signal_field() {
        let manager = SignalManager::new(BuiltinSignalSource::default());
        let response = handle_signal_trigger(&manager, &json!({}), &RequestMeta::default(), &NoAuth, &NoRateLimit);
        assert_eq!(response.status_code, status::BAD_REQUEST);
    }

    #[test]
    fn signal_trigger_rate_limited() {
        let manager = SignalManager::new(BuiltinSignalSource::default());
        let limiter = InMemoryRateLimiter::new(0.0, 0.0);
        let response = handle_signal_trigger(&manager, &json!({"signal": "SIGUSR1"}), &RequestMeta::default(), &NoAuth, &limiter);
        assert_eq!(response.status_code, status::RATE_LIMITED);
    }

    #[test]
    fn config_reload_validation_failed_returns_422() {
        let response = handle_config_reload(
            &json!({}),
            || json!({"port": -1}),
            |cfg| if cfg["port"].as_i64().unwrap_or(-1) < 0 { Err(vec!["bad port".to_string()]) } else { Ok(()) },
            None::<fn(&Value)>,
        );
        assert_eq!(response.status_code, status::VALIDATION_FAILED);
        assert!(response.validation_errors.is_some());
    }

    #[test]
    fn config_reload_success_invokes_callback() {
        let invoked = std::cell::Cell::new(false);
        let response = handle_config_reload(&json!({}), || json!({"port": 8080}), |_| Ok(()), Some(|_: &Value| invoked.set(true)));
        assert_eq!(response.status_code, status::OK);
        assert!(invoked.get());
    }

    #[test]
    fn control_discovery_lists_endpoints() {
        let response = handle_control_discovery("fulmen-app", "1.0.0", None);
        assert_eq!(response.endpoints.len(), 3);
        assert_eq!(response.service.vendor, "fulmenhq");
    }
}
