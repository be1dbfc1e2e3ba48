//! HTTP admin scaffolds (C9): framework-agnostic handlers for signal
//! trigger, config reload, and control discovery.

pub mod auth;
pub mod handlers;
pub mod rate_limit;

pub use auth::{AuthHook, BearerTokenAuth, NoAuth, RequestMeta};
pub use handlers::{
    handle_config_reload, handle_control_discovery, handle_signal_trigger, status, ConfigReloadResponse,
    ControlDiscoveryResponse, RuntimeInfo, ServiceInfo, SignalTriggerResponse,
};
pub use rate_limit::{InMemoryRateLimiter, NoRateLimit, RateLimiter};
