//! Signal descriptor data model (catalog-sourced, spec §3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The default dispatch behavior a signal is associated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultBehavior {
    GracefulShutdown,
    GracefulShutdownWithDoubleTap,
    ReloadViaRestart,
    ImmediateExit,
    Custom,
    ObserveOnly,
}

/// Platform-specific signal number overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformOverrides {
    pub darwin: Option<i32>,
    pub freebsd: Option<i32>,
}

/// Double-tap parameters (SIGINT / `graceful_shutdown_with_double_tap`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoubleTapParams {
    pub window_seconds: u64,
    pub exit_code: i32,
    pub message: String,
}

/// Windows fallback behavior for a signal with no native Windows event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowsFallback {
    pub fallback_behavior: String,
    pub log_level: String,
    pub log_message: String,
    pub operation_hint: String,
    pub telemetry_event: String,
    #[serde(default)]
    pub telemetry_tags: BTreeMap<String, String>,
}

/// A catalog-sourced signal descriptor.
///
/// Invariant: if `windows_event` is `None`, `windows_fallback` is `Some`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalDescriptor {
    pub id: String,
    pub name: String,
    pub unix_number: i32,
    #[serde(default)]
    pub windows_event: Option<String>,
    #[serde(default)]
    pub platform_overrides: PlatformOverrides,
    pub default_behavior: DefaultBehavior,
    pub exit_code: i32,
    #[serde(default)]
    pub double_tap: Option<DoubleTapParams>,
    #[serde(default)]
    pub windows_fallback: Option<WindowsFallback>,
}

impl SignalDescriptor {
    /// Panics in debug builds if the invariant (`windows_event` absent
    /// implies `windows_fallback` present) is violated; catalogs should be
    /// validated at load time via the catalog's schema, this is a last
    /// line of defense for hand-built descriptors.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.windows_event.is_some() || self.windows_fallback.is_some()
    }
}
