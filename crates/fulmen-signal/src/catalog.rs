//! Capability detection over the signals catalog (C3 consumer).

use std::collections::HashMap;

use fulmen_catalog::{CatalogDescriptor, CatalogStore};
use fulmen_error::Error;

use crate::descriptor::SignalDescriptor;

/// Source of signal descriptors. The builtin table covers the common POSIX
/// signals this library ships defaults for; [`CatalogBackedSignalSource`]
/// loads a user-supplied YAML catalog through C3/C2 for applications that
/// want to extend or override the set.
pub trait SignalSource: Send + Sync {
    fn descriptor(&self, name: &str) -> Option<SignalDescriptor>;
    fn all_names(&self) -> Vec<String>;
}

/// Built-in descriptors for the signals this library has first-class
/// default behavior for.
pub struct BuiltinSignalSource {
    entries: HashMap<String, SignalDescriptor>,
}

impl Default for BuiltinSignalSource {
    fn default() -> Self {
        use crate::descriptor::{DefaultBehavior, DoubleTapParams, PlatformOverrides, WindowsFallback};

        let mut entries = HashMap::new();
        entries.insert(
            "SIGINT".to_string(),
            SignalDescriptor {
                id: "SIGINT".to_string(),
                name: "SIGINT".to_string(),
                unix_number: 2,
                windows_event: Some("CTRL_C_EVENT".to_string()),
                platform_overrides: PlatformOverrides::default(),
                default_behavior: DefaultBehavior::GracefulShutdownWithDoubleTap,
                exit_code: 130,
                double_tap: Some(DoubleTapParams {
                    window_seconds: 2,
                    exit_code: 130,
                    message: "Press Ctrl+C again to force quit".to_string(),
                }),
                windows_fallback: None,
            },
        );
        entries.insert(
            "SIGTERM".to_string(),
            SignalDescriptor {
                id: "SIGTERM".to_string(),
                name: "SIGTERM".to_string(),
                unix_number: 15,
                windows_event: None,
                platform_overrides: PlatformOverrides::default(),
                default_behavior: DefaultBehavior::GracefulShutdown,
                exit_code: 143,
                double_tap: None,
                windows_fallback: Some(WindowsFallback {
                    fallback_behavior: "http_admin_endpoint".to_string(),
                    log_level: "info".to_string(),
                    log_message: "SIGTERM is not available on Windows; use the admin shutdown endpoint".to_string(),
                    operation_hint: "POST /admin/signal {\"signal\":\"SIGTERM\"}".to_string(),
                    telemetry_event: "fulmen.signal.unsupported".to_string(),
                    telemetry_tags: Default::default(),
                }),
            },
        );
        entries.insert(
            "SIGHUP".to_string(),
            SignalDescriptor {
                id: "SIGHUP".to_string(),
                name: "SIGHUP".to_string(),
                unix_number: 1,
                windows_event: None,
                platform_overrides: PlatformOverrides::default(),
                default_behavior: DefaultBehavior::ReloadViaRestart,
                exit_code: 129,
                double_tap: None,
                windows_fallback: Some(WindowsFallback {
                    fallback_behavior: "http_admin_endpoint".to_string(),
                    log_level: "info".to_string(),
                    log_message: "SIGHUP is not available on Windows; use the admin config-reload endpoint".to_string(),
                    operation_hint: "POST /admin/config-reload".to_string(),
                    telemetry_event: "fulmen.signal.unsupported".to_string(),
                    telemetry_tags: Default::default(),
                }),
            },
        );
        entries.insert(
            "SIGQUIT".to_string(),
            SignalDescriptor {
                id: "SIGQUIT".to_string(),
                name: "SIGQUIT".to_string(),
                unix_number: 3,
                windows_event: None,
                platform_overrides: PlatformOverrides {
                    darwin: None,
                    freebsd: None,
                },
                default_behavior: DefaultBehavior::ImmediateExit,
                exit_code: 131,
                double_tap: None,
                windows_fallback: Some(WindowsFallback {
                    fallback_behavior: "http_admin_endpoint".to_string(),
                    log_level: "info".to_string(),
                    log_message: "SIGQUIT is not available on Windows".to_string(),
                    operation_hint: "POST /admin/signal {\"signal\":\"SIGQUIT\"}".to_string(),
                    telemetry_event: "fulmen.signal.unsupported".to_string(),
                    telemetry_tags: Default::default(),
                }),
            },
        );
        entries.insert(
            "SIGUSR1".to_string(),
            SignalDescriptor {
                id: "SIGUSR1".to_string(),
                name: "SIGUSR1".to_string(),
                unix_number: 10,
                windows_event: None,
                platform_overrides: PlatformOverrides {
                    darwin: Some(30),
                    freebsd: Some(30),
                },
                default_behavior: DefaultBehavior::Custom,
                exit_code: 138,
                double_tap: None,
                windows_fallback: Some(WindowsFallback {
                    fallback_behavior: "http_admin_endpoint".to_string(),
                    log_level: "info".to_string(),
                    log_message: "SIGUSR1 is not available on Windows".to_string(),
                    operation_hint: "POST /admin/signal {\"signal\":\"SIGUSR1\"}".to_string(),
                    telemetry_event: "fulmen.signal.unsupported".to_string(),
                    telemetry_tags: Default::default(),
                }),
            },
        );
        BuiltinSignalSource { entries }
    }
}

impl SignalSource for BuiltinSignalSource {
    fn descriptor(&self, name: &str) -> Option<SignalDescriptor> {
        self.entries.get(name).cloned()
    }

    fn all_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Loads signal descriptors from a user-supplied YAML catalog validated
/// through C3/C2.
pub struct CatalogBackedSignalSource {
    store: CatalogStore,
    descriptor: CatalogDescriptor,
}

impl CatalogBackedSignalSource {
    #[must_use]
    pub fn new(store: CatalogStore, descriptor: CatalogDescriptor) -> Self {
        CatalogBackedSignalSource { store, descriptor }
    }

    fn lookup(&self, name: &str) -> Result<Option<SignalDescriptor>, Error> {
        let entry = self.store.get_entity(&self.descriptor, name)?;
        Ok(entry.and_then(|v| serde_json::from_value(v).ok()))
    }
}

impl SignalSource for CatalogBackedSignalSource {
    fn descriptor(&self, name: &str) -> Option<SignalDescriptor> {
        self.lookup(name).ok().flatten()
    }

    fn all_names(&self) -> Vec<String> {
        match self.store.load(&self.descriptor) {
            Ok(catalog) => catalog
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|e| e.get("id").and_then(|v| v.as_str()).map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }
}

/// `true` on any POSIX platform.
#[must_use]
pub fn is_posix() -> bool {
    cfg!(unix)
}

/// `true` on Windows.
#[must_use]
pub fn is_windows() -> bool {
    cfg!(windows)
}

/// A signal is supported if the platform is POSIX, or the platform is
/// Windows and the descriptor names a native `windows_event`.
#[must_use]
pub fn supports_signal(descriptor: &SignalDescriptor) -> bool {
    is_posix() || (is_windows() && descriptor.windows_event.is_some())
}

/// Exit codes that follow the POSIX `128 + signal_number` convention are
/// only meaningful on POSIX.
#[must_use]
pub fn supports_signal_exit_codes() -> bool {
    is_posix()
}

/// The signal number to use on the current platform, consulting
/// `platform_overrides` for darwin/freebsd.
#[must_use]
pub fn signal_number(descriptor: &SignalDescriptor) -> i32 {
    #[cfg(target_os = "macos")]
    {
        if let Some(n) = descriptor.platform_overrides.darwin {
            return n;
        }
    }
    #[cfg(target_os = "freebsd")]
    {
        if let Some(n) = descriptor.platform_overrides.freebsd {
            return n;
        }
    }
    descriptor.unix_number
}
