//! Registration, ordering, and dispatch of signal handlers (C4).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use fulmen_error::{Error, ErrorCode};
use serde_json::{json, Value};

use crate::catalog::{self, SignalSource};
use crate::descriptor::{DefaultBehavior, SignalDescriptor};

/// Outcome returned by a registered handler.
pub type HandlerResult = Result<(), String>;
type HandlerFn = Arc<dyn Fn() -> HandlerResult + Send + Sync>;

/// What the manager does when a handler's timeout elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutBehavior {
    LogAndContinue,
    ForceExit,
}

impl Default for TimeoutBehavior {
    fn default() -> Self {
        TimeoutBehavior::LogAndContinue
    }
}

/// Options for [`SignalManager::register`].
#[derive(Debug, Clone)]
pub struct HandlerOptions {
    pub priority: i32,
    pub timeout: Duration,
    pub id: Option<String>,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        HandlerOptions {
            priority: 0,
            timeout: Duration::from_secs(5),
            id: None,
        }
    }
}

struct HandlerEntry {
    id: String,
    priority: i32,
    timeout: Duration,
    registered_at: Instant,
    callback: HandlerFn,
}

#[derive(Default)]
struct DoubleTapState {
    first_tap_time: Option<Instant>,
}

#[derive(Default, Clone, Copy)]
struct ConfigReloadState {
    strikes: u32,
}

const CONFIG_RELOAD_STRIKE_THRESHOLD: u32 = 3;

/// Application-supplied config-reload handler for a `reload_via_restart`
/// signal. Registered via [`SignalManager::register_config_reload`]
/// instead of the generic handler list, since it has its own
/// validate/accept/reject lifecycle.
type ReadConfigFn = Arc<dyn Fn() -> Value + Send + Sync>;
type ValidateConfigFn = Arc<dyn Fn(&Value) -> Result<(), Vec<String>> + Send + Sync>;
type OnValidatedFn = Arc<dyn Fn(&Value) + Send + Sync>;

struct ConfigReloadHandler {
    read_config: ReadConfigFn,
    validate: ValidateConfigFn,
    on_validated: Option<OnValidatedFn>,
    restart_exit_code: i32,
}

struct Inner<S: SignalSource> {
    source: S,
    handlers: Mutex<HashMap<String, Vec<HandlerEntry>>>,
    config_reload_handlers: Mutex<HashMap<String, ConfigReloadHandler>>,
    double_tap: Mutex<HashMap<String, DoubleTapState>>,
    config_reload_state: Mutex<HashMap<String, ConfigReloadState>>,
    installed: Mutex<std::collections::HashSet<String>>,
    shutting_down: AtomicBool,
    timeout_behavior: TimeoutBehavior,
    exit_fn: Arc<dyn Fn(i32) + Send + Sync>,
    anon_counter: AtomicU64,
}

/// Cross-platform signal manager: registers, orders, time-bounds, and
/// dispatches handlers for catalog-described signals.
///
/// Cheaply cloneable — all instances sharing a clone share the same
/// underlying handler tables (see `Inner`), which is what lets the POSIX
/// dispatch thread (a single process-wide OS-level concern) invoke back
/// into a manager that was handed out to application code by value.
pub struct SignalManager<S: SignalSource> {
    inner: Arc<Inner<S>>,
}

impl<S: SignalSource> Clone for SignalManager<S> {
    fn clone(&self) -> Self {
        SignalManager {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: SignalSource + 'static> SignalManager<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self::with_exit_fn(source, Arc::new(|code| std::process::exit(code)))
    }

    /// Construct with a custom process-exit hook, primarily for tests that
    /// want to observe a would-be exit instead of terminating.
    #[must_use]
    pub fn with_exit_fn(source: S, exit_fn: Arc<dyn Fn(i32) + Send + Sync>) -> Self {
        SignalManager {
            inner: Arc::new(Inner {
                source,
                handlers: Mutex::new(HashMap::new()),
                config_reload_handlers: Mutex::new(HashMap::new()),
                double_tap: Mutex::new(HashMap::new()),
                config_reload_state: Mutex::new(HashMap::new()),
                installed: Mutex::new(std::collections::HashSet::new()),
                shutting_down: AtomicBool::new(false),
                timeout_behavior: TimeoutBehavior::LogAndContinue,
                exit_fn,
                anon_counter: AtomicU64::new(0),
            }),
        }
    }

    #[must_use]
    pub fn with_timeout_behavior(mut self, behavior: TimeoutBehavior) -> Self {
        Arc::get_mut(&mut self.inner)
            .map(|inner| inner.timeout_behavior = behavior)
            .unwrap_or_else(|| {
                // Already shared (e.g. cloned for the dispatch thread); this
                // is only ever called immediately after `new`, so this path
                // is unreachable in practice, but degrade gracefully rather
                // than panic.
                tracing::warn!("with_timeout_behavior called on a shared SignalManager; ignored");
            });
        self
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    fn descriptor(&self, name: &str) -> Result<SignalDescriptor, Error> {
        self.inner.source.descriptor(name).ok_or_else(|| self.unsupported_error(name))
    }

    fn unsupported_error(&self, name: &str) -> Error {
        let known = self.inner.source.all_names().join(", ");
        Error::new(
            ErrorCode::UnsupportedAlgorithm,
            format!("unknown signal '{name}'; known signals: [{known}]"),
        )
    }

    /// Fails unless `name` is a known, platform-supported signal.
    pub fn ensure_supported(&self, name: &str) -> Result<SignalDescriptor, Error> {
        let descriptor = self.descriptor(name)?;
        if !catalog::supports_signal(&descriptor) {
            let mut msg = format!("signal '{name}' is not supported on this platform");
            if catalog::is_windows() {
                if let Some(fb) = &descriptor.windows_fallback {
                    msg.push_str(&format!("; {}", fb.operation_hint));
                }
            }
            return Err(Error::new(ErrorCode::UnsupportedAlgorithm, msg));
        }
        Ok(descriptor)
    }

    pub fn ensure_signal_exit_codes_supported(&self) -> Result<(), Error> {
        if catalog::supports_signal_exit_codes() {
            Ok(())
        } else {
            Err(Error::new(
                ErrorCode::UnsupportedAlgorithm,
                "POSIX signal exit codes are not supported on this platform",
            ))
        }
    }

    pub fn ensure_posix(&self) -> Result<(), Error> {
        if catalog::is_posix() {
            Ok(())
        } else {
            Err(Error::new(ErrorCode::UnsupportedAlgorithm, "this operation requires a POSIX platform"))
        }
    }

    pub fn ensure_windows(&self) -> Result<(), Error> {
        if catalog::is_windows() {
            Ok(())
        } else {
            Err(Error::new(ErrorCode::UnsupportedAlgorithm, "this operation requires Windows"))
        }
    }

    /// Register a handler for `signal_name`. If the signal is unsupported
    /// on this platform, registration is suppressed and (on Windows) the
    /// standardized fallback is executed instead — this never errors for
    /// an unsupported-but-known signal, only for an unknown one.
    pub fn register(
        &self,
        signal_name: &str,
        callback: impl Fn() -> HandlerResult + Send + Sync + 'static,
        options: HandlerOptions,
    ) -> Result<(), Error> {
        let descriptor = self.descriptor(signal_name)?;
        if !catalog::supports_signal(&descriptor) {
            self.emit_windows_fallback(&descriptor);
            return Ok(());
        }

        let id = options.id.unwrap_or_else(|| {
            let n = self.inner.anon_counter.fetch_add(1, Ordering::Relaxed);
            format!("{signal_name}-handler-{n}")
        });
        let entry = HandlerEntry {
            id,
            priority: options.priority,
            timeout: options.timeout,
            registered_at: Instant::now(),
            callback: Arc::new(callback),
        };
        {
            let mut handlers = self.inner.handlers.lock().expect("handler table poisoned");
            let list = handlers.entry(signal_name.to_string()).or_default();
            if let Some(existing) = list.iter_mut().find(|e| e.id == entry.id) {
                *existing = entry;
            } else {
                list.push(entry);
            }
            list.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.registered_at.cmp(&b.registered_at)));
        }
        self.ensure_installed(signal_name, &descriptor)?;
        Ok(())
    }

    /// Register the special config-reload handler for a
    /// `reload_via_restart` signal (conventionally `SIGHUP`).
    pub fn register_config_reload(
        &self,
        signal_name: &str,
        read_config: impl Fn() -> Value + Send + Sync + 'static,
        validate: impl Fn(&Value) -> Result<(), Vec<String>> + Send + Sync + 'static,
        on_validated: Option<impl Fn(&Value) + Send + Sync + 'static>,
        restart_exit_code: i32,
    ) -> Result<(), Error> {
        let descriptor = self.descriptor(signal_name)?;
        if !catalog::supports_signal(&descriptor) {
            self.emit_windows_fallback(&descriptor);
            return Ok(());
        }
        self.inner.config_reload_handlers.lock().expect("config reload table poisoned").insert(
            signal_name.to_string(),
            ConfigReloadHandler {
                read_config: Arc::new(read_config),
                validate: Arc::new(validate),
                on_validated: on_validated.map(|f| Arc::new(f) as OnValidatedFn),
                restart_exit_code,
            },
        );
        self.ensure_installed(signal_name, &descriptor)?;
        Ok(())
    }

    pub fn unregister(&self, signal_name: &str, id: Option<&str>) {
        let mut handlers = self.inner.handlers.lock().expect("handler table poisoned");
        if let Some(list) = handlers.get_mut(signal_name) {
            match id {
                Some(id) => list.retain(|e| e.id != id),
                None => list.clear(),
            }
        }
    }

    #[must_use]
    pub fn is_registered(&self, signal_name: &str, id: Option<&str>) -> bool {
        let handlers = self.inner.handlers.lock().expect("handler table poisoned");
        match handlers.get(signal_name) {
            Some(list) => match id {
                Some(id) => list.iter().any(|e| e.id == id),
                None => !list.is_empty(),
            },
            None => false,
        }
    }

    #[must_use]
    pub fn handler_count(&self, signal_name: &str) -> usize {
        self.inner
            .handlers
            .lock()
            .expect("handler table poisoned")
            .get(signal_name)
            .map_or(0, Vec::len)
    }

    fn ensure_installed(&self, signal_name: &str, descriptor: &SignalDescriptor) -> Result<(), Error> {
        if !catalog::is_posix() {
            return Ok(());
        }
        let mut installed = self.inner.installed.lock().expect("installed set poisoned");
        if installed.contains(signal_name) {
            return Ok(());
        }
        let signum = catalog::signal_number(descriptor);
        let manager = self.clone();
        let name = signal_name.to_string();
        #[cfg(unix)]
        crate::posix::install(signal_name, signum, move || manager.dispatch(&name))?;
        #[cfg(not(unix))]
        let _ = (signum, manager, name);
        installed.insert(signal_name.to_string());
        Ok(())
    }

    fn emit_windows_fallback(&self, descriptor: &SignalDescriptor) {
        if let Some(fb) = &descriptor.windows_fallback {
            tracing::info!(
                event = "fulmen.signal.unsupported",
                signal = %descriptor.name,
                platform = "windows",
                fallback = %fb.fallback_behavior,
                operation_hint = %fb.operation_hint,
                "{}",
                fb.log_message
            );
        }
    }

    /// Test-only hook: re-enters the same dispatch path a real OS signal
    /// would, so tests never need to raise actual signals.
    pub fn trigger(&self, signal_name: &str) {
        self.dispatch(signal_name);
    }

    fn dispatch(&self, signal_name: &str) {
        let Ok(descriptor) = self.descriptor(signal_name) else {
            tracing::warn!(signal = signal_name, "dispatch called for unknown signal");
            return;
        };

        if descriptor.default_behavior == DefaultBehavior::GracefulShutdownWithDoubleTap {
            match self.handle_double_tap(&descriptor) {
                DoubleTapOutcome::ForceExit(code) => {
                    tracing::warn!(signal = %descriptor.name, "Force quitting...");
                    (self.inner.exit_fn)(code);
                    return;
                }
                DoubleTapOutcome::RunHandlers => {}
            }
        }

        if descriptor.default_behavior == DefaultBehavior::ReloadViaRestart {
            if let Some(handled) = self.dispatch_config_reload(&descriptor) {
                let _ = handled;
                return;
            }
        }

        self.inner.shutting_down.store(true, Ordering::SeqCst);
        let snapshot: Vec<(String, i32, Duration, HandlerFn)> = {
            let handlers = self.inner.handlers.lock().expect("handler table poisoned");
            handlers
                .get(signal_name)
                .map(|list| {
                    list.iter()
                        .map(|e| (e.id.clone(), e.priority, e.timeout, Arc::clone(&e.callback)))
                        .collect()
                })
                .unwrap_or_default()
        };
        tracing::info!(signal = %descriptor.name, handler_count = snapshot.len(), "dispatching signal");

        for (id, _priority, timeout, callback) in snapshot {
            match run_with_timeout(&callback, timeout) {
                RunOutcome::Ok => {}
                RunOutcome::HandlerError(msg) => {
                    tracing::warn!(
                        event = "fulmen.signal.handler_error",
                        signal = %descriptor.name,
                        handler = %id,
                        error = %msg,
                        "signal handler returned an error"
                    );
                }
                RunOutcome::TimedOut => {
                    tracing::warn!(
                        event = "fulmen.signal.handler_timeout",
                        signal = %descriptor.name,
                        handler = %id,
                        timeout_ms = timeout.as_millis() as u64,
                        "signal handler timed out"
                    );
                    if self.inner.timeout_behavior == TimeoutBehavior::ForceExit {
                        (self.inner.exit_fn)(descriptor.exit_code);
                        return;
                    }
                }
            }
        }

        if descriptor.default_behavior == DefaultBehavior::GracefulShutdownWithDoubleTap {
            if let Some(state) = self.inner.double_tap.lock().expect("double tap table poisoned").get_mut(&descriptor.name) {
                state.first_tap_time = None;
            }
        }
    }

    fn handle_double_tap(&self, descriptor: &SignalDescriptor) -> DoubleTapOutcome {
        let params = descriptor
            .double_tap
            .as_ref()
            .expect("graceful_shutdown_with_double_tap implies double_tap params");
        let mut guard = self.inner.double_tap.lock().expect("double tap table poisoned");
        let now = Instant::now();
        let state = guard.entry(descriptor.name.clone()).or_default();
        let window = Duration::from_secs(params.window_seconds);
        match state.first_tap_time {
            Some(first) if now.duration_since(first) <= window => DoubleTapOutcome::ForceExit(params.exit_code),
            _ => {
                state.first_tap_time = Some(now);
                tracing::info!(signal = %descriptor.name, "{}", params.message);
                DoubleTapOutcome::RunHandlers
            }
        }
    }

    /// Returns `Some(())` if a config-reload handler was registered and
    /// handled this dispatch (whether accepted or rejected); `None` if no
    /// such handler exists, so the caller should fall back to the generic
    /// handler list.
    fn dispatch_config_reload(&self, descriptor: &SignalDescriptor) -> Option<()> {
        let handler = {
            let guard = self.inner.config_reload_handlers.lock().expect("config reload table poisoned");
            let h = guard.get(&descriptor.name)?;
            (
                Arc::clone(&h.read_config),
                Arc::clone(&h.validate),
                h.on_validated.clone(),
                h.restart_exit_code,
            )
        };
        let (read_config, validate, on_validated, restart_exit_code) = handler;
        let new_config = read_config();
        match validate(&new_config) {
            Ok(()) => {
                tracing::info!(event = "fulmen.signal.config_reload_accepted", signal = %descriptor.name, "config reload accepted");
                if let Some(cb) = on_validated {
                    cb(&new_config);
                }
                self.inner
                    .config_reload_state
                    .lock()
                    .expect("config reload state poisoned")
                    .remove(&descriptor.name);
                (self.inner.exit_fn)(restart_exit_code);
            }
            Err(errors) => {
                tracing::warn!(
                    event = "fulmen.signal.config_reload_rejected",
                    signal = %descriptor.name,
                    error_count = errors.len(),
                    "config reload rejected"
                );
                let mut guard = self.inner.config_reload_state.lock().expect("config reload state poisoned");
                let state = guard.entry(descriptor.name.clone()).or_default();
                state.strikes += 1;
                if state.strikes >= CONFIG_RELOAD_STRIKE_THRESHOLD {
                    tracing::warn!(
                        event = "fulmen.signal.config_reload_threshold_exceeded",
                        signal = %descriptor.name,
                        strikes = state.strikes,
                        "repeated config reload failures"
                    );
                }
            }
        }
        Some(())
    }
}

enum DoubleTapOutcome {
    RunHandlers,
    ForceExit(i32),
}

enum RunOutcome {
    Ok,
    HandlerError(String),
    TimedOut,
}

fn run_with_timeout(callback: &HandlerFn, timeout: Duration) -> RunOutcome {
    let (tx, rx) = mpsc::channel();
    let callback = Arc::clone(callback);
    let _ = std::thread::Builder::new()
        .name("fulmen-signal-handler".to_string())
        .spawn(move || {
            let result = callback();
            let _ = tx.send(result);
        });
    match rx.recv_timeout(timeout) {
        Ok(Ok(())) => RunOutcome::Ok,
        Ok(Err(message)) => RunOutcome::HandlerError(message),
        Err(_) => RunOutcome::TimedOut,
    }
}
