//! Cross-platform signal manager (C4): ordered handler dispatch,
//! SIGINT double-tap, SIGHUP config-reload, and Windows fallback
//! telemetry, backed by catalog-sourced [`descriptor::SignalDescriptor`]s.

pub mod catalog;
pub mod descriptor;
pub mod manager;

#[cfg(unix)]
mod posix;

pub use catalog::{BuiltinSignalSource, CatalogBackedSignalSource, SignalSource};
pub use descriptor::{DefaultBehavior, DoubleTapParams, PlatformOverrides, SignalDescriptor, WindowsFallback};
pub use manager::{HandlerOptions, HandlerResult, SignalManager, TimeoutBehavior};
