//! `fulmen`: an observability and process-control runtime.
//!
//! A cross-platform signal manager, a progressive logging engine, and a
//! telemetry engine, backed by a shared digest facility, schema validator,
//! catalog loader, and error taxonomy. This crate re-exports each
//! sub-crate's public surface under one namespace; applications that only
//! need one component can depend on that sub-crate directly instead.

pub use fulmen_catalog as catalog;
pub use fulmen_digest as digest;
pub use fulmen_error as error;
pub use fulmen_http as http;
pub use fulmen_logging as logging;
pub use fulmen_schema as schema;
pub use fulmen_signal as signal;
pub use fulmen_telemetry as telemetry;

pub use fulmen_error::{Error, ErrorCode, Result, Severity};
