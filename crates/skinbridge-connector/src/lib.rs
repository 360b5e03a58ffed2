//! skinbridge connector - headless runtime around the overlay core
//!
//! Wires the bridge channel, the overlay and a snapshot-backed host tree
//! into one single-threaded event loop, with TOML configuration and
//! tracing output that is mirrored to the controller.

pub mod config;
pub mod error;
pub mod host;
pub mod log_layer;
pub mod runtime;

pub use config::{BridgeSection, ConnectorConfig, HostSection, LoggingSection};
pub use error::{ConnectorError, Result};
pub use host::SnapshotHost;
pub use log_layer::{init_tracing, ControllerLogLayer, LogSink};
pub use runtime::{spawn_stdin_commands, HostCommand, OverlayRuntime, TokioTimers};
