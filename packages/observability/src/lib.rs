//! # Observability
//!
//! Logging initialisation for the quorum invoker.
//!
//! Services call `observability::init_with_config()` once at startup and use standard
//! `tracing` macros everywhere else. Output goes to a compact stderr layer,
//! and optionally to an append-only JSONL file for later inspection with
//! `jq` or `lnav`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "quorum-invoker".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//! }
//! ```

mod json_layer;
mod writer;

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{LogFileWriter, WriterFactory};

use std::io;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service, included in every JSONL line.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional JSONL log file. No file layer is installed when unset.
    pub log_path: Option<PathBuf>,

    /// Emit human-readable logs to stderr.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with custom configuration.
///
/// Falls back to stderr when neither a file nor stderr output was requested.
/// Calling this more than once keeps the first subscriber.
///
/// # Panics
///
/// Panics if the log file cannot be created or opened.
pub fn init_with_config(config: LogConfig) {
    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
    };

    let json_layer = config.log_path.as_ref().map(|path| {
        let writer = LogFileWriter::new(path)
            .unwrap_or_else(|e| panic!("failed to open log file {:?}: {}", path, e));
        JsonLayer::new(config.service_name.clone(), WriterFactory::new(writer)).with_filter(env_filter())
    });

    let stderr_layer = (config.also_stderr || config.log_path.is_none()).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(io::stderr)
            .with_filter(env_filter())
    });

    let installed = tracing_subscriber::registry()
        .with(json_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            service = %config.service_name,
            log_path = ?config.log_path,
            "observability initialized"
        );
    }
}
