//! Structured logging for the collator.
//!
//! Provides dual-mode logging:
//! - Human-readable console output for interactive use
//! - Machine-parseable JSONL for queue workers and log shippers
//!
//! # Usage
//!
//! ```ignore
//! use lc_core::logging::{init_logging, LogConfig, LogContext, Stage, event_names};
//!
//! // Initialize once, at binary start-up
//! let config = LogConfig::from_env(None, None);
//! init_logging(&config);
//!
//! // Hand the engine an explicit context
//! let ctx = LogContext::new(generate_run_id(), 100, "device-1", LogType::Call);
//! ```
//!
//! # Design Notes
//!
//! - stdout is reserved for command payloads (JSON reports)
//! - stderr receives all log output (human or JSONL)
//! - The library never installs a global subscriber; only the binary does

pub mod config;
pub mod events;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, LogContext, Stage};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose events pass the default filter.
const LOG_TARGETS: [&str; 4] = ["lc_core", "lc_rowstore", "lc_hash", "lc_common"];

/// Default filter directive for a level: our crates at `level`, others at warn.
pub fn default_directive(level: LogLevel) -> String {
    let mut directive = String::from("warn");
    for target in LOG_TARGETS {
        directive.push_str(&format!(",{}={}", target, level));
    }
    directive
}

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs. A full
/// `RUST_LOG` directive, when set, replaces the default filter.
pub fn init_logging(config: &LogConfig) {
    let filter = match std::env::var("LC_LOG") {
        // LC_LOG is a bare level and already folded into config.level
        Ok(_) => EnvFilter::new(default_directive(config.level)),
        Err(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_directive(config.level))),
    };

    // try_init: a second call (tests, embedding) keeps the first subscriber
    let result = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);

            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => {
            let json_layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init()
        }
    };

    if let Err(err) = result {
        tracing::debug!(error = %err, "logging already initialized");
    }
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    // Shorten to first 12 hex chars for readability
    format!("run-{}", &uuid[..12])
}
