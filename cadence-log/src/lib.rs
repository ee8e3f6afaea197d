//! Logging for cadence jobs.
//!
//! Records go to stderr (pretty, compact or JSON) or to the `log` facade,
//! controlled by `CADENCE_*` environment variables.
//!
//! # Usage
//!
//! ```rust
//! use cadence_log::{debug, info, Logger};
//!
//! info!("Scheduler started");
//! debug!(target: "cadence::runner", "Running job: {}", "cleanup");
//!
//! let logger = Logger::new("cleanup");
//! logger.trace("removing stale files");
//! ```
//!
//! # Environment Variables
//!
//! - `CADENCE_DEBUG=1` - Enable debug logging
//! - `CADENCE_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `CADENCE_LOG_FORMAT=pretty|compact|json|facade` - Set output format
//! - `CADENCE_LOG_COLOR=1|0` - Enable/disable colors

mod config;
mod level;
mod logger;
mod output;

pub use config::{
    config, current_level, init, is_debug_enabled, is_level_enabled, set_debug, set_level,
    should_log, LogConfig,
};
pub use level::{Format, Level};
pub use logger::Logger;
#[doc(hidden)]
pub use output::emit;

/// Log a trace message.
#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::should_log($crate::Level::Trace) {
            $crate::emit($crate::Level::Trace, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::should_log($crate::Level::Trace) {
            $crate::emit($crate::Level::Trace, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log a debug message.
///
/// Enabled by `CADENCE_DEBUG=1` or a level of `debug` or lower.
#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::should_log($crate::Level::Debug) {
            $crate::emit($crate::Level::Debug, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::should_log($crate::Level::Debug) {
            $crate::emit($crate::Level::Debug, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log an info message.
#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::should_log($crate::Level::Info) {
            $crate::emit($crate::Level::Info, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::should_log($crate::Level::Info) {
            $crate::emit($crate::Level::Info, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log a warning message.
#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::should_log($crate::Level::Warn) {
            $crate::emit($crate::Level::Warn, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::should_log($crate::Level::Warn) {
            $crate::emit($crate::Level::Warn, module_path!(), &format!($($arg)+));
        }
    };
}

/// Log an error message.
#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => {
        if $crate::should_log($crate::Level::Error) {
            $crate::emit($crate::Level::Error, $target, &format!($($arg)+));
        }
    };
    ($($arg:tt)+) => {
        if $crate::should_log($crate::Level::Error) {
            $crate::emit($crate::Level::Error, module_path!(), &format!($($arg)+));
        }
    };
}

#[cfg(feature = "tracing")]
pub mod tracing_compat {
    //! A `tracing` subscriber that honours the cadence log config.

    use super::*;

    pub fn subscriber() -> impl tracing::Subscriber {
        use tracing_subscriber::prelude::*;
        use tracing_subscriber::{fmt, EnvFilter};

        let config = config();
        let level = match config.level {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(config.color))
    }
}
