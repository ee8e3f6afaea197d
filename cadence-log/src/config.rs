//! Environment-driven logging configuration and the global level switches.

use crate::level::{Format, Level};
use once_cell::sync::Lazy;
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

/// Global debug flag, checked by the `debug!` macro.
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Global minimum level.
static LOG_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

static CONFIG: Lazy<LogConfig> = Lazy::new(|| {
    let config = LogConfig::from_env();
    config.apply();
    config
});

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
    /// Whether to include timestamps
    pub timestamps: bool,
    /// Whether to include the record target (job name or module path)
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
            timestamps: true,
            target: true,
        }
    }
}

impl LogConfig {
    /// Read the `CADENCE_*` variables from the process environment.
    ///
    /// - `CADENCE_DEBUG=1` - enable debug logging
    /// - `CADENCE_LOG_LEVEL=trace|debug|info|warn|error|off`
    /// - `CADENCE_LOG_FORMAT=pretty|compact|json|facade`
    /// - `CADENCE_LOG_COLOR=1|0`
    /// - `CADENCE_LOG_TIMESTAMPS=1|0`
    /// - `CADENCE_LOG_TARGET=1|0`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Unknown or malformed values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let debug = flag("CADENCE_DEBUG").unwrap_or(false);

        let level = lookup("CADENCE_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("CADENCE_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = flag("CADENCE_LOG_COLOR").unwrap_or_else(|| {
            lookup("NO_COLOR").is_none() && std::io::stderr().is_terminal()
        });

        Self {
            debug,
            level,
            format,
            color,
            timestamps: flag("CADENCE_LOG_TIMESTAMPS").unwrap_or(true),
            target: flag("CADENCE_LOG_TARGET").unwrap_or(true),
        }
    }

    /// Push this config's level and debug flag into the global switches.
    pub fn apply(&self) {
        DEBUG_ENABLED.store(self.debug, Ordering::SeqCst);
        LOG_LEVEL.store(self.level as u8, Ordering::SeqCst);
    }
}

/// Initialize the logging system from the environment.
///
/// Happens implicitly on the first emitted record; call it to do so eagerly.
pub fn init() {
    Lazy::force(&CONFIG);
}

/// The configuration read at initialization.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

/// Check if debug logging is enabled.
#[inline]
pub fn is_debug_enabled() -> bool {
    init();
    DEBUG_ENABLED.load(Ordering::Relaxed)
}

/// Check if records at `level` pass the global filter.
#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    init();
    level != Level::Off && level as u8 >= LOG_LEVEL.load(Ordering::Relaxed)
}

/// Whether a record at `level` is written.
///
/// Debug records also pass while debug mode is on, whatever the level.
#[inline]
pub fn should_log(level: Level) -> bool {
    is_level_enabled(level) || (level == Level::Debug && is_debug_enabled())
}

/// Current global minimum level.
pub fn current_level() -> Level {
    init();
    Level::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set the global minimum level at runtime.
pub fn set_level(level: Level) {
    init();
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Enable or disable debug mode at runtime.
pub fn set_debug(enabled: bool) {
    init();
    DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    if enabled && current_level() > Level::Debug {
        set_level(Level::Debug);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = LogConfig::from_lookup(lookup_from(&[("NO_COLOR", "1")]));
        assert!(!config.debug);
        assert_eq!(config.level, Level::Info);
        assert_eq!(config.format, Format::Json);
        assert!(!config.color);
        assert!(config.timestamps);
        assert!(config.target);
    }

    #[test]
    fn test_debug_lowers_default_level() {
        let config = LogConfig::from_lookup(lookup_from(&[("CADENCE_DEBUG", "true")]));
        assert!(config.debug);
        assert_eq!(config.level, Level::Debug);
    }

    #[test]
    fn test_explicit_level_wins_over_debug() {
        let config = LogConfig::from_lookup(lookup_from(&[
            ("CADENCE_DEBUG", "1"),
            ("CADENCE_LOG_LEVEL", "trace"),
        ]));
        assert_eq!(config.level, Level::Trace);
    }

    #[test]
    fn test_format_and_flags() {
        let config = LogConfig::from_lookup(lookup_from(&[
            ("CADENCE_LOG_FORMAT", "compact"),
            ("CADENCE_LOG_COLOR", "1"),
            ("CADENCE_LOG_TIMESTAMPS", "0"),
            ("CADENCE_LOG_TARGET", "false"),
        ]));
        assert_eq!(config.format, Format::Compact);
        assert!(config.color);
        assert!(!config.timestamps);
        assert!(!config.target);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = LogConfig::from_lookup(lookup_from(&[
            ("CADENCE_LOG_LEVEL", "chatty"),
            ("CADENCE_LOG_FORMAT", "yaml"),
        ]));
        assert_eq!(config.level, Level::Info);
        assert_eq!(config.format, Format::Json);
    }

    #[test]
    fn test_off_is_never_enabled() {
        assert!(!is_level_enabled(Level::Off));
    }

    #[test]
    fn test_set_level_and_debug() {
        init();
        let original_level = current_level();
        let original_debug = is_debug_enabled();

        set_level(Level::Error);
        assert_eq!(current_level(), Level::Error);
        assert!(!is_level_enabled(Level::Warn));
        assert!(is_level_enabled(Level::Error));

        set_debug(true);
        assert!(is_debug_enabled());
        assert_eq!(current_level(), Level::Debug);

        // Debug mode keeps debug records flowing after the level is raised.
        set_level(Level::Info);
        assert!(!is_level_enabled(Level::Debug));
        assert!(should_log(Level::Debug));
        assert!(crate::Logger::new("MyJob").is_enabled(Level::Debug));
        assert!(!should_log(Level::Trace));
        assert!(should_log(Level::Info));

        set_debug(false);
        assert!(!should_log(Level::Debug));

        set_debug(original_debug);
        set_level(original_level);
    }
}
