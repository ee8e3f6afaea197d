//! Named loggers.

use crate::config::should_log;
use crate::level::Level;
use crate::output::emit;
use std::sync::Arc;

/// A logger bound to a name, typically a job name.
///
/// The name becomes the target of every record, so output from different
/// jobs can be told apart. Cloning is cheap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Logger {
    name: Arc<str>,
}

impl Logger {
    /// Create a logger for `name`.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// Name used as the record target.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a record at `level` would be written, by this logger or by
    /// the matching macro.
    pub fn is_enabled(&self, level: Level) -> bool {
        should_log(level)
    }

    /// Emit `message` at `level`.
    pub fn log(&self, level: Level, message: impl AsRef<str>) {
        if self.is_enabled(level) {
            emit(level, &self.name, message.as_ref());
        }
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(Level::Trace, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(Level::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(Level::Error, message);
    }
}
