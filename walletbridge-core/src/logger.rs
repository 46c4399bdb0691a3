//! Logging shim that bridges the `log` facade to a host-provided sink.
//!
//! The hosting process installs a [`Logger`] via [`set_logger`]; records
//! emitted through the `log` facade are then forwarded to it, with
//! debug/trace records from foreign crates filtered out.

use std::sync::{Arc, OnceLock};

/// Trait representing a logger that can log messages at various levels.
///
/// The hosting process (CLI, test harness, embedder) implements this to
/// receive log records emitted by the bridge through the `log` facade.
///
/// # Examples
///
/// ```rust
/// use walletbridge_core::logger::{Logger, LogLevel};
///
/// struct StdoutLogger;
///
/// impl Logger for StdoutLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         println!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    fn log(&self, level: LogLevel, message: String);
}

/// Enumeration of possible log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Designates very low priority, often extremely detailed messages.
    Trace,
    /// Designates lower priority debugging information.
    Debug,
    /// Designates informational messages that highlight the progress of the application.
    Info,
    /// Designates potentially harmful situations.
    Warn,
    /// Designates error events that might still allow the application to continue running.
    Error,
}

/// A logger that forwards log records to the user-provided [`Logger`].
struct ForwardingLogger;

impl log::Log for ForwardingLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        // Debug/trace records from foreign crates are dropped; the bridge's
        // own records always go through.
        let is_record_from_bridge = record
            .module_path()
            .is_some_and(|module_path| module_path.starts_with("walletbridge"));

        let is_debug_or_trace_level =
            record.level() == log::Level::Debug || record.level() == log::Level::Trace;

        if is_debug_or_trace_level && !is_record_from_bridge {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            let level = log_level(record.level());
            let message = format!("{}", record.args());
            logger.log(level, message);
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

/// A global instance of the user-provided logger.
static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Sets the global logger.
///
/// Should be called once, before any logging occurs. If the logger has
/// already been set, this function prints a message and does nothing.
pub fn set_logger(logger: Arc<dyn Logger>) {
    match LOGGER_INSTANCE.set(logger) {
        Ok(()) => (),
        Err(_) => println!("Logger already set"),
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

/// Initializes the `log` facade with the forwarding shim.
fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForwardingLogger = ForwardingLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CapturingLogger {
        messages: Mutex<Vec<(LogLevel, String)>>,
    }

    impl Logger for CapturingLogger {
        fn log(&self, level: LogLevel, message: String) {
            self.messages
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((level, message));
        }
    }

    #[test]
    fn test_records_are_forwarded_to_the_sink() {
        let sink = Arc::new(CapturingLogger {
            messages: Mutex::new(Vec::new()),
        });
        set_logger(Arc::clone(&sink) as Arc<dyn Logger>);

        log::info!("bridge ready");
        log::debug!("decision wait armed");

        let messages = sink
            .messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        assert!(messages
            .iter()
            .any(|(level, message)| *level == LogLevel::Info && message == "bridge ready"));
        assert!(messages
            .iter()
            .any(|(level, message)| *level == LogLevel::Debug
                && message == "decision wait armed"));
    }
}
