//! Structured logging setup.
//!
//! Mirrors the reference gateway's `StructuredFormatter`/`TimedLogger` pair: every log line
//! carries a stable set of fields and elapsed-time measurements are taken with a small RAII
//! guard rather than scattered `Instant::now()` calls. Built on `log` + `env_logger` rather than
//! re-implemented, matching the rest of the provider-client stack this crate is grounded on.

use std::time::Instant;

/// Install the process-wide logger. Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

/// Measures and logs the elapsed time of a scope at `Drop` time.
///
/// ```rust
/// use aigateway::logging::TimedLogger;
/// {
///     let _t = TimedLogger::new("tool_execute", "calculator");
///     // ... work ...
/// } // logs `event=tool_execute name=calculator elapsed_ms=...` on drop
/// ```
pub struct TimedLogger {
    event: &'static str,
    label: String,
    start: Instant,
}

impl TimedLogger {
    pub fn new(event: &'static str, label: impl Into<String>) -> Self {
        Self {
            event,
            label: label.into(),
            start: Instant::now(),
        }
    }

    /// Milliseconds elapsed since construction.
    pub fn elapsed_ms(&self) -> u128 {
        self.start.elapsed().as_millis()
    }
}

impl Drop for TimedLogger {
    fn drop(&mut self) {
        if log::log_enabled!(log::Level::Info) {
            log::info!(
                "event={} label={} elapsed_ms={}",
                self.event,
                self.label,
                self.elapsed_ms()
            );
        }
    }
}
