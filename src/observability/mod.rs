//! Observability subsystem for multidb
//!
//! - Structured JSON-line logging to stderr
//! - Process-wide counters
//! - Begin/complete scopes around commits
//!
//! # Principles
//!
//! 1. Observability is read-only: it never changes an operation's outcome
//! 2. No background threads
//! 3. Deterministic output
//!
//! # Usage
//!
//! ```ignore
//! use multidb::observability::{Logger, Severity, metrics};
//!
//! Logger::set_min_severity(Severity::Info);
//! let snapshot = metrics().snapshot();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{metrics, MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

#[cfg(test)]
pub(crate) use logger::capture_log;

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields at its own severity
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    if event == Event::StorageCorruption {
        metrics().increment_corruption_detected();
    }
    Logger::log(event.severity(), event.as_str(), fields);
}
