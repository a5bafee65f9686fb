//! Observability for aerolite
//!
//! - Structured logging (JSON lines)
//! - Typed lifecycle events
//! - Scope-based begin/complete tracing
//!
//! Observability is read-only: it never changes the outcome of the operation
//! it describes, and a failure to write a log line is swallowed.
//!
//! ```ignore
//! use aerolite::observability::{Event, Logger};
//!
//! Logger::info("TXN_COMMIT", &[("changes", "3")]);
//! aerolite::observability::log_event_with_fields(Event::DocumentPruned, &[("doc_id", "a")]);
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Log a lifecycle event at an explicit severity
pub fn log_event_at(severity: Severity, event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity, event.as_str(), fields);
}
