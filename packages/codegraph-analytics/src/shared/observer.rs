//! Abstract observability hooks
//!
//! The engine never talks to a telemetry backend directly. Engines hold an
//! `Arc<dyn Observer>` injected at construction time (no module-level
//! singleton); the default is a no-op. An OpenTelemetry adapter lives with
//! the caller, not here.

use std::sync::Arc;

/// Key/value attributes attached to spans, events, and counters
pub type Attributes = Vec<(String, String)>;

/// Helper for building attribute lists inline
pub fn attrs<const N: usize>(pairs: [(&str, &str); N]) -> Attributes {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Open span handle
pub trait ObserverSpan: Send {
    fn add_event(&mut self, name: &str, attrs: Attributes);
    fn set_attrs(&mut self, attrs: Attributes);
    fn end(&mut self);
}

/// Telemetry seam implemented by the caller
pub trait Observer: Send + Sync {
    fn start_span(&self, name: &str, attrs: Attributes) -> Box<dyn ObserverSpan>;

    /// Record a counter/gauge observation
    fn observe(&self, name: &str, labels: Attributes, value: f64);
}

/// Default observer: does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

struct NoopSpan;

impl ObserverSpan for NoopSpan {
    fn add_event(&mut self, _name: &str, _attrs: Attributes) {}
    fn set_attrs(&mut self, _attrs: Attributes) {}
    fn end(&mut self) {}
}

impl Observer for NoopObserver {
    fn start_span(&self, _name: &str, _attrs: Attributes) -> Box<dyn ObserverSpan> {
        Box::new(NoopSpan)
    }

    fn observe(&self, _name: &str, _labels: Attributes, _value: f64) {}
}

/// Shared no-op instance for engine constructors
pub fn noop_observer() -> Arc<dyn Observer> {
    Arc::new(NoopObserver)
}
