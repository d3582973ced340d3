//! Event capture for asserting on structured diagnostics.
//!
//! [`capture_events`] runs a closure under a thread-local subscriber that
//! records every event, so tests can check what the search logged without
//! touching the global subscriber.

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{Layer, layer::Context, prelude::*, registry::Registry};

/// One recorded event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CapturedEvent {
    /// Level the event was emitted at.
    pub level: Level,
    /// Module path or explicit target of the event.
    pub target: String,
    /// The `message` field, empty when the event carried none.
    pub message: String,
    /// Every other field, rendered through `Display` or `Debug`.
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    /// Returns the rendered value of `name`, if the event carried it.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

#[derive(Clone, Default)]
struct EventSink {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl<S: Subscriber> Layer<S> for EventSink {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);
        let captured = CapturedEvent {
            level: *event.metadata().level(),
            target: event.metadata().target().to_owned(),
            message: visitor.message,
            fields: visitor.fields,
        };
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(captured);
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: BTreeMap<String, String>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: String) {
        if field.name() == "message" {
            self.message = value;
        } else {
            self.fields.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_owned());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }
}

/// Runs `body` with a recording subscriber installed for the current thread
/// and returns its result together with every event emitted meanwhile.
///
/// # Examples
/// ```
/// use kumiko_test_support::events::capture_events;
///
/// let ((), events) = capture_events(|| tracing::warn!(steps = 3_u64, "budget spent"));
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].message, "budget spent");
/// assert_eq!(events[0].field("steps"), Some("3"));
/// ```
pub fn capture_events<T>(body: impl FnOnce() -> T) -> (T, Vec<CapturedEvent>) {
    let sink = EventSink::default();
    let subscriber = Registry::default().with(sink.clone());
    let output = tracing::subscriber::with_default(subscriber, body);
    let events = sink
        .events
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    (output, events)
}
