//! Event listener that keeps every supervisor event for assertions.

use std::sync::Mutex;

use crate::events::{EventListener, SupervisorEvent};

#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<SupervisorEvent>>,
}

impl RecordingListener {
    #[must_use]
    pub fn events(&self) -> Vec<SupervisorEvent> {
        self.events
            .lock()
            .expect("event recorder mutex poisoned")
            .clone()
    }

    /// Event names in emission order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(SupervisorEvent::name).collect()
    }

    #[must_use]
    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|seen| *seen == name).count()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &SupervisorEvent) {
        self.events
            .lock()
            .expect("event recorder mutex poisoned")
            .push(event.clone());
    }
}
