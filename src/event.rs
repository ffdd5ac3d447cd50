//! Event bus between the workers and the coordinator.

use anyhow::Result;
use tokio::sync::broadcast;

use crate::switch::SwitchRole;

/// Daemon-wide events.
///
/// Workers publish these; the coordinator consumes them for logging and
/// lifecycle decisions. Controllers are never driven through the bus, they
/// are woken directly by switch listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A switch reached a new confirmed logical state.
    SwitchChanged { switch: SwitchRole, on: bool },
    /// A worker returned an error and stopped.
    WorkerFailed { name: String, error: String },
}

/// Publish-subscribe channel shared by all services.
///
/// # Example
///
/// ```no_run
/// use sunrise_clockd::event::{Event, EventBus};
/// use sunrise_clockd::switch::SwitchRole;
///
/// let event_bus = EventBus::new();
/// let mut subscriber = event_bus.subscribe();
///
/// event_bus.publish(Event::SwitchChanged { switch: SwitchRole::Light, on: true });
///
/// // In async context:
/// // let event = subscriber.recv().await;
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns an error if there are no active subscribers.
    pub fn publish(&self, event: Event) -> Result<()> {
        self.sender.send(event)?;
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
