use nodeforge_models::Event;
use tokio::sync::broadcast;
use tracing::{trace, warn};

/// Bounded per-subscriber queue depth.
const CHANNEL_CAPACITY: usize = 1024;

/// In-process publish/subscribe channel: one `broadcast::Sender`, cheap
/// fan-out, and a publish that never blocks on a slow subscriber.
/// `RecvError::Lagged` is surfaced to each subscriber loop as a
/// `SubscriberLagged` diagnostic event instead of silently dropping frames.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Never blocks; a channel with zero subscribers simply drops the event.
    pub fn publish(&self, event: Event) {
        match self.sender.send(event) {
            Ok(n) => trace!(subscribers = n, "event published"),
            Err(_) => trace!("event published with no subscribers"),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Drains one subscriber's stream, reporting lag as a synthetic event
/// rather than silently skipping. Used by the `/events` WebSocket handler.
pub async fn next_event(rx: &mut broadcast::Receiver<Event>) -> Option<Event> {
    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "subscriber lagged, events dropped");
                return Some(Event::new(nodeforge_models::event::EventKind::SubscriberLagged {
                    skipped,
                }));
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}
