//! Broadcast channel for non-speech events.
//!
//! The tailer publishes every stat, state and unclassified event here;
//! anything interested (the binary's notification listener, tests) subscribes.
//! Publishing never blocks and never fails: with no subscribers the event is
//! simply dropped.

use tokio::sync::broadcast::{self, error::RecvError, Receiver, Sender};

use crate::classify::Event;

/// Buffered events per subscriber before the slowest one starts lagging.
pub const EVENT_BUS_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Cheap to clone; every clone publishes into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fire-and-forget publish.
    pub fn publish(&self, event: Event) {
        // Err only means nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// EventSubscriber
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct EventSubscriber {
    receiver: Receiver<Event>,
}

impl EventSubscriber {
    /// Next event, skipping over any gap caused by lagging.
    ///
    /// Returns `None` once every [`EventBus`] handle has been dropped.
    pub async fn next_event(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("event bus: subscriber lagged, {skipped} events skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant used by tests and synchronous callers.
    pub fn try_next_event(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
