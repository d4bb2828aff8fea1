//! In-memory message bus for tests/dev and the stdin-fed binary.

use std::sync::{Mutex, mpsc};

use thiserror::Error;
use tracing::debug;

use crate::bus::{EventBus, Subscription};

#[derive(Debug, Error)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    #[error("bus lock poisoned")]
    Poisoned,

    /// The bus was closed; no further messages are accepted.
    #[error("bus closed")]
    Closed,
}

/// In-memory pub/sub bus.
///
/// - No IO / no async
/// - Best-effort fan-out
/// - `close()` drops every sender so subscribers drain what is queued and then
///   observe a disconnect
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Option<Vec<mpsc::Sender<M>>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop accepting messages and disconnect subscribers once they drain.
    pub fn close(&self) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.take();
        }
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Some(Vec::new())),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let mut guard = self.subscribers.lock().map_err(|_| InMemoryBusError::Poisoned)?;
        let subs = guard.as_mut().ok_or(InMemoryBusError::Closed)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(message.clone()).is_ok());
        debug!(subscribers = subs.len(), "published message");

        Ok(())
    }

    fn subscribe(&self) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A closed (or poisoned) bus still hands out a subscription; the sender is
        // dropped right away so the subscriber sees an immediate disconnect.
        if let Ok(mut guard) = self.subscribers.lock() {
            if let Some(subs) = guard.as_mut() {
                subs.push(tx);
            }
        }

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::RecvTimeoutError;
    use std::time::Duration;

    #[test]
    fn every_subscriber_receives_every_message() {
        let bus = InMemoryEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(1u32).unwrap();
        bus.publish(2u32).unwrap();

        assert_eq!(a.recv().unwrap(), 1);
        assert_eq!(a.recv().unwrap(), 2);
        assert_eq!(b.recv().unwrap(), 1);
        assert_eq!(b.recv().unwrap(), 2);
    }

    #[test]
    fn close_drains_then_disconnects() {
        let bus = InMemoryEventBus::new();
        let sub = bus.subscribe();

        bus.publish("queued").unwrap();
        bus.close();

        assert_eq!(sub.recv_timeout(Duration::from_millis(50)).unwrap(), "queued");
        assert_eq!(
            sub.recv_timeout(Duration::from_millis(50)),
            Err(RecvTimeoutError::Disconnected)
        );
        assert!(matches!(bus.publish("late"), Err(InMemoryBusError::Closed)));
    }

    #[test]
    fn subscribing_to_closed_bus_disconnects_immediately() {
        let bus: InMemoryEventBus<u8> = InMemoryEventBus::new();
        bus.close();
        let sub = bus.subscribe();
        assert!(sub.recv().is_err());
    }
}
