//! Message publishing/subscription abstraction (mechanics only).
//!
//! The device service fans events out over a message bus; this crate only needs the
//! consuming side plus a publisher for wiring and tests. The abstraction makes minimal
//! assumptions:
//!
//! - **Transport-agnostic**: in-memory channels, a broker client, anything with fan-out
//! - **At-least-once delivery**: a message may be delivered more than once
//! - **No ordering guarantees** across publishers
//!
//! Redelivery of a device event produces a second, independent set of rows; dedup is
//! not a bus concern.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to a message stream.
///
/// Each subscription gets a copy of every message published after it was created
/// (broadcast semantics). Designed for single-threaded consumption.
///
/// ```ignore
/// let subscription = bus.subscribe();
/// loop {
///     match subscription.recv_timeout(Duration::from_millis(250)) {
///         Ok(message) => client.ingest(message)?,
///         Err(RecvTimeoutError::Timeout) => continue,   // check for shutdown
///         Err(RecvTimeoutError::Disconnected) => break, // bus closed and drained
///     }
/// }
/// ```
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Transport-agnostic pub/sub bus.
///
/// `publish()` can fail (bus closed, broker unreachable); failures are surfaced to the
/// caller. Implementations must be safe to share across threads.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
