//! Inbound device-event messages and the bus they travel on.
//!
//! - `hook`: the two message shapes published by the device service
//! - `message`: the tagged union of both shapes and its normalization
//! - `bus` / `in_memory_bus`: transport-agnostic pub/sub mechanics

pub mod bus;
pub mod hook;
pub mod in_memory_bus;
pub mod message;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use hook::{ChangeEventHook, DeviceChangeEvent, EventHook, Hook};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use message::InboundMessage;
pub use tenant::TenantScoped;
