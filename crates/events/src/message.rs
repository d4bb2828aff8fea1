//! Inbound message union and normalization.

use serde::{Deserialize, Serialize};

use crate::hook::{ChangeEventHook, EventHook, Hook};

/// Either inbound shape, as received off the bus.
///
/// The JSON form is untagged: a `deviceChangeEvent` key selects the change variant,
/// a top-level `deviceEvent` key the direct one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    Change(ChangeEventHook),
    Event(EventHook),
}

impl InboundMessage {
    /// Stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            InboundMessage::Event(_) => "device.event",
            InboundMessage::Change(_) => "device.change",
        }
    }

    /// The hook this message is delivered to (the outer one for change events).
    pub fn hook(&self) -> &Hook {
        match self {
            InboundMessage::Event(m) => &m.hook,
            InboundMessage::Change(m) => &m.hook,
        }
    }

    /// Collapse both shapes into the canonical event hook.
    pub fn normalize(self) -> EventHook {
        match self {
            InboundMessage::Event(m) => m,
            InboundMessage::Change(m) => m.into_event_hook(),
        }
    }
}

impl From<EventHook> for InboundMessage {
    fn from(value: EventHook) -> Self {
        InboundMessage::Event(value)
    }
}

impl From<ChangeEventHook> for InboundMessage {
    fn from(value: ChangeEventHook) -> Self {
        InboundMessage::Change(value)
    }
}
