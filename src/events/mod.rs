//! System events and the in-process bus that distributes them.
//!
//! The monitor publishes [`SystemEvent`]s; the assistant and the WebSocket
//! bridge subscribe.

pub mod event_bus;
pub mod system_events;

pub use event_bus::{EventBus, EventHandler, HandlerId, PublishReport};
pub use system_events::{SystemEvent, SystemEventKind};
