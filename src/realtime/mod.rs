//! Event bus + socket server (C8).

pub mod bus;
pub mod event;
pub mod socket;

pub use bus::EventBus;
pub use event::{BusMessage, EventType, WireEvent};
pub use socket::{upgrade, SocketState};
