mod event_bus;
mod pipe;
mod room;
mod room_event;
mod room_options;

pub use event_bus::*;
pub use room::*;
pub use room_event::*;
pub use room_options::*;
