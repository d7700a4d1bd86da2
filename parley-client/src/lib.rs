//! Client side of the parley signaling protocol.
//!
//! A [`SessionDirectory`] creates rooms and hands out [`Room`] handles. A room
//! keeps one WebSocket pipe to the server, tracks who is present and
//! publishes everything it hears on a typed event bus. Each connection to
//! another member is a [`PeerSession`] that negotiates a peer connection
//! through the room.

pub mod directory;
mod error;
pub mod peer;
pub mod room;
pub mod transport;

pub use directory::{DirectoryConfig, SessionDirectory};
pub use error::{DirectoryError, Error, Result};
pub use peer::{
    Capabilities, MediaBuffer, MediaHandle, MediaSink, MemoryMediaSink, NegotiationState,
    PeerKind, PeerSession, Role, TrackHandler,
};
pub use room::{EventBus, EventHandler, EventType, Room, RoomEvent, RoomOptions, SubscriptionId};
pub use transport::{
    ConnectionState, PeerTransport, RtcTransport, RtcTransportFactory, SignalingState,
    TransportConfig, TransportEvent, TransportFactory,
};
