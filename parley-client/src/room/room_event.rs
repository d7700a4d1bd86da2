use crate::peer::PeerSession;
use parley_core::ProtocolMessage;

/// Keys of the room's event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Open,
    Closed,
    Error,
    VideoOffer,
    VideoAnswer,
    DataOffer,
    DataAnswer,
    NewIceCandidate,
    Chat,
    UserListInit,
    UserJoin,
    UserLeave,
}

#[derive(Clone)]
pub enum RoomEvent {
    /// The join frame has been written on a fresh pipe.
    Open,

    /// The pipe ended without the caller asking for it.
    Closed,

    Error(ProtocolMessage),

    /// A peer offered a call; the session is ready to be answered.
    VideoOffer(PeerSession),

    VideoAnswer(ProtocolMessage),

    /// A peer offered a data link; the session is ready to be answered.
    DataOffer(PeerSession),

    DataAnswer(ProtocolMessage),

    NewIceCandidate(ProtocolMessage),

    Chat(ProtocolMessage),

    /// Authoritative membership snapshot sent once after joining.
    UserListInit(Vec<String>),

    UserJoin(String),

    UserLeave(String),
}

impl RoomEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            RoomEvent::Open => EventType::Open,
            RoomEvent::Closed => EventType::Closed,
            RoomEvent::Error(_) => EventType::Error,
            RoomEvent::VideoOffer(_) => EventType::VideoOffer,
            RoomEvent::VideoAnswer(_) => EventType::VideoAnswer,
            RoomEvent::DataOffer(_) => EventType::DataOffer,
            RoomEvent::DataAnswer(_) => EventType::DataAnswer,
            RoomEvent::NewIceCandidate(_) => EventType::NewIceCandidate,
            RoomEvent::Chat(_) => EventType::Chat,
            RoomEvent::UserListInit(_) => EventType::UserListInit,
            RoomEvent::UserJoin(_) => EventType::UserJoin,
            RoomEvent::UserLeave(_) => EventType::UserLeave,
        }
    }

    /// The protocol message carried by re-emitted frames.
    pub fn message(&self) -> Option<&ProtocolMessage> {
        match self {
            RoomEvent::Error(m)
            | RoomEvent::VideoAnswer(m)
            | RoomEvent::DataAnswer(m)
            | RoomEvent::NewIceCandidate(m)
            | RoomEvent::Chat(m) => Some(m),
            _ => None,
        }
    }

    pub fn session(&self) -> Option<&PeerSession> {
        match self {
            RoomEvent::VideoOffer(s) | RoomEvent::DataOffer(s) => Some(s),
            _ => None,
        }
    }
}
