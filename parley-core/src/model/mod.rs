mod key;
mod message;
mod room;
mod signaling;

pub use key::ClientKey;
pub use message::{MessageType, ProtocolMessage};
pub use room::{CreateRoomRequest, CreateRoomResponse, ErrResponse, JoinFrame};
pub use signaling::{IceCandidate, IceServerConfig, SdpType, SessionDescription};
