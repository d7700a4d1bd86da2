pub mod model;
pub mod sdp;
pub mod validate;

pub use model::{
    ClientKey, CreateRoomRequest, CreateRoomResponse, ErrResponse, IceCandidate, IceServerConfig,
    JoinFrame, MessageType, ProtocolMessage, SdpType, SessionDescription,
};

/// ICE server used when the caller does not configure one.
pub const DEFAULT_STUN_ADDR: &str = "stun:stun.stunprotocol.org";
