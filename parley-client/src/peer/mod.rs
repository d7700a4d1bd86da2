mod media_relay;
mod negotiation_state;
mod negotiator;
mod peer_session;
mod session_command;
mod session_variant;

pub use media_relay::*;
pub use negotiation_state::*;
pub use peer_session::*;
pub use session_variant::{Capabilities, PeerKind, Role};
