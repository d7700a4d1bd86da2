pub use parley_core::{ClientKey, MessageType, ProtocolMessage};

pub mod model {
    pub use parley_core::model::*;
}

pub mod sdp {
    pub use parley_core::sdp::*;
}

pub mod validate {
    pub use parley_core::validate::*;
}

#[cfg(feature = "client")]
pub mod client {
    pub use parley_client::*;
}
