pub mod fake_transport;
pub mod rtc_peer;

pub use event_recorder::*;
pub use fake_transport::*;
pub use mock_server::*;
pub use rtc_peer::*;
