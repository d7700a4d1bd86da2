use crate::peer::MediaSink;
use crate::transport::TransportFactory;
use parley_core::IceServerConfig;
use std::fmt;
use std::sync::Arc;

/// What [`SessionDirectory::get_room`](crate::SessionDirectory::get_room)
/// needs to build a room handle.
#[derive(Clone)]
pub struct RoomOptions {
    pub room_id: String,

    /// `None` selects the default public STUN server.
    pub ice_servers: Option<Vec<IceServerConfig>>,

    /// `None` selects the webrtc-rs transport.
    pub transport_factory: Option<Arc<dyn TransportFactory>>,

    /// Destination of relayed data-channel media. `None` keeps it in memory.
    pub media_sink: Option<Arc<dyn MediaSink>>,
}

impl RoomOptions {
    pub fn new(room_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            ice_servers: None,
            transport_factory: None,
            media_sink: None,
        }
    }

    pub fn with_ice_servers(mut self, servers: Vec<IceServerConfig>) -> Self {
        self.ice_servers = Some(servers);
        self
    }

    pub fn with_transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.transport_factory = Some(factory);
        self
    }

    pub fn with_media_sink(mut self, sink: Arc<dyn MediaSink>) -> Self {
        self.media_sink = Some(sink);
        self
    }
}

impl fmt::Debug for RoomOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomOptions")
            .field("room_id", &self.room_id)
            .field("ice_servers", &self.ice_servers)
            .field("custom_transport", &self.transport_factory.is_some())
            .field("custom_media_sink", &self.media_sink.is_some())
            .finish()
    }
}
