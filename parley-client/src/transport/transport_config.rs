use parley_core::{DEFAULT_STUN_ADDR, IceServerConfig};

/// Settings handed to every peer connection a room creates.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub ice_servers: Vec<IceServerConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![IceServerConfig::new(DEFAULT_STUN_ADDR)],
        }
    }
}
