use crate::transport::{TransportConfig, TransportEvent};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parley_core::{IceCandidate, SessionDescription};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::track::track_local::TrackLocal;

/// Offer/answer commitment progress of a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
    HaveLocalPranswer,
    HaveRemotePranswer,
    Closed,
}

impl fmt::Display for SignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalingState::Stable => "stable",
            SignalingState::HaveLocalOffer => "have-local-offer",
            SignalingState::HaveRemoteOffer => "have-remote-offer",
            SignalingState::HaveLocalPranswer => "have-local-pranswer",
            SignalingState::HaveRemotePranswer => "have-remote-pranswer",
            SignalingState::Closed => "closed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl ConnectionState {
    /// States after which the connection is never used again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Failed | ConnectionState::Closed
        )
    }
}

/// The peer-connection engine a negotiation session drives.
///
/// ICE gathering, DTLS and media transport live behind this seam. The
/// implementation reports asynchronous happenings through the
/// [`TransportEvent`] channel it was created with.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    /// Commit a local description. A `rollback` description discards an
    /// uncommitted local offer and returns to `stable`, keeping local media.
    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn local_description(&self) -> Option<SessionDescription>;

    /// Apply a remote candidate. Candidates arriving before a remote
    /// description are held by the transport until one is committed.
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    fn signaling_state(&self) -> SignalingState;

    async fn add_track(&self, track: Arc<dyn TrackLocal + Send + Sync>) -> Result<()>;

    async fn create_data_channel(&self, label: &str) -> Result<()>;

    /// Send one binary frame on the outbound data channel.
    async fn send_data(&self, data: Bytes) -> Result<()>;

    /// Cap the first outbound sender's encoding bitrate.
    async fn set_sender_max_bitrate(&self, bits_per_second: u64) -> Result<()>;

    /// Encoding ceiling currently applied, in bits per second.
    fn sender_max_bitrate(&self) -> Option<u64>;

    /// Stop receiving on every receive-capable transceiver, so that the next
    /// answer created carries no receiving media section.
    async fn withhold_receive(&self) -> Result<()>;

    /// Undo [`withhold_receive`](Self::withhold_receive) before the final
    /// answer is created.
    async fn restore_receive(&self) -> Result<()>;

    async fn stop_transceivers(&self);

    /// Detach every callback and release the connection.
    async fn close(&self) -> Result<()>;
}

/// Builds one transport per negotiation session.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn create(
        &self,
        target: &str,
        config: TransportConfig,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>>;
}
