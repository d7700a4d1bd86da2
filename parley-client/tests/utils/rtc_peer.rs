use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::api::media_engine::MIME_TYPE_VP8;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use parley_client::{PeerTransport, RtcTransport, SignalingState, TransportConfig, TransportEvent};
use parley_core::{IceCandidate, SessionDescription};

/// A real webrtc-rs transport with host candidates only, for loopback tests
/// that exchange descriptions by hand.
pub struct RtcPeer {
    pub transport: RtcTransport,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

impl RtcPeer {
    pub async fn new(target: &str) -> Self {
        let (event_tx, events) = mpsc::unbounded_channel();
        let config = TransportConfig {
            ice_servers: Vec::new(),
        };
        let transport = RtcTransport::new(target.to_owned(), config, event_tx)
            .await
            .expect("Failed to create transport");
        Self { transport, events }
    }

    pub async fn with_video(target: &str) -> Self {
        let peer = Self::new(target).await;
        peer.transport
            .add_track(video_track(target))
            .await
            .expect("Failed to add track");
        peer
    }

    pub fn state(&self) -> SignalingState {
        self.transport.signaling_state()
    }

    /// Create an offer and commit it locally.
    pub async fn offer(&self) -> SessionDescription {
        let offer = self.transport.create_offer().await.expect("Failed to create offer");
        self.transport
            .set_local_description(offer.clone())
            .await
            .expect("Failed to commit offer");
        offer
    }
}

pub fn video_track(id: &str) -> Arc<dyn TrackLocal + Send + Sync> {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_VP8.to_owned(),
            ..Default::default()
        },
        format!("video-{id}"),
        "parley".to_owned(),
    ))
}

pub fn host_candidate() -> IceCandidate {
    IceCandidate {
        candidate: "candidate:1 1 udp 2130706431 127.0.0.1 50000 typ host".to_owned(),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
        username_fragment: None,
    }
}
