use crate::transport::{
    ConnectionState, PeerTransport, SignalingState, TransportConfig, TransportEvent,
    TransportFactory,
};
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use parley_core::{IceCandidate, SdpType, SessionDescription};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::track::track_local::TrackLocal;

type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

/// [`PeerTransport`] backed by a webrtc-rs peer connection.
///
/// webrtc-rs cannot roll a local offer back, so a rollback replaces the
/// peer connection with a fresh one carrying the same local tracks and
/// outbound channel. Callbacks of a replaced connection are muted.
pub struct RtcTransport {
    target: String,
    rtc_config: RTCConfiguration,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    generation: Arc<AtomicU64>,
    peer_connection: RwLock<Arc<RTCPeerConnection>>,
    local_tracks: Mutex<Vec<LocalTrack>>,
    outbound_channel: Mutex<Option<Arc<RTCDataChannel>>>,
    pending_candidates: Mutex<Vec<RTCIceCandidateInit>>,
    withheld: Mutex<Vec<(Arc<RTCRtpTransceiver>, RTCRtpTransceiverDirection)>>,
    /// Description commits apply in call order, as in a browser's
    /// operations chain. A rollback issued alongside a remote offer relies
    /// on it.
    description_chain: Mutex<()>,
    // webrtc-rs has no encoding-parameter setter, so the ceiling is kept here
    // for the application's encoder to honour.
    max_bitrate: AtomicU64,
}

/// Forwards callbacks of one peer connection, until that connection is
/// replaced.
#[derive(Clone)]
struct EventSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
    generation: Arc<AtomicU64>,
    id: u64,
}

impl EventSink {
    fn new(tx: mpsc::UnboundedSender<TransportEvent>, generation: Arc<AtomicU64>) -> Self {
        let id = generation.load(Ordering::Acquire);
        Self { tx, generation, id }
    }

    fn emit(&self, event: TransportEvent) {
        if self.generation.load(Ordering::Acquire) != self.id {
            return;
        }
        let _ = self.tx.send(event);
    }
}

impl RtcTransport {
    /// Build the peer connection and wire its callbacks into `event_tx`.
    pub async fn new(
        target: String,
        config: TransportConfig,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Self> {
        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let generation = Arc::new(AtomicU64::new(0));
        let sink = EventSink::new(event_tx.clone(), generation.clone());
        let peer_connection = open_peer_connection(&target, rtc_config.clone(), sink).await?;

        Ok(Self {
            target,
            rtc_config,
            event_tx,
            generation,
            peer_connection: RwLock::new(peer_connection),
            local_tracks: Mutex::new(Vec::new()),
            outbound_channel: Mutex::new(None),
            pending_candidates: Mutex::new(Vec::new()),
            withheld: Mutex::new(Vec::new()),
            description_chain: Mutex::new(()),
            max_bitrate: AtomicU64::new(0),
        })
    }

    fn peer_connection(&self) -> Arc<RTCPeerConnection> {
        self.peer_connection.read().clone()
    }

    async fn rollback(&self) -> Result<()> {
        let stale = self.peer_connection();
        if stale.signaling_state() != RTCSignalingState::HaveLocalOffer {
            bail!("no local offer to roll back towards {}", self.target);
        }

        self.generation.fetch_add(1, Ordering::AcqRel);
        let sink = EventSink::new(self.event_tx.clone(), self.generation.clone());
        let fresh = open_peer_connection(&self.target, self.rtc_config.clone(), sink).await?;

        for track in self.local_tracks.lock().await.iter() {
            attach_track(&fresh, track.clone()).await?;
        }
        {
            let mut outbound = self.outbound_channel.lock().await;
            if let Some(channel) = outbound.as_ref() {
                let label = channel.label().to_owned();
                *outbound = Some(fresh.create_data_channel(&label, None).await?);
            }
        }
        self.withheld.lock().await.clear();
        *self.peer_connection.write() = fresh;

        detach_handlers(&stale);
        if let Err(e) = stale.close().await {
            debug!("Closing rolled back connection to {} failed: {:?}", self.target, e);
        }
        info!("Rolled back local offer towards {}", self.target);
        Ok(())
    }

    async fn flush_pending_candidates(&self, pc: &RTCPeerConnection) {
        let pending: Vec<_> = self.pending_candidates.lock().await.drain(..).collect();
        for candidate in pending {
            if let Err(e) = pc.add_ice_candidate(candidate).await {
                warn!("Dropping queued ICE candidate for {}: {:?}", self.target, e);
            }
        }
    }
}

async fn open_peer_connection(
    target: &str,
    rtc_config: RTCConfiguration,
    sink: EventSink,
) -> Result<Arc<RTCPeerConnection>> {
    let mut m = MediaEngine::default();
    m.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut m)?;

    let api = APIBuilder::new()
        .with_media_engine(m)
        .with_interceptor_registry(registry)
        .build();

    let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

    let state_sink = sink.clone();
    let state_target = target.to_owned();
    peer_connection.on_peer_connection_state_change(Box::new(
        move |s: RTCPeerConnectionState| {
            info!("Peer connection state changed for {}: {:?}", state_target, s);
            if let Some(state) = map_connection_state(s) {
                state_sink.emit(TransportEvent::ConnectionStateChanged(state));
            }
            Box::pin(async {})
        },
    ));

    let signaling_sink = sink.clone();
    peer_connection.on_signaling_state_change(Box::new(move |s: RTCSignalingState| {
        if let Some(state) = map_signaling_state(s) {
            signaling_sink.emit(TransportEvent::SignalingStateChanged(state));
        }
        Box::pin(async {})
    }));

    let negotiation_sink = sink.clone();
    peer_connection.on_negotiation_needed(Box::new(move || {
        negotiation_sink.emit(TransportEvent::NegotiationNeeded);
        Box::pin(async {})
    }));

    let ice_sink = sink.clone();
    peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
        if let Some(init) = c.and_then(|candidate| candidate.to_json().ok()) {
            ice_sink.emit(TransportEvent::CandidateGenerated(IceCandidate {
                candidate: init.candidate,
                sdp_mid: init.sdp_mid,
                sdp_m_line_index: init.sdp_mline_index,
                username_fragment: init.username_fragment,
            }));
        }
        Box::pin(async {})
    }));

    let dc_sink = sink.clone();
    let dc_target = target.to_owned();
    peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
        let sink = dc_sink.clone();
        let target = dc_target.clone();

        Box::pin(async move {
            debug!("Inbound data channel '{}' from {}", dc.label(), target);

            let open_sink = sink.clone();
            let label = dc.label().to_owned();
            dc.on_open(Box::new(move || {
                open_sink.emit(TransportEvent::DataChannelOpened(label.clone()));
                Box::pin(async {})
            }));

            dc.on_message(Box::new(move |msg: DataChannelMessage| {
                sink.emit(TransportEvent::DataChannelMessage(msg.data));
                Box::pin(async {})
            }));
        })
    }));

    peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
        sink.emit(TransportEvent::Track(track));
        Box::pin(async {})
    }));

    Ok(peer_connection)
}

fn detach_handlers(pc: &RTCPeerConnection) {
    pc.on_peer_connection_state_change(Box::new(|_| Box::pin(async {})));
    pc.on_signaling_state_change(Box::new(|_| Box::pin(async {})));
    pc.on_negotiation_needed(Box::new(|| Box::pin(async {})));
    pc.on_ice_candidate(Box::new(|_| Box::pin(async {})));
    pc.on_data_channel(Box::new(|_| Box::pin(async {})));
    pc.on_track(Box::new(|_, _, _| Box::pin(async {})));
}

async fn attach_track(pc: &RTCPeerConnection, track: LocalTrack) -> Result<()> {
    let sender = pc.add_track(track).await?;

    // RTCP has to be drained for interceptors such as NACK to work.
    tokio::spawn(async move {
        let mut buf = vec![0u8; 1500];
        while sender.read(&mut buf).await.is_ok() {}
    });
    Ok(())
}

#[async_trait]
impl PeerTransport for RtcTransport {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection().create_offer(None).await?;
        from_rtc(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection().create_answer(None).await?;
        from_rtc(answer)
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let _chain = self.description_chain.lock().await;
        if desc.sdp_type == SdpType::Rollback {
            return self.rollback().await;
        }
        self.peer_connection()
            .set_local_description(to_rtc(desc)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let _chain = self.description_chain.lock().await;
        let pc = self.peer_connection();
        pc.set_remote_description(to_rtc(desc)?).await?;
        self.flush_pending_candidates(&pc).await;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let desc = self.peer_connection().local_description().await?;
        from_rtc(desc).ok()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };

        let pc = self.peer_connection();
        if pc.remote_description().await.is_none() {
            self.pending_candidates.lock().await.push(init);
            return Ok(());
        }
        pc.add_ice_candidate(init).await?;
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        map_signaling_state(self.peer_connection().signaling_state())
            .unwrap_or(SignalingState::Stable)
    }

    async fn add_track(&self, track: Arc<dyn TrackLocal + Send + Sync>) -> Result<()> {
        attach_track(&self.peer_connection(), track.clone()).await?;
        self.local_tracks.lock().await.push(track);
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<()> {
        let channel = self
            .peer_connection()
            .create_data_channel(label, None)
            .await?;
        *self.outbound_channel.lock().await = Some(channel);
        Ok(())
    }

    async fn send_data(&self, data: Bytes) -> Result<()> {
        let guard = self.outbound_channel.lock().await;
        let channel = guard
            .as_ref()
            .ok_or_else(|| anyhow!("no outbound data channel towards {}", self.target))?;
        channel.send(&data).await?;
        Ok(())
    }

    async fn set_sender_max_bitrate(&self, bits_per_second: u64) -> Result<()> {
        if self.peer_connection().get_senders().await.is_empty() {
            bail!("no outbound sender towards {}", self.target);
        }
        self.max_bitrate.store(bits_per_second, Ordering::Release);
        debug!(
            "Sender ceiling for {} set to {} bps",
            self.target, bits_per_second
        );
        Ok(())
    }

    fn sender_max_bitrate(&self) -> Option<u64> {
        match self.max_bitrate.load(Ordering::Acquire) {
            0 => None,
            bps => Some(bps),
        }
    }

    async fn withhold_receive(&self) -> Result<()> {
        let mut withheld = self.withheld.lock().await;
        for transceiver in self.peer_connection().get_transceivers().await {
            let direction = transceiver.direction();
            let reduced = match direction {
                RTCRtpTransceiverDirection::Sendrecv => RTCRtpTransceiverDirection::Sendonly,
                RTCRtpTransceiverDirection::Recvonly => RTCRtpTransceiverDirection::Inactive,
                _ => continue,
            };
            transceiver.set_direction(reduced).await;
            withheld.push((transceiver, direction));
        }
        debug!(
            "Withholding receive on {} transceivers towards {}",
            withheld.len(),
            self.target
        );
        Ok(())
    }

    async fn restore_receive(&self) -> Result<()> {
        for (transceiver, direction) in self.withheld.lock().await.drain(..) {
            transceiver.set_direction(direction).await;
        }
        Ok(())
    }

    async fn stop_transceivers(&self) {
        for transceiver in self.peer_connection().get_transceivers().await {
            if let Err(e) = transceiver.stop().await {
                debug!("Transceiver stop for {} failed: {:?}", self.target, e);
            }
        }
    }

    async fn close(&self) -> Result<()> {
        let pc = self.peer_connection();
        detach_handlers(&pc);
        pc.close().await.context("Failed to close peer connection")?;
        Ok(())
    }
}

/// Default factory: one webrtc-rs peer connection per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct RtcTransportFactory;

#[async_trait]
impl TransportFactory for RtcTransportFactory {
    async fn create(
        &self,
        target: &str,
        config: TransportConfig,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        let transport = RtcTransport::new(target.to_owned(), config, event_tx).await?;
        Ok(Arc::new(transport))
    }
}

fn to_rtc(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
        SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
        SdpType::Rollback => bail!("rollback is only valid as a local description"),
    };
    Ok(rtc)
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SessionDescription> {
    let sdp_type = match desc.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        RTCSdpType::Unspecified => bail!("unspecified session description type"),
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: desc.sdp,
    })
}

fn map_signaling_state(s: RTCSignalingState) -> Option<SignalingState> {
    match s {
        RTCSignalingState::Stable => Some(SignalingState::Stable),
        RTCSignalingState::HaveLocalOffer => Some(SignalingState::HaveLocalOffer),
        RTCSignalingState::HaveRemoteOffer => Some(SignalingState::HaveRemoteOffer),
        RTCSignalingState::HaveLocalPranswer => Some(SignalingState::HaveLocalPranswer),
        RTCSignalingState::HaveRemotePranswer => Some(SignalingState::HaveRemotePranswer),
        RTCSignalingState::Closed => Some(SignalingState::Closed),
        RTCSignalingState::Unspecified => None,
    }
}

fn map_connection_state(s: RTCPeerConnectionState) -> Option<ConnectionState> {
    match s {
        RTCPeerConnectionState::New => Some(ConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
        RTCPeerConnectionState::Unspecified => None,
    }
}
