use anyhow::{Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use parley_client::{
    PeerTransport, SignalingState, TransportConfig, TransportEvent, TransportFactory,
};
use parley_core::{IceCandidate, SdpType, SessionDescription};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use webrtc::track::track_local::TrackLocal;

/// Answer with one receive-only and one two-way media section.
pub const FAKE_ANSWER_SDP: &str = "v=0\r\n\
    o=- 2 2 IN IP4 127.0.0.1\r\n\
    s=-\r\n\
    m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n\
    a=mid:0\r\n\
    a=recvonly\r\n\
    m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
    a=mid:1\r\n\
    a=sendrecv\r\n";

pub const FAKE_OFFER_SDP: &str = "v=0\r\n\
    o=- 1 1 IN IP4 127.0.0.1\r\n\
    s=-\r\n\
    m=video 9 UDP/TLS/RTP/SAVPF 96\r\n\
    a=mid:0\r\n\
    a=sendrecv\r\n";

#[derive(Default)]
struct FakeState {
    /// Uncommitted local description type, if any.
    local: Option<SdpType>,
    /// Uncommitted remote description type, if any.
    remote: Option<SdpType>,
    local_description: Option<SessionDescription>,
    ops: Vec<String>,
    candidates: Vec<IceCandidate>,
    sent: Vec<Bytes>,
    channels: Vec<String>,
    tracks: usize,
    max_bitrate: Option<u64>,
    closed: bool,
}

/// Scripted [`PeerTransport`]: a signaling state machine without any
/// networking. Tests push transport events through [`FakeTransport::emit`].
pub struct FakeTransport {
    pub target: String,
    pub config: TransportConfig,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    state: Mutex<FakeState>,
    fail_candidates: AtomicBool,
}

impl FakeTransport {
    pub async fn emit(&self, event: TransportEvent) {
        self.event_tx
            .send(event)
            .expect("session stopped listening to its transport");
    }

    pub fn fail_candidates(&self) {
        self.fail_candidates.store(true, Ordering::SeqCst);
    }

    pub fn ops(&self) -> Vec<String> {
        self.state.lock().ops.clone()
    }

    pub fn op_count(&self, op: &str) -> usize {
        self.state.lock().ops.iter().filter(|o| *o == op).count()
    }

    pub fn candidates(&self) -> Vec<IceCandidate> {
        self.state.lock().candidates.clone()
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    pub fn channels(&self) -> Vec<String> {
        self.state.lock().channels.clone()
    }

    pub fn max_bitrate(&self) -> Option<u64> {
        self.state.lock().max_bitrate
    }

    fn record(&self, op: impl Into<String>) {
        self.state.lock().ops.push(op.into());
    }
}

fn type_name(t: SdpType) -> &'static str {
    match t {
        SdpType::Offer => "offer",
        SdpType::Pranswer => "pranswer",
        SdpType::Answer => "answer",
        SdpType::Rollback => "rollback",
    }
}

#[async_trait]
impl PeerTransport for FakeTransport {
    async fn create_offer(&self) -> Result<SessionDescription> {
        self.record("create_offer");
        Ok(SessionDescription::offer(FAKE_OFFER_SDP))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        self.record("create_answer");
        if self.state.lock().remote != Some(SdpType::Offer) {
            bail!("no remote offer to answer");
        }
        Ok(SessionDescription::answer(FAKE_ANSWER_SDP))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let mut state = self.state.lock();
        state.ops.push(format!("local:{}", type_name(desc.sdp_type)));
        match desc.sdp_type {
            SdpType::Offer => {
                if state.local.is_some() || state.remote.is_some() {
                    bail!("offer outside stable state");
                }
                state.local = Some(SdpType::Offer);
            }
            SdpType::Pranswer => {
                if state.remote != Some(SdpType::Offer) {
                    bail!("pranswer without remote offer");
                }
                state.local = Some(SdpType::Pranswer);
            }
            SdpType::Answer => {
                if state.remote != Some(SdpType::Offer) {
                    bail!("answer without remote offer");
                }
                state.local = None;
                state.remote = None;
            }
            SdpType::Rollback => {
                if state.local != Some(SdpType::Offer) {
                    bail!("nothing to roll back");
                }
                state.local = None;
                return Ok(());
            }
        }
        state.local_description = Some(desc);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let mut state = self.state.lock();
        state.ops.push(format!("remote:{}", type_name(desc.sdp_type)));
        match desc.sdp_type {
            // Accepted while a local offer is still pending: the rollback
            // issued alongside it clears that offer.
            SdpType::Offer => state.remote = Some(SdpType::Offer),
            SdpType::Pranswer => {
                if state.local != Some(SdpType::Offer) {
                    bail!("pranswer without local offer");
                }
                state.remote = Some(SdpType::Pranswer);
            }
            SdpType::Answer => {
                if state.local != Some(SdpType::Offer) {
                    bail!("answer without local offer");
                }
                state.local = None;
                state.remote = None;
            }
            SdpType::Rollback => bail!("remote rollback is not a thing"),
        }
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.state.lock().local_description.clone()
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        self.record("candidate");
        if self.fail_candidates.load(Ordering::SeqCst) {
            bail!("candidate rejected");
        }
        self.state.lock().candidates.push(candidate);
        Ok(())
    }

    fn signaling_state(&self) -> SignalingState {
        let state = self.state.lock();
        if state.closed {
            return SignalingState::Closed;
        }
        match (state.local, state.remote) {
            (None, None) => SignalingState::Stable,
            (Some(SdpType::Offer), None) => SignalingState::HaveLocalOffer,
            (Some(SdpType::Offer), Some(SdpType::Pranswer)) => SignalingState::HaveRemotePranswer,
            (Some(SdpType::Offer), Some(_)) => SignalingState::HaveLocalOffer,
            (Some(SdpType::Pranswer), _) => SignalingState::HaveLocalPranswer,
            (_, Some(_)) => SignalingState::HaveRemoteOffer,
            (Some(_), None) => SignalingState::Stable,
        }
    }

    async fn add_track(&self, _track: Arc<dyn TrackLocal + Send + Sync>) -> Result<()> {
        self.record("add_track");
        self.state.lock().tracks += 1;
        Ok(())
    }

    async fn create_data_channel(&self, label: &str) -> Result<()> {
        self.record("create_data_channel");
        self.state.lock().channels.push(label.to_owned());
        Ok(())
    }

    async fn send_data(&self, data: Bytes) -> Result<()> {
        let mut state = self.state.lock();
        if state.channels.is_empty() {
            bail!("no data channel open");
        }
        state.sent.push(data);
        Ok(())
    }

    async fn set_sender_max_bitrate(&self, bits_per_second: u64) -> Result<()> {
        self.record(format!("bitrate:{bits_per_second}"));
        self.state.lock().max_bitrate = Some(bits_per_second);
        Ok(())
    }

    fn sender_max_bitrate(&self) -> Option<u64> {
        self.state.lock().max_bitrate
    }

    async fn withhold_receive(&self) -> Result<()> {
        self.record("withhold_receive");
        Ok(())
    }

    async fn restore_receive(&self) -> Result<()> {
        self.record("restore_receive");
        Ok(())
    }

    async fn stop_transceivers(&self) {
        self.record("stop_transceivers");
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.ops.push("close".to_owned());
        state.closed = true;
        Ok(())
    }
}

/// Hands out [`FakeTransport`]s and keeps them for inspection.
#[derive(Default)]
pub struct FakeTransportFactory {
    created: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeTransportFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.created.lock().len()
    }

    /// The `index`-th transport created, waiting briefly for it to appear.
    pub async fn transport(&self, index: usize) -> Arc<FakeTransport> {
        for _ in 0..100 {
            if let Some(t) = self.created.lock().get(index) {
                return t.clone();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("transport {index} was never created");
    }
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn create(
        &self,
        target: &str,
        config: TransportConfig,
        event_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>> {
        let transport = Arc::new(FakeTransport {
            target: target.to_owned(),
            config,
            event_tx,
            state: Mutex::new(FakeState::default()),
            fail_candidates: AtomicBool::new(false),
        });
        self.created.lock().push(transport.clone());
        Ok(transport)
    }
}
