use crate::error::{Error, Result};
use crate::peer::negotiator::Negotiator;
use crate::peer::session_command::{Reply, SessionCommand};
use crate::peer::session_variant::SessionVariant;
use crate::peer::{Capabilities, MediaHandle, MediaRelay, NegotiationState, PeerKind, Role};
use crate::room::{EventType, Room, RoomEvent, SubscriptionId};
use bytes::Bytes;
use parley_core::{IceCandidate, SessionDescription};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};
use uuid::Uuid;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Called with every remote media track a video session receives.
pub type TrackHandler = Arc<dyn Fn(Arc<TrackRemote>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SessionId(Uuid);

/// Handle to one negotiation with one remote peer.
///
/// Cloning is cheap; every clone drives the same session. The session runs
/// as its own task and keeps running until [`close`](Self::close) is called
/// or the connection fails.
#[derive(Clone)]
pub struct PeerSession {
    id: SessionId,
    target: Arc<str>,
    kind: PeerKind,
    role: Role,
    capabilities: Capabilities,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<NegotiationState>,
    media: watch::Receiver<Option<MediaHandle>>,
    ceiling: watch::Receiver<Option<u64>>,
}

impl PeerSession {
    pub(crate) async fn offerer(room: &Room, target: &str, kind: PeerKind) -> Result<Self> {
        let variant = match kind {
            PeerKind::Video => SessionVariant::VideoOffer {
                bandwidth_kbps: None,
            },
            PeerKind::Data => SessionVariant::DataOffer {
                bandwidth_kbps: None,
                relay: MediaRelay::new(room.media_sink()),
            },
        };
        Self::spawn(room, target, variant).await
    }

    /// Session for a remote offer that waits for the application to answer.
    pub(crate) async fn answerer(
        room: &Room,
        target: &str,
        kind: PeerKind,
        offer: SessionDescription,
    ) -> Result<Self> {
        let variant = match kind {
            PeerKind::Video => SessionVariant::VideoAnswer {
                pending_offer: Some(offer),
                withheld: None,
            },
            PeerKind::Data => SessionVariant::DataAnswer {
                pending_offer: Some(offer),
                relay: MediaRelay::new(room.media_sink()),
            },
        };
        Self::spawn(room, target, variant).await
    }

    async fn spawn(room: &Room, target: &str, variant: SessionVariant) -> Result<Self> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let transport = room
            .transport_factory()
            .create(target, room.transport_config(), event_tx)
            .await?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(NegotiationState::New);
        let (media_tx, media_rx) = watch::channel(None);
        let (ceiling_tx, ceiling_rx) = watch::channel(None);

        let kind = variant.kind();
        let session = PeerSession {
            id: SessionId(Uuid::new_v4()),
            target: Arc::from(target),
            kind,
            role: variant.role(),
            capabilities: variant.capabilities(),
            commands: command_tx.clone(),
            state: state_rx,
            media: media_rx,
            ceiling: ceiling_rx,
        };

        let subscriptions = subscribe(room, target, kind, command_tx);
        debug!(
            "Spawned {} {:?} session with {}",
            kind, session.role, target
        );

        let negotiator = Negotiator {
            id: session.id,
            target: target.to_owned(),
            room: room.downgrade(),
            transport,
            variant,
            state_tx,
            media_tx,
            ceiling_tx,
            subscriptions,
            track_handler: None,
            event_rx,
            command_rx,
        };
        tokio::spawn(negotiator.run());

        Ok(session)
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> PeerKind {
        self.kind
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn state(&self) -> NegotiationState {
        *self.state.borrow()
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    pub fn state_changes(&self) -> watch::Receiver<NegotiationState> {
        self.state.clone()
    }

    /// Wait until the session reaches `state`. Fails if it closes first.
    pub async fn wait_for_state(&self, state: NegotiationState) -> Result<()> {
        let mut rx = self.state.clone();
        let reached = {
            let current = rx
                .wait_for(|s| *s == state || s.is_closed())
                .await
                .map_err(|_| Error::SessionClosed)?;
            *current == state
        };
        if reached {
            Ok(())
        } else {
            Err(Error::SessionClosed)
        }
    }

    /// Buffer currently receiving relayed data-channel media.
    pub fn media_handle(&self) -> Option<MediaHandle> {
        *self.media.borrow()
    }

    pub fn media_changes(&self) -> watch::Receiver<Option<MediaHandle>> {
        self.media.clone()
    }

    /// Outbound encoding ceiling in bits per second, once a bandwidth cap
    /// has been applied after a final answer.
    pub fn bitrate_ceiling(&self) -> Option<u64> {
        *self.ceiling.borrow()
    }

    /// Commit the waiting remote offer and send the final answer.
    pub async fn answer(&self) -> Result<()> {
        self.request(SessionCommand::Answer).await
    }

    /// Send a provisional answer that reserves media without receiving it.
    pub async fn pre_answer(&self) -> Result<()> {
        self.request(SessionCommand::PreAnswer).await
    }

    /// Turn an earlier provisional answer into the final one.
    pub async fn confirm(&self) -> Result<()> {
        self.request(SessionCommand::Confirm).await
    }

    pub async fn add_track(&self, track: Arc<dyn TrackLocal + Send + Sync>) -> Result<()> {
        self.request(|reply| SessionCommand::AddTrack { track, reply })
            .await
    }

    /// Cap outbound bitrate. Applied after the next final answer commits.
    pub async fn set_bandwidth(&self, kbps: u32) -> Result<()> {
        self.request(|reply| SessionCommand::SetBandwidth { kbps, reply })
            .await
    }

    pub async fn open_channel(&self, label: &str) -> Result<()> {
        let label = label.to_owned();
        self.request(|reply| SessionCommand::OpenChannel { label, reply })
            .await
    }

    pub async fn send_frame(&self, data: Bytes) -> Result<()> {
        self.request(|reply| SessionCommand::SendFrame { data, reply })
            .await
    }

    pub fn on_track<F>(&self, handler: F) -> Result<()>
    where
        F: Fn(Arc<TrackRemote>) + Send + Sync + 'static,
    {
        self.commands
            .send(SessionCommand::SetTrackHandler(Arc::new(handler)))
            .map_err(|_| Error::SessionClosed)
    }

    /// Tear the session down. Closing an already closed session is a no-op.
    pub async fn close(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(SessionCommand::Close(Some(tx))).is_ok() {
            let _ = rx.await;
        }
    }

    pub(crate) fn deliver_offer(&self, offer: SessionDescription) -> bool {
        self.commands
            .send(SessionCommand::RemoteOffer(offer))
            .is_ok()
    }

    async fn request<F>(&self, command: F) -> Result<()>
    where
        F: FnOnce(Reply) -> SessionCommand,
    {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .map_err(|_| Error::SessionClosed)?;
        rx.await.map_err(|_| Error::SessionClosed)?
    }
}

impl fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerSession")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

/// Route this peer's answers and candidates from the room bus into the actor.
fn subscribe(
    room: &Room,
    target: &str,
    kind: PeerKind,
    commands: mpsc::UnboundedSender<SessionCommand>,
) -> Vec<SubscriptionId> {
    let answer_event = match kind {
        PeerKind::Video => EventType::VideoAnswer,
        PeerKind::Data => EventType::DataAnswer,
    };

    let answers = {
        let target = target.to_owned();
        let commands = commands.clone();
        room.on(answer_event, move |event| {
            let Some(message) = event.message().filter(|m| m.is_from(&target)) else {
                return;
            };
            match message.payload_as::<SessionDescription>() {
                Ok(desc) => {
                    let _ = commands.send(SessionCommand::RemoteAnswer(desc));
                }
                Err(e) => warn!("Malformed answer from {}: {}", target, e),
            }
        })
    };

    let candidates = {
        let target = target.to_owned();
        room.on(EventType::NewIceCandidate, move |event| {
            let RoomEvent::NewIceCandidate(message) = event else {
                return;
            };
            if !message.is_from(&target) {
                return;
            }
            match message.payload_as::<IceCandidate>() {
                Ok(candidate) => {
                    let _ = commands.send(SessionCommand::RemoteCandidate(candidate));
                }
                Err(e) => warn!("Malformed candidate from {}: {}", target, e),
            }
        })
    };

    vec![answers, candidates]
}
