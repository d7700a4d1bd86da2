use crate::error::{Error, Result};
use crate::peer::peer_session::SessionId;
use crate::peer::session_command::SessionCommand;
use crate::peer::session_variant::SessionVariant;
use crate::peer::{MediaHandle, NegotiationState, PeerKind, TrackHandler};
use crate::room::{SubscriptionId, WeakRoom};
use crate::transport::{PeerTransport, SignalingState, TransportEvent};
use parley_core::sdp;
use parley_core::{IceCandidate, MessageType, ProtocolMessage, SdpType, SessionDescription};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace, warn};

/// The actor behind a [`PeerSession`](crate::PeerSession) handle.
///
/// All negotiation steps for one peer run here, one at a time, so a remote
/// offer can never interleave with a local one half-way through.
pub(crate) struct Negotiator {
    pub(crate) id: SessionId,
    pub(crate) target: String,
    pub(crate) room: WeakRoom,
    pub(crate) transport: Arc<dyn PeerTransport>,
    pub(crate) variant: SessionVariant,
    pub(crate) state_tx: watch::Sender<NegotiationState>,
    pub(crate) media_tx: watch::Sender<Option<MediaHandle>>,
    pub(crate) ceiling_tx: watch::Sender<Option<u64>>,
    pub(crate) subscriptions: Vec<SubscriptionId>,
    pub(crate) track_handler: Option<TrackHandler>,
    pub(crate) event_rx: mpsc::UnboundedReceiver<TransportEvent>,
    pub(crate) command_rx: mpsc::UnboundedReceiver<SessionCommand>,
}

impl Negotiator {
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => self.close("every handle dropped").await,
                },
                event = self.event_rx.recv() => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => self.close("transport went away").await,
                },
            }

            if self.is_closed() {
                break;
            }
        }
        debug!("Session actor for {} stopped", self.target);
    }

    fn is_closed(&self) -> bool {
        self.state_tx.borrow().is_closed()
    }

    fn set_state(&self, state: NegotiationState) {
        self.state_tx.send_if_modified(|current| {
            if current.is_closed() || *current == state {
                return false;
            }
            trace!("Session with {}: {} -> {}", self.target, current, state);
            *current = state;
            true
        });
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::RemoteOffer(offer) => self.handle_remote_offer(offer).await,
            SessionCommand::RemoteAnswer(answer) => self.handle_remote_answer(answer).await,
            SessionCommand::RemoteCandidate(candidate) => {
                self.handle_remote_candidate(candidate).await
            }
            SessionCommand::Answer(reply) => {
                let _ = reply.send(self.answer().await);
            }
            SessionCommand::PreAnswer(reply) => {
                let _ = reply.send(self.pre_answer().await);
            }
            SessionCommand::Confirm(reply) => {
                let _ = reply.send(self.confirm().await);
            }
            SessionCommand::AddTrack { track, reply } => {
                let result = if self.variant.kind() == PeerKind::Video {
                    self.transport.add_track(track).await.map_err(Error::from)
                } else {
                    Err(Error::Unsupported("adding a media track"))
                };
                let _ = reply.send(result);
            }
            SessionCommand::SetBandwidth { kbps, reply } => {
                let result = if self.variant.set_bandwidth_kbps(kbps) {
                    debug!("Bandwidth for {} capped at {} kbps", self.target, kbps);
                    Ok(())
                } else {
                    Err(Error::Unsupported("a bandwidth cap"))
                };
                let _ = reply.send(result);
            }
            SessionCommand::OpenChannel { label, reply } => {
                let result = if self.variant.relay_mut().is_some() {
                    self.transport
                        .create_data_channel(&label)
                        .await
                        .map_err(Error::from)
                } else {
                    Err(Error::Unsupported("a data channel"))
                };
                let _ = reply.send(result);
            }
            SessionCommand::SendFrame { data, reply } => {
                let result = if self.variant.relay_mut().is_some() {
                    self.transport.send_data(data).await.map_err(Error::from)
                } else {
                    Err(Error::Unsupported("data frames"))
                };
                let _ = reply.send(result);
            }
            SessionCommand::SetTrackHandler(handler) => {
                self.track_handler = Some(handler);
            }
            SessionCommand::Close(ack) => {
                self.close("closed by owner").await;
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::NegotiationNeeded => self.negotiate().await,
            TransportEvent::CandidateGenerated(candidate) => {
                self.send_to_peer(MessageType::NewIceCandidate, json!(candidate));
            }
            TransportEvent::ConnectionStateChanged(state) => {
                debug!("Connection to {} is {:?}", self.target, state);
                if state.is_terminal() {
                    self.close("connection ended").await;
                }
            }
            TransportEvent::SignalingStateChanged(state) => {
                trace!("Signaling with {} is {}", self.target, state);
                if state == SignalingState::Closed {
                    self.close("signaling closed").await;
                }
            }
            TransportEvent::DataChannelOpened(label) => {
                if let Some(relay) = self.variant.relay_mut() {
                    let handle = relay.attach();
                    info!(
                        "Data channel '{}' with {} open, relaying into {}",
                        label, self.target, handle
                    );
                    let _ = self.media_tx.send(Some(handle));
                }
            }
            TransportEvent::DataChannelMessage(chunk) => {
                if let Some(relay) = self.variant.relay_mut() {
                    if !relay.append(chunk) {
                        trace!("Dropping data from {} with no buffer attached", self.target);
                    }
                }
            }
            TransportEvent::Track(track) => match &self.track_handler {
                Some(handler) => handler(track),
                None => debug!("Unhandled remote track from {}", self.target),
            },
        }
    }

    /// Local side wants to (re)negotiate: offer, but only from a stable state.
    async fn negotiate(&mut self) {
        if self.is_closed() {
            return;
        }
        if self.transport.signaling_state() != SignalingState::Stable {
            debug!("Skipping negotiation with {}: not stable", self.target);
            return;
        }

        let offer = match self.transport.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                warn!("Failed to create offer for {}: {:#}", self.target, e);
                return;
            }
        };

        // A remote offer may have been committed while the offer was built.
        if self.transport.signaling_state() != SignalingState::Stable {
            debug!("Dropping offer for {}: state moved on", self.target);
            return;
        }

        if let Err(e) = self.transport.set_local_description(offer.clone()).await {
            warn!("Failed to commit offer for {}: {:#}", self.target, e);
            return;
        }
        self.set_state(NegotiationState::Negotiating);

        let sent = self.transport.local_description().await.unwrap_or(offer);
        self.send_to_peer(self.variant.kind().offer_type(), json!(sent));
    }

    async fn handle_remote_offer(&mut self, offer: SessionDescription) {
        if self.is_closed() {
            return;
        }

        // Not answered yet: the newer offer simply replaces the waiting one.
        if let SessionVariant::VideoAnswer { pending_offer, .. }
        | SessionVariant::DataAnswer { pending_offer, .. } = &mut self.variant
        {
            if pending_offer.is_some() {
                debug!("Replacing unanswered offer from {}", self.target);
                *pending_offer = Some(offer);
                return;
            }
        }

        if let Err(e) = self.commit_remote_offer(offer).await {
            warn!("Failed to take offer from {}: {}", self.target, e);
            return;
        }
        if let Err(e) = self.send_final_answer().await {
            warn!("Failed to answer {}: {}", self.target, e);
        }
    }

    /// Commit a remote offer, rolling back our own uncommitted offer if the
    /// two crossed.
    async fn commit_remote_offer(&mut self, offer: SessionDescription) -> Result<()> {
        if self.transport.signaling_state() == SignalingState::Stable {
            self.transport.set_remote_description(offer).await?;
            self.set_state(NegotiationState::Negotiating);
            return Ok(());
        }

        info!("Offer from {} crossed ours, rolling back", self.target);
        self.set_state(NegotiationState::RollingBack);
        let rollback = self
            .transport
            .set_local_description(SessionDescription::rollback());
        let commit = self.transport.set_remote_description(offer);
        let joined = tokio::try_join!(rollback, commit);
        if let Err(e) = joined {
            self.close("rollback failed").await;
            return Err(e.into());
        }
        self.set_state(NegotiationState::Negotiating);
        Ok(())
    }

    async fn send_final_answer(&mut self) -> Result<()> {
        let answer = self.transport.create_answer().await?;
        self.transport.set_local_description(answer.clone()).await?;
        let sent = self.transport.local_description().await.unwrap_or(answer);
        self.send_to_peer(self.variant.kind().answer_type(), json!(sent));
        self.set_state(NegotiationState::Stable);
        Ok(())
    }

    async fn answer(&mut self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        let offer = self
            .variant
            .take_pending_offer()
            .ok_or(Error::NoPendingOffer)?;
        self.commit_remote_offer(offer).await?;
        self.send_final_answer().await
    }

    async fn pre_answer(&mut self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        if !self.variant.capabilities().pre_answer {
            return Err(Error::Unsupported("a provisional answer"));
        }
        let offer = self
            .variant
            .take_pending_offer()
            .ok_or(Error::NoPendingOffer)?;
        self.commit_remote_offer(offer).await?;

        self.transport.withhold_receive().await?;
        let answer = self.transport.create_answer().await?;
        // Sections the transport already withheld come back unchanged.
        let (withheld_sdp, sections) = sdp::withhold_receive(&answer.sdp);
        let provisional = SessionDescription::pranswer(withheld_sdp);
        self.transport
            .set_local_description(provisional.clone())
            .await?;

        if let SessionVariant::VideoAnswer { withheld, .. } = &mut self.variant {
            *withheld = Some(sections);
        }
        info!("Sent provisional answer to {}", self.target);
        self.send_to_peer(self.variant.kind().answer_type(), json!(provisional));
        Ok(())
    }

    async fn confirm(&mut self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        let sections = match &mut self.variant {
            SessionVariant::VideoAnswer { withheld, .. } => {
                withheld.take().ok_or(Error::NotProvisional)?
            }
            _ => return Err(Error::Unsupported("confirming a provisional answer")),
        };

        self.transport.restore_receive().await?;
        let answer = self.transport.create_answer().await?;
        let restored = SessionDescription::answer(sdp::restore_receive(&answer.sdp, &sections));
        self.transport.set_local_description(restored.clone()).await?;

        info!("Confirmed answer to {}", self.target);
        self.send_to_peer(self.variant.kind().answer_type(), json!(restored));
        self.set_state(NegotiationState::Stable);
        Ok(())
    }

    async fn handle_remote_answer(&mut self, answer: SessionDescription) {
        if self.is_closed() {
            return;
        }
        match self.transport.signaling_state() {
            SignalingState::HaveLocalOffer | SignalingState::HaveRemotePranswer => {}
            state => {
                debug!(
                    "Ignoring {:?} from {} in state {}",
                    answer.sdp_type, self.target, state
                );
                return;
            }
        }

        let is_final = answer.sdp_type == SdpType::Answer;
        if let Err(e) = self.transport.set_remote_description(answer).await {
            warn!("Failed to commit answer from {}: {:#}", self.target, e);
            return;
        }
        if !is_final {
            debug!("Provisional answer from {} committed", self.target);
            return;
        }

        if let Some(kbps) = self.variant.bandwidth_kbps() {
            let bits_per_second = u64::from(kbps) * 1000;
            match self.transport.set_sender_max_bitrate(bits_per_second).await {
                Ok(()) => {
                    self.ceiling_tx
                        .send_replace(self.transport.sender_max_bitrate());
                }
                Err(e) => warn!("Failed to cap bitrate for {}: {:#}", self.target, e),
            }
        }
        self.set_state(NegotiationState::Stable);
    }

    async fn handle_remote_candidate(&mut self, candidate: IceCandidate) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.transport.add_ice_candidate(candidate).await {
            warn!("Failed to add candidate from {}: {:#}", self.target, e);
            self.close("candidate rejected").await;
        }
    }

    fn send_to_peer(&self, kind: MessageType, payload: serde_json::Value) {
        let Some(room) = self.room.upgrade() else {
            trace!("Room gone, dropping {} for {}", kind, self.target);
            return;
        };
        let name = room.self_name();
        room.send(&ProtocolMessage::directed(kind, &name, &self.target, payload));
    }

    async fn close(&mut self, reason: &str) {
        if self.is_closed() {
            return;
        }
        info!("Closing session with {}: {}", self.target, reason);

        let subscriptions: Vec<_> = self.subscriptions.drain(..).collect();
        if let Some(room) = self.room.upgrade() {
            for id in subscriptions {
                room.off(id);
            }
            room.unregister_session(&self.target, self.variant.kind(), self.id);
        }
        self.track_handler = None;

        self.transport.stop_transceivers().await;
        if let Err(e) = self.transport.close().await {
            debug!("Error closing transport to {}: {:#}", self.target, e);
        }

        if let Some(relay) = self.variant.relay_mut() {
            relay.release();
        }
        let _ = self.media_tx.send(None);
        self.state_tx.send_replace(NegotiationState::Closed);
    }
}
