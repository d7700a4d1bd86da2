use crate::error::{Error, Result};
use crate::peer::{MediaSink, MemoryMediaSink, PeerKind, PeerSession, SessionId};
use crate::room::pipe::PipeHandle;
use crate::room::{EventBus, EventType, RoomEvent, RoomOptions, SubscriptionId};
use crate::transport::{RtcTransportFactory, TransportConfig, TransportFactory};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use parley_core::validate::validate_user_name;
use parley_core::{ClientKey, JoinFrame, MessageType, ProtocolMessage, SessionDescription};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tracing::{debug, info, trace, warn};
use url::Url;

/// Client-side view of one room: its pipe, its member list and its events.
///
/// Cloning gives another handle to the same room.
#[derive(Clone)]
pub struct Room {
    inner: Arc<RoomInner>,
}

/// Non-owning room reference held by the sessions a room spawned, so that a
/// live session never keeps its room alive.
#[derive(Clone)]
pub(crate) struct WeakRoom(Weak<RoomInner>);

impl WeakRoom {
    pub(crate) fn upgrade(&self) -> Option<Room> {
        self.0.upgrade().map(|inner| Room { inner })
    }
}

pub(crate) struct RoomInner {
    room_id: String,
    pipe_url: Url,
    client_key: ClientKey,
    transport_config: TransportConfig,
    transport_factory: Arc<dyn TransportFactory>,
    media_sink: Arc<dyn MediaSink>,
    self_name: RwLock<String>,
    user_list: RwLock<Vec<String>>,
    bus: EventBus,
    pipe: Mutex<Option<PipeHandle>>,
    sessions: DashMap<(String, PeerKind), PeerSession>,
}

impl Room {
    pub(crate) fn new(pipe_url: Url, client_key: ClientKey, options: RoomOptions) -> Self {
        let transport_config = match options.ice_servers {
            Some(ice_servers) => TransportConfig { ice_servers },
            None => TransportConfig::default(),
        };
        let inner = RoomInner {
            room_id: options.room_id,
            pipe_url,
            client_key,
            transport_config,
            transport_factory: options
                .transport_factory
                .unwrap_or_else(|| Arc::new(RtcTransportFactory) as Arc<dyn TransportFactory>),
            media_sink: options
                .media_sink
                .unwrap_or_else(|| Arc::new(MemoryMediaSink::new()) as Arc<dyn MediaSink>),
            self_name: RwLock::new(String::new()),
            user_list: RwLock::new(Vec::new()),
            bus: EventBus::new(),
            pipe: Mutex::new(None),
            sessions: DashMap::new(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn room_id(&self) -> &str {
        &self.inner.room_id
    }

    /// Name this client joined under. Empty until the pipe has opened.
    pub fn self_name(&self) -> String {
        self.inner.self_name.read().clone()
    }

    pub fn user_list(&self) -> Vec<String> {
        self.inner.user_list.read().clone()
    }

    pub fn is_open(&self) -> bool {
        self.inner
            .pipe
            .lock()
            .as_ref()
            .is_some_and(PipeHandle::is_open)
    }

    /// Open a pipe to the room and join it as `name`.
    ///
    /// Any existing pipe is torn down first. Completion is reported through
    /// [`EventType::Open`].
    pub fn connect(&self, name: &str) -> Result<()> {
        if !validate_user_name(name) {
            return Err(Error::InvalidName(name.to_owned()));
        }
        self.disconnect();

        let join = JoinFrame {
            room_id: self.inner.room_id.clone(),
            name: name.to_owned(),
            client_key: self.inner.client_key.to_string(),
        };
        let pipe = PipeHandle::spawn(
            self.inner.pipe_url.clone(),
            join,
            Arc::downgrade(&self.inner),
        );
        *self.inner.pipe.lock() = Some(pipe);
        Ok(())
    }

    /// Close the pipe. No further events are delivered from it.
    pub fn disconnect(&self) {
        if let Some(pipe) = self.inner.pipe.lock().take() {
            debug!("Disconnecting from room {}", self.inner.room_id);
            pipe.detach();
        }
    }

    /// Serialize and write a message. Dropped when the pipe is not open.
    pub fn send(&self, message: &ProtocolMessage) {
        let text = match serde_json::to_string(message) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {} message: {}", message.kind, e);
                return;
            }
        };

        let sent = self
            .inner
            .pipe
            .lock()
            .as_ref()
            .is_some_and(|pipe| pipe.send(text));
        if !sent {
            trace!("Pipe not open, dropping {} message", message.kind);
        }
    }

    /// Room-wide chat, or a direct one when `target` is given.
    pub fn send_chat(&self, payload: Value, target: Option<&str>) {
        let mut message = ProtocolMessage::new(MessageType::Chat, payload);
        message.name = Some(self.self_name());
        message.target = target.map(str::to_owned);
        self.send(&message);
    }

    pub fn on<F>(&self, event: EventType, handler: F) -> SubscriptionId
    where
        F: Fn(&RoomEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on(event, handler)
    }

    pub fn off(&self, id: SubscriptionId) -> bool {
        self.inner.bus.off(id)
    }

    /// Start a call with `target`. `None` when the target is not in the room.
    pub async fn new_video_offer(&self, target: &str) -> Result<Option<PeerSession>> {
        self.new_offer(target, PeerKind::Video).await
    }

    /// Start a data link with `target`. `None` when the target is not in the
    /// room.
    pub async fn new_data_offer(&self, target: &str) -> Result<Option<PeerSession>> {
        self.new_offer(target, PeerKind::Data).await
    }

    async fn new_offer(&self, target: &str, kind: PeerKind) -> Result<Option<PeerSession>> {
        if !self.inner.user_list.read().iter().any(|u| u == target) {
            debug!("{} is not in room {}", target, self.inner.room_id);
            return Ok(None);
        }
        let session = PeerSession::offerer(self, target, kind).await?;
        self.inner.register_session(&session);
        Ok(Some(session))
    }

    /// Live session with `peer` of the given kind, if any.
    pub fn session(&self, peer: &str, kind: PeerKind) -> Option<PeerSession> {
        self.inner
            .sessions
            .get(&(peer.to_owned(), kind))
            .map(|s| s.clone())
            .filter(|s| !s.is_closed())
    }

    pub(crate) fn downgrade(&self) -> WeakRoom {
        WeakRoom(Arc::downgrade(&self.inner))
    }

    pub(crate) fn transport_factory(&self) -> Arc<dyn TransportFactory> {
        self.inner.transport_factory.clone()
    }

    pub(crate) fn transport_config(&self) -> TransportConfig {
        self.inner.transport_config.clone()
    }

    pub(crate) fn media_sink(&self) -> Arc<dyn MediaSink> {
        self.inner.media_sink.clone()
    }

    pub(crate) fn unregister_session(&self, peer: &str, kind: PeerKind, id: SessionId) {
        self.inner
            .sessions
            .remove_if(&(peer.to_owned(), kind), |_, s| s.id() == id);
    }
}

impl RoomInner {
    fn register_session(&self, session: &PeerSession) {
        self.sessions.insert(
            (session.target().to_owned(), session.kind()),
            session.clone(),
        );
    }

    pub(crate) fn pipe_opened(&self, name: &str) {
        *self.self_name.write() = name.to_owned();
        self.bus.emit(&RoomEvent::Open);
    }

    pub(crate) fn pipe_closed(&self) {
        info!("Pipe to room {} closed", self.room_id);
        self.bus.emit(&RoomEvent::Closed);
    }

    pub(crate) async fn handle_frame(self: &Arc<Self>, text: &str) {
        trace!("ws in: {}", text);
        match serde_json::from_str::<ProtocolMessage>(text) {
            Ok(message) => self.dispatch(message).await,
            Err(e) => warn!("Ignoring malformed frame: {}", e),
        }
    }

    async fn dispatch(self: &Arc<Self>, message: ProtocolMessage) {
        match message.kind.clone() {
            MessageType::Error => self.bus.emit(&RoomEvent::Error(message)),
            MessageType::VideoOffer => self.handle_offer(PeerKind::Video, message).await,
            MessageType::DataOffer => self.handle_offer(PeerKind::Data, message).await,
            MessageType::VideoAnswer => self.bus.emit(&RoomEvent::VideoAnswer(message)),
            MessageType::DataAnswer => self.bus.emit(&RoomEvent::DataAnswer(message)),
            MessageType::NewIceCandidate => self.bus.emit(&RoomEvent::NewIceCandidate(message)),
            MessageType::Chat => self.bus.emit(&RoomEvent::Chat(message)),
            MessageType::List => {
                let Some(names) = message.payload_names() else {
                    warn!("Ignoring list frame with unreadable payload");
                    return;
                };
                *self.user_list.write() = names.clone();
                self.bus.emit(&RoomEvent::UserListInit(names));
            }
            MessageType::Join => {
                let Some(name) = message.payload_str() else {
                    warn!("Ignoring join frame without a name");
                    return;
                };
                {
                    let mut users = self.user_list.write();
                    if users.iter().any(|u| u == name) {
                        return;
                    }
                    users.push(name.to_owned());
                }
                self.bus.emit(&RoomEvent::UserJoin(name.to_owned()));
            }
            MessageType::Leave => {
                let Some(name) = message.payload_str() else {
                    warn!("Ignoring leave frame without a name");
                    return;
                };
                {
                    let mut users = self.user_list.write();
                    let Some(pos) = users.iter().position(|u| u == name) else {
                        return;
                    };
                    users.remove(pos);
                }
                self.bus.emit(&RoomEvent::UserLeave(name.to_owned()));
            }
            MessageType::Unknown(kind) => debug!("Ignoring unknown message type {}", kind),
        }
    }

    /// Route an offer to the live session with its sender, or start an
    /// answering session and announce it.
    async fn handle_offer(self: &Arc<Self>, kind: PeerKind, message: ProtocolMessage) {
        let Some(sender) = message.name.clone() else {
            warn!("Ignoring {} without a sender", message.kind);
            return;
        };
        let offer = match message.payload_as::<SessionDescription>() {
            Ok(offer) => offer,
            Err(e) => {
                warn!("Malformed {} from {}: {}", message.kind, sender, e);
                return;
            }
        };

        let existing = self
            .sessions
            .get(&(sender.clone(), kind))
            .map(|s| s.clone())
            .filter(|s| !s.is_closed());
        if let Some(session) = existing {
            if session.deliver_offer(offer.clone()) {
                debug!("Routed {} from {} to its session", message.kind, sender);
                return;
            }
        }

        let room = Room {
            inner: self.clone(),
        };
        let session = match PeerSession::answerer(&room, &sender, kind, offer).await {
            Ok(session) => session,
            Err(e) => {
                warn!("Failed to set up session for {}: {}", sender, e);
                return;
            }
        };
        self.register_session(&session);

        let event = match kind {
            PeerKind::Video => RoomEvent::VideoOffer(session),
            PeerKind::Data => RoomEvent::DataOffer(session),
        };
        self.bus.emit(&event);
    }
}
