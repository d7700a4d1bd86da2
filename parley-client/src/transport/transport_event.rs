use crate::transport::{ConnectionState, SignalingState};
use bytes::Bytes;
use parley_core::IceCandidate;
use std::sync::Arc;
use webrtc::track::track_remote::TrackRemote;

/// Events a transport raises for the negotiation engine that owns it.
pub enum TransportEvent {
    /// Local media or channels changed and a new offer is required.
    NegotiationNeeded,

    /// A local candidate was gathered and must be trickled to the peer.
    CandidateGenerated(IceCandidate),

    ConnectionStateChanged(ConnectionState),

    SignalingStateChanged(SignalingState),

    /// The remote side opened a data channel towards us.
    DataChannelOpened(String),

    /// Binary frame received on an inbound data channel.
    DataChannelMessage(Bytes),

    /// The remote side started sending a media track.
    Track(Arc<TrackRemote>),
}
