use crate::peer::MediaRelay;
use parley_core::sdp::WithheldSection;
use parley_core::{MessageType, SessionDescription};
use std::fmt;

/// What a session carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerKind {
    Video,
    Data,
}

impl PeerKind {
    pub fn offer_type(self) -> MessageType {
        match self {
            PeerKind::Video => MessageType::VideoOffer,
            PeerKind::Data => MessageType::DataOffer,
        }
    }

    pub fn answer_type(self) -> MessageType {
        match self {
            PeerKind::Video => MessageType::VideoAnswer,
            PeerKind::Data => MessageType::DataAnswer,
        }
    }
}

impl fmt::Display for PeerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerKind::Video => f.write_str("video"),
            PeerKind::Data => f.write_str("data"),
        }
    }
}

/// Which side started the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Offer,
    Answer,
}

/// Optional behaviours a session variant supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub bandwidth_cap: bool,
    pub media_relay: bool,
    pub pre_answer: bool,
}

pub(crate) enum SessionVariant {
    VideoOffer {
        bandwidth_kbps: Option<u32>,
    },
    VideoAnswer {
        pending_offer: Option<SessionDescription>,
        /// `Some` while a provisional answer is outstanding.
        withheld: Option<Vec<WithheldSection>>,
    },
    DataOffer {
        bandwidth_kbps: Option<u32>,
        relay: MediaRelay,
    },
    DataAnswer {
        pending_offer: Option<SessionDescription>,
        relay: MediaRelay,
    },
}

impl SessionVariant {
    pub(crate) fn kind(&self) -> PeerKind {
        match self {
            SessionVariant::VideoOffer { .. } | SessionVariant::VideoAnswer { .. } => {
                PeerKind::Video
            }
            SessionVariant::DataOffer { .. } | SessionVariant::DataAnswer { .. } => PeerKind::Data,
        }
    }

    pub(crate) fn role(&self) -> Role {
        match self {
            SessionVariant::VideoOffer { .. } | SessionVariant::DataOffer { .. } => Role::Offer,
            SessionVariant::VideoAnswer { .. } | SessionVariant::DataAnswer { .. } => Role::Answer,
        }
    }

    pub(crate) fn capabilities(&self) -> Capabilities {
        match self {
            SessionVariant::VideoOffer { .. } => Capabilities {
                bandwidth_cap: true,
                ..Default::default()
            },
            SessionVariant::VideoAnswer { .. } => Capabilities {
                pre_answer: true,
                ..Default::default()
            },
            SessionVariant::DataOffer { .. } => Capabilities {
                bandwidth_cap: true,
                media_relay: true,
                ..Default::default()
            },
            SessionVariant::DataAnswer { .. } => Capabilities {
                media_relay: true,
                ..Default::default()
            },
        }
    }

    pub(crate) fn bandwidth_kbps(&self) -> Option<u32> {
        match self {
            SessionVariant::VideoOffer { bandwidth_kbps }
            | SessionVariant::DataOffer { bandwidth_kbps, .. } => *bandwidth_kbps,
            _ => None,
        }
    }

    /// Returns false when the variant has no bandwidth cap.
    pub(crate) fn set_bandwidth_kbps(&mut self, kbps: u32) -> bool {
        match self {
            SessionVariant::VideoOffer { bandwidth_kbps }
            | SessionVariant::DataOffer { bandwidth_kbps, .. } => {
                *bandwidth_kbps = Some(kbps);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn take_pending_offer(&mut self) -> Option<SessionDescription> {
        match self {
            SessionVariant::VideoAnswer { pending_offer, .. }
            | SessionVariant::DataAnswer { pending_offer, .. } => pending_offer.take(),
            _ => None,
        }
    }

    pub(crate) fn relay_mut(&mut self) -> Option<&mut MediaRelay> {
        match self {
            SessionVariant::DataOffer { relay, .. } | SessionVariant::DataAnswer { relay, .. } => {
                Some(relay)
            }
            _ => None,
        }
    }
}
