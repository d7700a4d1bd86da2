use std::fmt;

/// Where a session stands in its offer/answer exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    New,
    /// A description was committed and the peer's reply is outstanding.
    Negotiating,
    Stable,
    /// Discarding our own offer after the peer's offer crossed it.
    RollingBack,
    /// Absorbing. Nothing leaves this state.
    Closed,
}

impl NegotiationState {
    pub fn is_closed(self) -> bool {
        self == NegotiationState::Closed
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NegotiationState::New => "new",
            NegotiationState::Negotiating => "negotiating",
            NegotiationState::Stable => "stable",
            NegotiationState::RollingBack => "rolling-back",
            NegotiationState::Closed => "closed",
        };
        f.write_str(s)
    }
}
