use crate::error::Result;
use crate::peer::TrackHandler;
use bytes::Bytes;
use parley_core::{IceCandidate, SessionDescription};
use std::sync::Arc;
use tokio::sync::oneshot;
use webrtc::track::track_local::TrackLocal;

pub(crate) type Reply<T = ()> = oneshot::Sender<Result<T>>;

/// Everything that can ask a session actor to act.
pub(crate) enum SessionCommand {
    RemoteOffer(SessionDescription),
    RemoteAnswer(SessionDescription),
    RemoteCandidate(IceCandidate),
    Answer(Reply),
    PreAnswer(Reply),
    Confirm(Reply),
    AddTrack {
        track: Arc<dyn TrackLocal + Send + Sync>,
        reply: Reply,
    },
    SetBandwidth {
        kbps: u32,
        reply: Reply,
    },
    OpenChannel {
        label: String,
        reply: Reply,
    },
    SendFrame {
        data: Bytes,
        reply: Reply,
    },
    SetTrackHandler(TrackHandler),
    Close(Option<oneshot::Sender<()>>),
}
