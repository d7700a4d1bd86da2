use crate::room::RoomInner;
use futures::{SinkExt, StreamExt};
use parley_core::JoinFrame;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};
use url::Url;

enum PipeCommand {
    Frame(String),
    Close,
}

#[derive(Default)]
struct PipeFlags {
    open: AtomicBool,
    /// Set when the owner tears the pipe down. A detached pipe delivers
    /// nothing more to the room, even frames already read off the socket.
    detached: AtomicBool,
}

/// Owner side of one WebSocket connection to a room.
pub(crate) struct PipeHandle {
    outbound: mpsc::UnboundedSender<PipeCommand>,
    flags: Arc<PipeFlags>,
}

impl PipeHandle {
    pub(crate) fn spawn(url: Url, join: JoinFrame, room: Weak<RoomInner>) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let flags = Arc::new(PipeFlags::default());

        tokio::spawn(run_pipe(url, join, room, outbound_rx, flags.clone()));

        Self { outbound, flags }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.flags.open.load(Ordering::Acquire) && !self.flags.detached.load(Ordering::Acquire)
    }

    /// Queue a text frame. Returns false when the pipe cannot take it.
    pub(crate) fn send(&self, text: String) -> bool {
        self.is_open() && self.outbound.send(PipeCommand::Frame(text)).is_ok()
    }

    /// Stop event delivery immediately, then ask the task to close the socket.
    pub(crate) fn detach(&self) {
        self.flags.detached.store(true, Ordering::Release);
        self.flags.open.store(false, Ordering::Release);
        let _ = self.outbound.send(PipeCommand::Close);
    }
}

impl Drop for PipeHandle {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn run_pipe(
    url: Url,
    join: JoinFrame,
    room: Weak<RoomInner>,
    mut outbound_rx: mpsc::UnboundedReceiver<PipeCommand>,
    flags: Arc<PipeFlags>,
) {
    let detached = || flags.detached.load(Ordering::Acquire);

    debug!("Connecting to room pipe {}", url);
    let ws_stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!("Failed to connect to {}: {}", url, e);
                if !detached() {
                    if let Some(room) = room.upgrade() {
                        room.pipe_closed();
                    }
                }
                return;
            }
        },
        // The owner gave up on this pipe while it was still connecting.
        _ = wait_for_close(&mut outbound_rx) => {
            debug!("Pipe to {} abandoned before opening", url);
            return;
        }
    };
    let (mut ws_write, mut ws_read) = ws_stream.split();

    if detached() {
        let _ = ws_write.close().await;
        return;
    }

    let join_text = match serde_json::to_string(&join) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode join frame: {}", e);
            return;
        }
    };
    if let Err(e) = ws_write.send(Message::Text(join_text)).await {
        warn!("Failed to send join frame: {}", e);
        if let Some(room) = room.upgrade() {
            room.pipe_closed();
        }
        return;
    }

    flags.open.store(true, Ordering::Release);
    info!("Joined room {} as {}", join.room_id, join.name);
    match room.upgrade() {
        Some(inner) => inner.pipe_opened(&join.name),
        None => return,
    }

    let mut closed_by_owner = false;
    loop {
        tokio::select! {
            command = outbound_rx.recv() => match command {
                Some(PipeCommand::Frame(text)) => {
                    trace!("ws out: {}", text);
                    if let Err(e) = ws_write.send(Message::Text(text)).await {
                        warn!("Failed to write frame: {}", e);
                        break;
                    }
                }
                Some(PipeCommand::Close) | None => {
                    closed_by_owner = true;
                    let _ = ws_write.close().await;
                    break;
                }
            },
            frame = ws_read.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => text,
                        Err(_) => {
                            debug!("Ignoring non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("Room pipe error: {}", e);
                        break;
                    }
                };

                if detached() {
                    break;
                }
                let Some(inner) = room.upgrade() else { break };
                inner.handle_frame(&text).await;
            }
        }
    }

    flags.open.store(false, Ordering::Release);
    if !closed_by_owner && !detached() {
        if let Some(inner) = room.upgrade() {
            inner.pipe_closed();
        }
    }
    debug!("Room pipe to {} finished", url);
}

async fn wait_for_close(outbound_rx: &mut mpsc::UnboundedReceiver<PipeCommand>) {
    loop {
        match outbound_rx.recv().await {
            Some(PipeCommand::Close) | None => return,
            Some(PipeCommand::Frame(_)) => {}
        }
    }
}
