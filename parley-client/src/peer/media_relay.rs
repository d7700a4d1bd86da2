use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque reference to a media buffer, handed to the application so it can
/// read what a data link relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MediaHandle(Uuid);

impl MediaHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MediaHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An append-only buffer of binary media chunks.
pub trait MediaBuffer: Send + Sync {
    fn handle(&self) -> MediaHandle;

    fn append(&mut self, chunk: Bytes);

    /// Give the buffer back to its sink. Appends after release are dropped.
    fn release(&mut self);
}

/// Where data links put the media they receive.
pub trait MediaSink: Send + Sync {
    fn allocate(&self) -> Box<dyn MediaBuffer>;
}

/// Keeps relayed chunks in memory, addressable by handle until released.
#[derive(Clone, Default)]
pub struct MemoryMediaSink {
    buffers: Arc<DashMap<MediaHandle, Vec<Bytes>>>,
}

impl MemoryMediaSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks in arrival order. `None` once the buffer was released.
    pub fn chunks(&self, handle: &MediaHandle) -> Option<Vec<Bytes>> {
        self.buffers.get(handle).map(|chunks| chunks.clone())
    }

    pub fn contents(&self, handle: &MediaHandle) -> Option<Bytes> {
        self.buffers.get(handle).map(|chunks| {
            let mut joined = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
            for chunk in chunks.iter() {
                joined.extend_from_slice(chunk);
            }
            joined.freeze()
        })
    }

    pub fn is_live(&self, handle: &MediaHandle) -> bool {
        self.buffers.contains_key(handle)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }
}

impl MediaSink for MemoryMediaSink {
    fn allocate(&self) -> Box<dyn MediaBuffer> {
        let handle = MediaHandle::new();
        self.buffers.insert(handle, Vec::new());
        Box::new(MemoryBuffer {
            handle,
            buffers: self.buffers.clone(),
        })
    }
}

struct MemoryBuffer {
    handle: MediaHandle,
    buffers: Arc<DashMap<MediaHandle, Vec<Bytes>>>,
}

impl MediaBuffer for MemoryBuffer {
    fn handle(&self) -> MediaHandle {
        self.handle
    }

    fn append(&mut self, chunk: Bytes) {
        if let Some(mut chunks) = self.buffers.get_mut(&self.handle) {
            chunks.push(chunk);
        }
    }

    fn release(&mut self) {
        self.buffers.remove(&self.handle);
    }
}

/// Per-session relay state: at most one live buffer at a time.
pub(crate) struct MediaRelay {
    sink: Arc<dyn MediaSink>,
    buffer: Option<Box<dyn MediaBuffer>>,
}

impl MediaRelay {
    pub(crate) fn new(sink: Arc<dyn MediaSink>) -> Self {
        Self { sink, buffer: None }
    }

    /// Start a fresh buffer, releasing the previous one first.
    pub(crate) fn attach(&mut self) -> MediaHandle {
        self.release();
        let buffer = self.sink.allocate();
        let handle = buffer.handle();
        self.buffer = Some(buffer);
        handle
    }

    /// Returns false when no buffer is attached and the chunk was dropped.
    pub(crate) fn append(&mut self, chunk: Bytes) -> bool {
        match self.buffer.as_mut() {
            Some(buffer) => {
                buffer.append(chunk);
                true
            }
            None => false,
        }
    }

    pub(crate) fn release(&mut self) {
        if let Some(mut buffer) = self.buffer.take() {
            buffer.release();
        }
    }
}
