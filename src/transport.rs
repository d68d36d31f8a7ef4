//! Transport capability consumed by the request context.
//!
//! The runtime adapter (socket layer) implements [`Transport`] and hands it
//! to each context. The context never looks behind the trait.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::net::IpAddr;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, Stream};
use parking_lot::Mutex;

use crate::core::{Error, Result};

/// Body bytes delivered to the client.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// A retrievable file: its bytes and, when known, its size.
pub struct FileStream {
    pub stream: ByteStream,
    pub size: Option<u64>,
}

impl FileStream {
    #[inline]
    pub fn new(stream: ByteStream, size: Option<u64>) -> Self {
        Self { stream, size }
    }

    /// Single-chunk stream over in-memory bytes.
    pub fn from_bytes(data: Bytes) -> Self {
        let size = data.len() as u64;
        Self {
            stream: Box::pin(stream::once(async move { Ok(data) })),
            size: Some(size),
        }
    }
}

impl fmt::Debug for FileStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStream")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Runtime-specific I/O used by the context.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Peer address of the connection, if known.
    fn ip(&self) -> Option<IpAddr>;

    /// Open a file for streaming. `Ok(None)` means not found.
    async fn get_stream(&self, path: &str) -> Result<Option<FileStream>>;

    /// Hand a body stream to the connection.
    fn stream(&self, data: ByteStream, size: Option<u64>);
}

/// In-memory transport serving a fixed set of files.
///
/// Streams handed to [`Transport::stream`] are kept and can be taken back
/// with [`MemoryTransport::take_streams`].
#[derive(Default)]
pub struct MemoryTransport {
    ip: Option<IpAddr>,
    files: HashMap<String, Bytes>,
    failing: HashMap<String, String>,
    streamed: Mutex<Vec<FileStream>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peer address reported by `ip()`.
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Serve `data` for `path`.
    pub fn with_file(mut self, path: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.files.insert(path.into(), data.into());
        self
    }

    /// Fail retrieval of `path` with a transport error.
    pub fn with_failure(mut self, path: impl Into<String>, message: impl Into<String>) -> Self {
        self.failing.insert(path.into(), message.into());
        self
    }

    /// Number of streams delivered so far.
    pub fn streamed_count(&self) -> usize {
        self.streamed.lock().len()
    }

    /// Drain delivered streams.
    pub fn take_streams(&self) -> Vec<FileStream> {
        std::mem::take(&mut *self.streamed.lock())
    }
}

impl fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransport")
            .field("ip", &self.ip)
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .field("streamed", &self.streamed_count())
            .finish()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn ip(&self) -> Option<IpAddr> {
        self.ip
    }

    async fn get_stream(&self, path: &str) -> Result<Option<FileStream>> {
        if let Some(message) = self.failing.get(path) {
            return Err(Error::Transport(message.clone()));
        }
        Ok(self.files.get(path).cloned().map(FileStream::from_bytes))
    }

    fn stream(&self, data: ByteStream, size: Option<u64>) {
        self.streamed.lock().push(FileStream::new(data, size));
    }
}
