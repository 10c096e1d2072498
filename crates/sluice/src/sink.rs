//! Sinks — where delivered chunks end up.
//!
//! The channel's delivery worker owns exactly one sink and calls
//! `deliver` once per accepted chunk, in write order, never concurrently.
//! `finish` runs once after the last chunk of a successful `end()`.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use sluice_core::Chunk;

/// Trait for anything that consumes chunks handed over by a channel.
///
/// Each returned future must eventually complete or fail, once. An error
/// is terminal: the channel stops delivering and fails every caller.
pub trait Sink: Send + 'static {
    /// Consume one chunk. Completion releases the chunk's buffer credit.
    fn deliver(&mut self, chunk: Chunk) -> impl Future<Output = io::Result<()>> + Send;

    /// Called once after every chunk has been delivered.
    fn finish(&mut self) -> impl Future<Output = io::Result<()>> + Send {
        async { Ok(()) }
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// Sink over any async writer.
pub struct WriterSink<W> {
    writer: W,
}

impl<W> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W> Sink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn deliver(&mut self, chunk: Chunk) -> io::Result<()> {
        self.writer.write_all(chunk.as_ref()).await
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.writer.flush().await?;
        self.writer.shutdown().await
    }
}

// ── File ──────────────────────────────────────────────────────────────────────

/// Sink writing to a file on disk. `finish` syncs the file.
pub struct FileSink {
    file: File,
    path: PathBuf,
    written: u64,
}

impl FileSink {
    /// Create (or truncate) the file at `path`.
    pub async fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await?;
        Ok(Self {
            file,
            path,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    async fn deliver(&mut self, chunk: Chunk) -> io::Result<()> {
        self.file.write_all(chunk.as_ref()).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        tracing::debug!(
            path = %self.path.display(),
            bytes = self.written,
            "file sink synced"
        );
        Ok(())
    }
}

// ── Memory ────────────────────────────────────────────────────────────────────

/// Sink collecting chunks in memory. Read them back through [`Collected`].
pub struct MemorySink {
    chunks: Arc<Mutex<Vec<Chunk>>>,
}

/// Read handle onto a [`MemorySink`]'s chunks.
#[derive(Clone)]
pub struct Collected {
    chunks: Arc<Mutex<Vec<Chunk>>>,
}

impl MemorySink {
    pub fn new() -> (Self, Collected) {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                chunks: chunks.clone(),
            },
            Collected { chunks },
        )
    }
}

impl Sink for MemorySink {
    async fn deliver(&mut self, chunk: Chunk) -> io::Result<()> {
        self.chunks
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(chunk);
        Ok(())
    }
}

impl Collected {
    pub fn chunks(&self) -> Vec<Chunk> {
        self.chunks.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.chunks.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All delivered payloads joined in delivery order.
    pub fn concat(&self) -> Bytes {
        let chunks = self.chunks.lock().unwrap_or_else(|p| p.into_inner());
        let mut out = BytesMut::with_capacity(chunks.iter().map(Chunk::len).sum());
        for chunk in chunks.iter() {
            out.extend_from_slice(chunk.as_ref());
        }
        out.freeze()
    }
}
