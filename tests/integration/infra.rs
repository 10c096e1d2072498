//! Shared helpers: temp paths, test sinks, failing readers.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, ReadBuf};

use sluice::{Chunk, Sink};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Fresh, empty directory unique to this process and call.
pub fn temp_dir(tag: &str) -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "sluice-it-{tag}-{}-{}",
        std::process::id(),
        id
    ));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

/// Deterministic, non-repeating-looking test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len as u64)
        .map(|i| (i.wrapping_mul(2654435761) >> 7) as u8)
        .collect()
}

/// Sink that sleeps before confirming each chunk.
pub struct SlowSink {
    pub delay: Duration,
    pub seen: Arc<Mutex<Vec<Chunk>>>,
}

impl SlowSink {
    pub fn new(delay: Duration) -> (Self, Arc<Mutex<Vec<Chunk>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                delay,
                seen: seen.clone(),
            },
            seen,
        )
    }
}

impl Sink for SlowSink {
    async fn deliver(&mut self, chunk: Chunk) -> io::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.seen.lock().unwrap().push(chunk);
        Ok(())
    }
}

/// Sink that accepts `ok_chunks` chunks and fails on the next one.
pub struct FlakySink {
    pub ok_chunks: usize,
    pub seen: Arc<Mutex<Vec<Chunk>>>,
}

impl FlakySink {
    pub fn new(ok_chunks: usize) -> (Self, Arc<Mutex<Vec<Chunk>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                ok_chunks,
                seen: seen.clone(),
            },
            seen,
        )
    }
}

impl Sink for FlakySink {
    async fn deliver(&mut self, chunk: Chunk) -> io::Result<()> {
        let mut seen = self.seen.lock().unwrap();
        if seen.len() >= self.ok_chunks {
            return Err(io::Error::other("device full"));
        }
        seen.push(chunk);
        Ok(())
    }
}

/// Sink whose finish step fails.
pub struct UnfinishableSink;

impl Sink for UnfinishableSink {
    async fn deliver(&mut self, _chunk: Chunk) -> io::Result<()> {
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::WriteZero, "flush refused"))
    }
}

/// Sink that panics on the first chunk.
pub struct PanickingSink;

impl Sink for PanickingSink {
    async fn deliver(&mut self, _chunk: Chunk) -> io::Result<()> {
        panic!("sink exploded");
    }
}

/// Reader that yields `good` bytes of zeroes, then an error.
pub struct BrokenReader {
    pub good: usize,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.good == 0 {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "source vanished",
            )));
        }
        let n = self.good.min(buf.remaining());
        buf.put_slice(&vec![0u8; n]);
        self.good -= n;
        Poll::Ready(Ok(()))
    }
}
