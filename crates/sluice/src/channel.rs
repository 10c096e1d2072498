//! Bounded channel — ordered chunk delivery with backpressure.
//!
//! One producer writes, one delivery worker drains into a [`Sink`]. The
//! channel counts every chunk from the moment `write` accepts it until the
//! sink confirms delivery. Once that count reaches capacity, `write` answers
//! [`Accepted::Deferred`] and refuses further chunks until the producer has
//! waited in [`BoundedChannel::await_drain`].
//!
//! State lives behind one short-held mutex that is never held across an
//! await. The worker is the only code that lowers `buffered`; `write` is the
//! only code that raises it.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use sluice_core::{Chunk, Measure};

use crate::notifier::Notifier;
use crate::sink::Sink;

/// Channel sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// High-water mark in `measure` units. Must be at least 1.
    pub capacity: usize,
    pub measure: Measure,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: sluice_core::config::DEFAULT_CAPACITY,
            measure: Measure::Bytes,
        }
    }
}

impl From<&sluice_core::config::ChannelSettings> for ChannelConfig {
    fn from(settings: &sluice_core::config::ChannelSettings) -> Self {
        Self {
            capacity: settings.capacity,
            measure: settings.measure,
        }
    }
}

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    /// Buffer still below capacity; keep writing.
    Immediate,
    /// This chunk filled the buffer. Call `await_drain` before writing again.
    Deferred,
}

impl Accepted {
    pub fn must_wait(self) -> bool {
        matches!(self, Accepted::Deferred)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Draining,
    Closed,
    Failed,
}

/// Counters for reporting. Updated by the channel only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    pub chunks_written: u64,
    pub chunks_delivered: u64,
    pub bytes_delivered: u64,
    /// Times the buffer went from saturated back under capacity.
    pub drain_events: u64,
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("channel failed: {0}")]
    Failed(#[source] Arc<io::Error>),
    #[error("empty chunk")]
    InvalidChunk,
    #[error("channel saturated ({buffered}/{capacity}); await drain before writing")]
    Saturated { buffered: usize, capacity: usize },
    #[error("channel capacity must be at least 1")]
    InvalidCapacity,
}

// ── Shared state ──────────────────────────────────────────────────────────────

struct Inner {
    state: ChannelState,
    buffered: usize,
    failure: Option<Arc<io::Error>>,
    /// Hand-off to the delivery worker. Dropped on `end()` so the worker
    /// sees the queue close after the last chunk.
    queue: Option<mpsc::UnboundedSender<Chunk>>,
    stats: ChannelStats,
}

impl Inner {
    fn failed(&self) -> Option<ChannelError> {
        self.failure.clone().map(ChannelError::Failed)
    }
}

struct Shared {
    inner: Mutex<Inner>,
    drained: Notifier,
    capacity: usize,
    measure: Measure,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Sink confirmed one chunk.
    fn confirm(&self, cost: usize, len: usize) {
        {
            let mut inner = self.lock();
            let was_saturated = inner.buffered >= self.capacity;
            inner.buffered = inner.buffered.saturating_sub(cost);
            inner.stats.chunks_delivered += 1;
            inner.stats.bytes_delivered += len as u64;
            if was_saturated && inner.buffered < self.capacity {
                inner.stats.drain_events += 1;
                tracing::trace!(buffered = inner.buffered, "drained below capacity");
            }
        }
        self.drained.notify_all();
    }

    /// Terminal failure. The first error wins.
    fn fail(&self, error: io::Error) {
        {
            let mut inner = self.lock();
            if matches!(inner.state, ChannelState::Closed | ChannelState::Failed) {
                return;
            }
            tracing::warn!(
                error = %error,
                buffered = inner.buffered,
                "sink failed, channel is now failed"
            );
            inner.state = ChannelState::Failed;
            inner.failure = Some(Arc::new(error));
            inner.queue = None;
        }
        self.drained.notify_all();
    }

    fn close(&self) {
        {
            let mut inner = self.lock();
            if inner.state != ChannelState::Draining {
                return;
            }
            inner.state = ChannelState::Closed;
            tracing::info!(
                chunks = inner.stats.chunks_delivered,
                bytes = inner.stats.bytes_delivered,
                "channel closed"
            );
        }
        self.drained.notify_all();
    }
}

// ── Channel ───────────────────────────────────────────────────────────────────

/// Single-producer channel feeding one sink, bounded by a high-water mark.
///
/// Must be created inside a tokio runtime; construction spawns the
/// delivery worker. Dropping the channel before [`end`](Self::end) aborts
/// the worker, and chunks it had not yet delivered are not flushed.
pub struct BoundedChannel {
    shared: Arc<Shared>,
    worker: JoinHandle<()>,
}

impl BoundedChannel {
    pub fn new<S: Sink>(sink: S, config: ChannelConfig) -> Result<Self, ChannelError> {
        if config.capacity == 0 {
            return Err(ChannelError::InvalidCapacity);
        }

        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner {
                state: ChannelState::Open,
                buffered: 0,
                failure: None,
                queue: Some(queue_tx),
                stats: ChannelStats::default(),
            }),
            drained: Notifier::new(),
            capacity: config.capacity,
            measure: config.measure,
        });

        let worker = DeliveryWorker {
            sink,
            queue: queue_rx,
            shared: shared.clone(),
        };
        let worker = tokio::spawn(worker.run());

        tracing::debug!(
            capacity = config.capacity,
            measure = %config.measure,
            "channel opened"
        );
        Ok(Self { shared, worker })
    }

    pub fn with_capacity<S: Sink>(
        sink: S,
        capacity: usize,
        measure: Measure,
    ) -> Result<Self, ChannelError> {
        Self::new(sink, ChannelConfig { capacity, measure })
    }

    /// Queue a chunk for delivery. Never blocks.
    ///
    /// Returns [`Accepted::Deferred`] when this chunk brought the buffer to
    /// capacity; the caller must then `await_drain()` before the next write.
    pub fn write(&self, chunk: impl Into<Chunk>) -> Result<Accepted, ChannelError> {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return Err(ChannelError::InvalidChunk);
        }

        let mut inner = self.shared.lock();
        if let Some(err) = inner.failed() {
            return Err(err);
        }
        if inner.state != ChannelState::Open {
            return Err(ChannelError::Closed);
        }
        if inner.buffered >= self.shared.capacity {
            return Err(ChannelError::Saturated {
                buffered: inner.buffered,
                capacity: self.shared.capacity,
            });
        }

        let cost = chunk.cost(self.shared.measure);
        let len = chunk.len();
        let queue = inner.queue.as_ref().ok_or(ChannelError::Closed)?;
        if queue.send(chunk).is_err() {
            // Worker is gone without having recorded a failure.
            drop(inner);
            self.shared
                .fail(io::Error::other("delivery worker stopped unexpectedly"));
            return Err(self.shared.lock().failed().unwrap_or(ChannelError::Closed));
        }

        inner.buffered += cost;
        inner.stats.chunks_written += 1;
        tracing::trace!(len, buffered = inner.buffered, "chunk accepted");

        if inner.buffered >= self.shared.capacity {
            Ok(Accepted::Deferred)
        } else {
            Ok(Accepted::Immediate)
        }
    }

    /// Wait until the buffer is back under capacity.
    ///
    /// Returns immediately if it already is. Fails if the sink fails
    /// while waiting.
    pub async fn await_drain(&self) -> Result<(), ChannelError> {
        self.shared
            .drained
            .wait_until(|| {
                let inner = self.shared.lock();
                if let Some(err) = inner.failed() {
                    return Some(Err(err));
                }
                if inner.buffered < self.shared.capacity || inner.state == ChannelState::Closed {
                    return Some(Ok(()));
                }
                None
            })
            .await
    }

    /// Stop accepting writes and wait until every buffered chunk is
    /// delivered and the sink has finished.
    pub async fn end(&self) -> Result<(), ChannelError> {
        {
            let mut inner = self.shared.lock();
            if inner.state == ChannelState::Open {
                inner.state = ChannelState::Draining;
                inner.queue = None;
                tracing::debug!(buffered = inner.buffered, "end requested, draining");
            }
        }

        self.shared
            .drained
            .wait_until(|| {
                let inner = self.shared.lock();
                match inner.state {
                    ChannelState::Closed => Some(Ok(())),
                    ChannelState::Failed => Some(Err(inner.failed().unwrap_or(ChannelError::Closed))),
                    ChannelState::Open | ChannelState::Draining => None,
                }
            })
            .await
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn measure(&self) -> Measure {
        self.shared.measure
    }

    pub fn buffered(&self) -> usize {
        self.shared.lock().buffered
    }

    pub fn state(&self) -> ChannelState {
        self.shared.lock().state
    }

    pub fn stats(&self) -> ChannelStats {
        self.shared.lock().stats
    }
}

impl Drop for BoundedChannel {
    fn drop(&mut self) {
        let inner = self.shared.lock();
        if matches!(inner.state, ChannelState::Open | ChannelState::Draining) {
            tracing::warn!(
                buffered = inner.buffered,
                "channel dropped before close, abandoning undelivered chunks"
            );
        }
        drop(inner);
        self.worker.abort();
    }
}

// ── Delivery worker ───────────────────────────────────────────────────────────

/// Dequeues chunks in order and feeds them to the sink, one at a time.
struct DeliveryWorker<S> {
    sink: S,
    queue: mpsc::UnboundedReceiver<Chunk>,
    shared: Arc<Shared>,
}

/// Fails the channel if the worker stops without reaching a terminal
/// state (the sink panicked).
struct ExitGuard(Arc<Shared>);

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.0
            .fail(io::Error::other("delivery worker stopped unexpectedly"));
    }
}

impl<S: Sink> DeliveryWorker<S> {
    async fn run(mut self) {
        let _guard = ExitGuard(self.shared.clone());

        while let Some(chunk) = self.queue.recv().await {
            let cost = chunk.cost(self.shared.measure);
            let len = chunk.len();
            if let Err(e) = self.sink.deliver(chunk).await {
                self.shared.fail(e);
                return;
            }
            self.shared.confirm(cost, len);
            tracing::debug!(len, "chunk delivered");
        }

        // Queue closed: end() was called and everything before it is delivered.
        match self.sink.finish().await {
            Ok(()) => self.shared.close(),
            Err(e) => self.shared.fail(e),
        }
        tracing::debug!("delivery worker exiting");
    }
}
