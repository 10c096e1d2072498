//! sluice — a bounded chunk channel with backpressure.
//!
//! A producer writes chunks into a [`BoundedChannel`], which hands them in
//! order to a [`Sink`] on a background delivery worker. When the buffered
//! amount reaches the channel's capacity the write result tells the producer
//! to pause, and [`BoundedChannel::await_drain`] resumes it once the sink has
//! caught up.

pub mod channel;
pub mod notifier;
pub mod producer;
pub mod sink;

pub use channel::{
    Accepted, BoundedChannel, ChannelConfig, ChannelError, ChannelState, ChannelStats,
};
pub use notifier::Notifier;
pub use producer::{pipe, write_all, PipeError, PipeSummary};
pub use sink::{Collected, FileSink, MemorySink, Sink, WriterSink};
pub use sluice_core::{Chunk, Measure};
