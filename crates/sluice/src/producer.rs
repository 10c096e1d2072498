//! Producer loops that honour the channel's drain signal.

use std::io;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use sluice_core::Chunk;

use crate::channel::{BoundedChannel, ChannelError};

#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("failed to read source: {0}")]
    Read(#[source] io::Error),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// What `pipe` pushed through the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeSummary {
    pub chunks: u64,
    pub bytes: u64,
    /// BLAKE3 of every byte piped, in order.
    pub digest: [u8; 32],
    /// Times the producer paused for a drain.
    pub drain_waits: u64,
}

/// Write every item, pausing whenever the channel asks for it.
///
/// Empty items are skipped. Does not call `end()`. Returns the number of
/// chunks written.
pub async fn write_all<I>(channel: &BoundedChannel, items: I) -> Result<u64, ChannelError>
where
    I: IntoIterator,
    I::Item: Into<Chunk>,
{
    let mut written = 0;
    for item in items {
        let chunk = item.into();
        if chunk.is_empty() {
            continue;
        }
        if channel.write(chunk)?.must_wait() {
            channel.await_drain().await?;
        }
        written += 1;
    }
    Ok(written)
}

/// Read `reader` to the end in `chunk_size` pieces, write them with
/// backpressure, then `end()` the channel.
pub async fn pipe<R>(
    mut reader: R,
    channel: &BoundedChannel,
    chunk_size: usize,
) -> Result<PipeSummary, PipeError>
where
    R: AsyncRead + Unpin,
{
    let chunk_size = chunk_size.max(1);
    let mut hasher = blake3::Hasher::new();
    let mut chunks = 0u64;
    let mut bytes = 0u64;
    let mut drain_waits = 0u64;

    // One read buffer for the whole pipe. Each chunk gets its own
    // allocation sized to what was read, so short reads cannot pin
    // more memory than the channel accounts for.
    let mut buf = vec![0u8; chunk_size];
    loop {
        let n = reader.read(&mut buf).await.map_err(PipeError::Read)?;
        if n == 0 {
            break;
        }
        let data = &buf[..n];
        hasher.update(data);

        if channel.write(Bytes::copy_from_slice(data))?.must_wait() {
            drain_waits += 1;
            channel.await_drain().await?;
        }
        chunks += 1;
        bytes += n as u64;
    }

    channel.end().await?;
    tracing::debug!(chunks, bytes, drain_waits, "pipe finished");

    Ok(PipeSummary {
        chunks,
        bytes,
        digest: *hasher.finalize().as_bytes(),
        drain_waits,
    })
}
