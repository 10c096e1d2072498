use std::time::Duration;

use sluice::{pipe, BoundedChannel, ChannelConfig, ChannelState, FileSink, Measure};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  File copy through a bounded channel
// ══════════════════════════════════════════════════════════════════════════════

async fn copy_file(len: usize, config: ChannelConfig, chunk_size: usize) -> anyhow::Result<()> {
    let dir = temp_dir("copy");
    let src = dir.join("source.bin");
    let dst = dir.join("dest.bin");
    let data = pattern(len);
    std::fs::write(&src, &data)?;

    let reader = tokio::fs::File::open(&src).await?;
    let sink = FileSink::create(&dst).await?;
    let channel = BoundedChannel::new(sink, config)?;

    let summary = tokio::time::timeout(Duration::from_secs(10), pipe(reader, &channel, chunk_size))
        .await??;

    assert_eq!(channel.state(), ChannelState::Closed);
    assert_eq!(channel.buffered(), 0);
    assert_eq!(summary.bytes, len as u64);
    assert_eq!(summary.digest, *blake3::hash(&data).as_bytes());

    let copied = std::fs::read(&dst)?;
    assert_eq!(copied.len(), data.len());
    assert!(copied == data, "copied bytes differ from source");

    let stats = channel.stats();
    assert_eq!(stats.chunks_written, summary.chunks);
    assert_eq!(stats.chunks_delivered, summary.chunks);
    assert_eq!(stats.bytes_delivered, len as u64);

    let _ = std::fs::remove_dir_all(&dir);
    Ok(())
}

#[tokio::test]
async fn copies_file_with_default_settings() -> anyhow::Result<()> {
    copy_file(1_000_000, ChannelConfig::default(), 64 * 1024).await
}

#[tokio::test]
async fn copies_file_with_tiny_buffer() -> anyhow::Result<()> {
    let config = ChannelConfig {
        capacity: 100,
        measure: Measure::Bytes,
    };
    copy_file(50_000, config, 333).await
}

#[tokio::test]
async fn copies_file_counting_chunks() -> anyhow::Result<()> {
    let config = ChannelConfig {
        capacity: 2,
        measure: Measure::Chunks,
    };
    copy_file(200_000, config, 4096).await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn copies_file_on_multi_thread_runtime() -> anyhow::Result<()> {
    let config = ChannelConfig {
        capacity: 8 * 1024,
        measure: Measure::Bytes,
    };
    copy_file(2_000_000, config, 1024).await
}

#[tokio::test]
async fn copies_empty_file() -> anyhow::Result<()> {
    copy_file(0, ChannelConfig::default(), 1024).await
}
