use std::sync::Arc;
use std::time::Duration;

use sluice::{pipe, BoundedChannel, ChannelError, ChannelState, Measure, PipeError};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Sink and source failures
// ══════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn sink_error_surfaces_through_pipe() {
    let (sink, seen) = FlakySink::new(2);
    let channel = BoundedChannel::with_capacity(sink, 1024, Measure::Bytes).unwrap();

    let data = pattern(10_000);
    let err = tokio::time::timeout(Duration::from_secs(5), pipe(&data[..], &channel, 100))
        .await
        .expect("pipe stalled")
        .unwrap_err();

    match err {
        PipeError::Channel(ChannelError::Failed(cause)) => {
            assert_eq!(cause.to_string(), "device full")
        }
        other => panic!("expected channel failure, got {other:?}"),
    }
    assert_eq!(channel.state(), ChannelState::Failed);
    assert_eq!(seen.lock().unwrap().len(), 2);

    // Terminal: every later interaction reports the same failure.
    assert!(matches!(channel.write("more"), Err(ChannelError::Failed(_))));
    assert!(matches!(channel.await_drain().await, Err(ChannelError::Failed(_))));
    assert!(matches!(channel.end().await, Err(ChannelError::Failed(_))));
}

#[tokio::test]
async fn failure_with_three_buffered_chunks_fails_end() {
    let (sink, seen) = FlakySink::new(0);
    let channel = BoundedChannel::with_capacity(sink, 10, Measure::Chunks).unwrap();

    channel.write("one").unwrap();
    channel.write("two").unwrap();
    channel.write("three").unwrap();

    let err = channel.end().await.unwrap_err();
    assert!(matches!(err, ChannelError::Failed(_)));
    assert!(seen.lock().unwrap().is_empty());
    assert!(matches!(channel.write("four"), Err(ChannelError::Failed(_))));
}

#[tokio::test]
async fn finish_error_fails_end() {
    let channel = BoundedChannel::with_capacity(UnfinishableSink, 4, Measure::Chunks).unwrap();
    channel.write("payload").unwrap();

    match channel.end().await {
        Err(ChannelError::Failed(cause)) => {
            assert_eq!(cause.kind(), std::io::ErrorKind::WriteZero)
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(channel.state(), ChannelState::Failed);
}

#[tokio::test]
async fn read_error_is_reported_as_read() {
    let (sink, collected) = sluice::MemorySink::new();
    let channel = BoundedChannel::with_capacity(sink, 64, Measure::Bytes).unwrap();

    let err = pipe(BrokenReader { good: 100 }, &channel, 32)
        .await
        .unwrap_err();
    assert!(matches!(err, PipeError::Read(_)));

    // The producer bailed before end(); the channel is still open.
    assert_eq!(channel.state(), ChannelState::Open);
    channel.end().await.unwrap();
    assert_eq!(collected.concat().len(), 100);
}

/// Dropping an open channel stops the worker and releases the sink.
#[tokio::test]
async fn dropping_an_open_channel_releases_the_sink() {
    let (sink, seen) = SlowSink::new(Duration::from_secs(60));
    let channel = BoundedChannel::with_capacity(sink, 4, Measure::Chunks).unwrap();
    channel.write("abandoned").unwrap();
    assert!(Arc::strong_count(&seen) > 1);

    drop(channel);
    tokio::time::timeout(Duration::from_secs(1), async {
        while Arc::strong_count(&seen) > 1 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("worker kept the sink alive after drop");
    assert!(seen.lock().unwrap().is_empty());
}

/// A sink that panics fails the channel instead of stalling its callers.
#[tokio::test]
async fn panicking_sink_fails_pending_drain() {
    let channel = BoundedChannel::with_capacity(PanickingSink, 1, Measure::Chunks).unwrap();
    assert!(channel.write("boom").unwrap().must_wait());

    let drained = tokio::time::timeout(Duration::from_secs(1), channel.await_drain())
        .await
        .expect("await_drain stalled after sink panic");
    assert!(matches!(drained, Err(ChannelError::Failed(_))));

    let ended = tokio::time::timeout(Duration::from_secs(1), channel.end())
        .await
        .expect("end stalled after sink panic");
    assert!(matches!(ended, Err(ChannelError::Failed(_))));
    assert_eq!(channel.state(), ChannelState::Failed);
    assert!(matches!(channel.write("again"), Err(ChannelError::Failed(_))));
}

#[tokio::test]
async fn panicking_sink_fails_pending_end() {
    let channel = BoundedChannel::with_capacity(PanickingSink, 8, Measure::Chunks).unwrap();
    channel.write("one").unwrap();
    channel.write("two").unwrap();

    let ended = tokio::time::timeout(Duration::from_secs(1), channel.end())
        .await
        .expect("end stalled after sink panic");
    match ended {
        Err(ChannelError::Failed(cause)) => {
            assert_eq!(cause.to_string(), "delivery worker stopped unexpectedly")
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}
