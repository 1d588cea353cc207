// Realtime channel lifecycle: reconnect backoff, heartbeat watchdog, presence.
//
//   cargo test -p game-sync --test channel_tests

mod common;
mod support;

use std::time::Duration;

use game_sync::errors::ErrorCode;
use game_sync::transport::{ChannelEvent, RealtimeTransport, TransportChannel, TransportEvent};
use game_sync::TransportConfig;
use tokio::time::{timeout, Instant};

use crate::support::{fake_transport, snapshot};

/// Poll the channel the way the session loop does, with a competing tick
/// that drops the pending `next_event` future every second.
async fn next_event_amid_ticks<T: RealtimeTransport + 'static>(
    channel: &mut TransportChannel<T>,
) -> ChannelEvent {
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            event = channel.next_event() => return event,
            _ = tick.tick() => {}
        }
    }
}

#[tokio::test(start_paused = true)]
async fn unreachable_transport_gives_up_after_max_attempts() {
    let (transport, control) = fake_transport();
    control.set_unreachable(true);
    let mut channel = TransportChannel::new(transport, TransportConfig::default(), "ana");
    channel.connect("ABCD");

    let mut delays = Vec::new();
    let failure = loop {
        match channel.next_event().await {
            ChannelEvent::Disconnected { retry_in, attempt, .. } => {
                assert_eq!(attempt as usize, delays.len() + 1);
                delays.push(retry_in);
            }
            ChannelEvent::Failed(err) => break err,
            other => panic!("unexpected event {other:?}"),
        }
    };

    assert_eq!(failure.code(), ErrorCode::ConnectivityLost);
    assert_eq!(delays.len(), 10);
    assert_eq!(control.subscribe_calls(), 11);
    assert!(
        delays.windows(2).all(|pair| pair[0] <= pair[1]),
        "delays must not decrease: {delays:?}"
    );
    assert!(delays.iter().all(|d| *d <= Duration::from_secs(30)));
    assert!(channel.state().failed);
    assert_eq!(
        channel.state().last_error.as_deref(),
        Some("Max reconnection attempts reached")
    );

    // attempts are spaced by the advertised delays
    let times = control.subscribe_times();
    for (gap, delay) in times.windows(2).map(|w| w[1] - w[0]).zip(&delays) {
        assert_eq!(gap, *delay);
    }
}

#[tokio::test(start_paused = true)]
async fn short_silence_does_not_reconnect() {
    let (transport, control) = fake_transport();
    let mut channel = TransportChannel::new(transport, TransportConfig::default(), "ana");
    channel.connect("ABCD");
    assert_eq!(channel.next_event().await, ChannelEvent::Connected);

    // 12 seconds of nothing
    assert!(timeout(Duration::from_secs(12), channel.next_event())
        .await
        .is_err());

    control.push(TransportEvent::Heartbeat);
    assert!(timeout(Duration::from_secs(20), channel.next_event())
        .await
        .is_err());

    assert!(channel.is_connected());
    assert_eq!(channel.state().reconnect_attempts, 0);
    assert_eq!(control.subscribe_calls(), 1);
    assert_eq!(control.unsubscribes(), 0);
}

#[tokio::test(start_paused = true)]
async fn dead_socket_is_detected_by_the_watchdog() {
    let (transport, control) = fake_transport();
    let mut channel = TransportChannel::new(transport, TransportConfig::default(), "ana");
    channel.connect("ABCD");
    assert_eq!(channel.next_event().await, ChannelEvent::Connected);

    match channel.next_event().await {
        ChannelEvent::Disconnected { reason, attempt, .. } => {
            assert_eq!(reason, "Heartbeat timeout");
            assert_eq!(attempt, 1);
        }
        other => panic!("expected disconnect, got {other:?}"),
    }
    assert_eq!(control.unsubscribes(), 1);

    assert_eq!(channel.next_event().await, ChannelEvent::Connected);
    assert_eq!(control.subscribe_calls(), 2);
    assert_eq!(channel.state().reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn presence_is_announced_on_subscribe_and_refreshed() {
    let (transport, control) = fake_transport();
    let mut channel = TransportChannel::new(transport, TransportConfig::default(), "ana");
    channel.connect("ABCD");
    assert_eq!(channel.next_event().await, ChannelEvent::Connected);
    assert_eq!(control.tracked().len(), 1);
    assert_eq!(control.tracked()[0].player_name, "ana");

    // keep the socket alive while two refresh periods pass
    for _ in 0..4 {
        control.push(TransportEvent::Heartbeat);
        let _ = timeout(Duration::from_secs(8), channel.next_event()).await;
    }
    assert!(control.tracked().len() >= 3);

    // a close re-subscribes and re-announces
    control.push(TransportEvent::Closed {
        reason: "server restart".into(),
    });
    assert!(matches!(
        channel.next_event().await,
        ChannelEvent::Disconnected { .. }
    ));
    let before = control.tracked().len();
    assert_eq!(channel.next_event().await, ChannelEvent::Connected);
    assert_eq!(control.tracked().len(), before + 1);
}

#[tokio::test(start_paused = true)]
async fn remote_updates_pass_through_and_disconnect_is_idempotent() {
    let (transport, control) = fake_transport();
    let mut channel = TransportChannel::new(transport, TransportConfig::default(), "ana");
    channel.connect("ABCD");
    assert_eq!(channel.next_event().await, ChannelEvent::Connected);

    let v3 = snapshot(3, game_sync::GamePhase::Bidding, 0);
    control.push(TransportEvent::RemoteUpdate(v3.clone()));
    assert_eq!(channel.next_event().await, ChannelEvent::RemoteUpdate(v3));

    channel
        .send("chat", serde_json::json!({ "text": "hi" }))
        .await
        .unwrap();
    assert_eq!(control.sent().len(), 1);

    channel.disconnect().await;
    channel.disconnect().await;
    assert_eq!(control.unsubscribes(), 1);
    assert!(channel.send("chat", serde_json::json!({})).await.is_err());
}

#[tokio::test(start_paused = true)]
async fn manual_reconnect_restores_a_failed_channel() {
    let config = TransportConfig {
        max_attempts: 2,
        ..Default::default()
    };
    let (transport, control) = fake_transport();
    control.set_unreachable(true);
    let mut channel = TransportChannel::new(transport, config, "ana");
    channel.connect("ABCD");

    while !matches!(channel.next_event().await, ChannelEvent::Failed(_)) {}
    assert_eq!(control.subscribe_calls(), 3);

    control.set_unreachable(false);
    channel.reconnect();
    assert_eq!(channel.next_event().await, ChannelEvent::Connected);
    assert!(!channel.state().failed);
}

#[tokio::test(start_paused = true)]
async fn hung_subscribe_times_out_even_when_polling_is_interrupted() {
    let config = TransportConfig {
        max_attempts: 2,
        ..Default::default()
    };
    let (transport, control) = fake_transport();
    control.set_hanging(true);
    let mut channel = TransportChannel::new(transport, config, "ana");
    let started = Instant::now();
    channel.connect("ABCD");

    match next_event_amid_ticks(&mut channel).await {
        ChannelEvent::Disconnected { reason, attempt, .. } => {
            assert_eq!(attempt, 1);
            assert!(reason.contains("subscribe"), "reason: {reason}");
        }
        other => panic!("expected disconnect, got {other:?}"),
    }
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
    assert_eq!(control.subscribe_calls(), 1);

    let failure = loop {
        if let ChannelEvent::Failed(err) = next_event_amid_ticks(&mut channel).await {
            break err;
        }
    };
    assert_eq!(failure.code(), ErrorCode::ConnectivityLost);
    assert_eq!(control.subscribe_calls(), 3);
    assert!(channel.state().failed);
}

#[tokio::test(start_paused = true)]
async fn watchdog_disconnect_survives_interrupted_unsubscribe() {
    let (transport, control) = fake_transport();
    control.set_unsubscribe_delay(Duration::from_secs(5));
    let mut channel = TransportChannel::new(transport, TransportConfig::default(), "ana");
    channel.connect("ABCD");
    assert_eq!(next_event_amid_ticks(&mut channel).await, ChannelEvent::Connected);

    match next_event_amid_ticks(&mut channel).await {
        ChannelEvent::Disconnected { reason, attempt, .. } => {
            assert_eq!(reason, "Heartbeat timeout");
            assert_eq!(attempt, 1);
        }
        other => panic!("expected disconnect, got {other:?}"),
    }
    assert_eq!(control.unsubscribes(), 1);

    assert_eq!(next_event_amid_ticks(&mut channel).await, ChannelEvent::Connected);
    assert_eq!(control.subscribe_calls(), 2);
}
