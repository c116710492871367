//! Sink-originated close requests and the event interface the proxy injects
//! into its sink.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::time::Duration;

use pull_proxy::errors::{PullError, PullErrorKind};
use pull_proxy::types::{LiveStatus, OriginType, ProxyState, SockInfo, TrackType};
use pull_proxy::ProxyConfig;
use pull_proxy_test_utils::{
    advance, config_with_retries, settle, video_track, ConnectOutcome, MockPullerFactory,
    TestProxy,
};

const URL: &str = "rtmp://origin.example/live/cam";

async fn live_proxy(config: ProxyConfig, pullers: MockPullerFactory) -> TestProxy {
    let proxy = TestProxy::spawn(config, pullers).await;
    proxy.handle.play(URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Live);
    proxy
}

#[tokio::test(start_paused = true)]
async fn test_active_close_while_live_stops_without_retry() {
    let pullers = MockPullerFactory::builder()
        .with_tracks(vec![video_track()])
        .build();
    let proxy = live_proxy(config_with_retries(-1), pullers).await;
    let sink = proxy.sinks.sink().unwrap();

    assert!(sink.request_close());
    settle().await;

    assert_eq!(proxy.handle.state(), ProxyState::Stopped);
    assert_eq!(proxy.handle.status(), LiveStatus::Connecting);
    let closes = proxy.callbacks.closes();
    assert_eq!(closes.len(), 1);
    assert_eq!(closes[0].kind(), PullErrorKind::ClosedByRequest);
    assert!(closes[0].is_active_close());
    assert_eq!(proxy.callbacks.disconnects(), 0);

    assert_eq!(sink.detach_count(), 1);
    assert!(!sink.is_shut_down());
    assert_eq!(proxy.pullers.alive(), 0);

    advance(Duration::from_secs(120)).await;
    assert_eq!(proxy.pullers.attempt_count(), 1);
    assert_eq!(proxy.handle.state(), ProxyState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_standing_connection_retries_after_active_close() {
    let pullers = MockPullerFactory::builder()
        .with_tracks(vec![video_track()])
        .build();
    let config = ProxyConfig {
        standing_connection: true,
        ..ProxyConfig::default()
    };
    let proxy = live_proxy(config, pullers).await;
    let sink = proxy.sinks.sink().unwrap();

    assert!(sink.request_close());
    settle().await;

    assert_eq!(proxy.callbacks.closes().len(), 1);
    assert_eq!(proxy.handle.state(), ProxyState::Retrying);

    advance(Duration::from_secs(2)).await;
    assert_eq!(proxy.handle.state(), ProxyState::Live);
    assert_eq!(proxy.pullers.attempt_count(), 2);
    assert_eq!(proxy.sinks.created(), 1);
    assert_eq!(sink.bind_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_active_close_while_retrying_cancels_pending_retry() {
    let pullers = MockPullerFactory::builder()
        .then(ConnectOutcome::Succeed)
        .default_fail()
        .build();
    let proxy = live_proxy(config_with_retries(-1), pullers).await;
    let sink = proxy.sinks.sink().unwrap();

    proxy
        .pullers
        .drop_active_session(PullError::shutdown("peer reset"));
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Retrying);

    assert!(sink.request_close());
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Stopped);
    assert_eq!(proxy.callbacks.closes().len(), 1);

    advance(Duration::from_secs(120)).await;
    assert_eq!(proxy.pullers.attempt_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_close_refused_after_proxy_shut_down() {
    let pullers = MockPullerFactory::builder().build();
    let proxy = live_proxy(config_with_retries(-1), pullers).await;
    let sink = proxy.sinks.sink().unwrap();

    proxy.handle.shutdown().await;

    assert!(!proxy.handle.is_running());
    assert!(sink.is_shut_down());
    assert!(!sink.request_close());
    assert!(proxy.callbacks.closes().is_empty());
    assert_eq!(proxy.pullers.alive(), 0);
    assert_eq!(proxy.handle.state(), ProxyState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_event_handler_reports_origin_while_live() {
    let endpoint = SockInfo {
        local_addr: "10.0.0.2:50000".parse().unwrap(),
        peer_addr: "10.0.0.5:1935".parse().unwrap(),
        identifier: "session-1".to_string(),
    };
    let pullers = MockPullerFactory::builder()
        .with_tracks(vec![video_track()])
        .with_endpoint(endpoint.clone())
        .with_loss_rate(0.25)
        .build();
    let proxy = live_proxy(config_with_retries(-1), pullers).await;
    let sink = proxy.sinks.sink().unwrap();
    let events = sink.events();
    let tuple = proxy.handle.media_tuple().clone();

    sink.set_reader_count(3);
    assert_eq!(events.total_reader_count(&tuple), 3);
    assert_eq!(proxy.handle.total_reader_count(), 3);
    assert_eq!(events.origin_type(&tuple), OriginType::PullProxy);
    assert_eq!(events.origin_url(&tuple), URL);
    assert_eq!(events.origin_sock(&tuple), Some(endpoint));
    assert_eq!(events.loss_rate(&tuple, TrackType::Video), Some(0.25));

    proxy
        .pullers
        .drop_active_session(PullError::shutdown("peer reset"));
    settle().await;

    assert_eq!(events.origin_sock(&tuple), None);
    assert_eq!(events.loss_rate(&tuple, TrackType::Video), None);
    // Readers stay attached to the sink while upstream is re-pulled.
    assert_eq!(events.total_reader_count(&tuple), 3);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_every_handle_releases_puller_and_sink() {
    let pullers = MockPullerFactory::builder().build();
    let TestProxy {
        handle,
        task,
        pullers,
        sinks,
        ..
    } = live_proxy(config_with_retries(-1), pullers).await;

    drop(handle);
    task.await.unwrap();

    assert!(sinks.sink().unwrap().is_shut_down());
    assert_eq!(pullers.alive(), 0);
    assert_eq!(pullers.torn_down(), 1);
}
