//! Calling `play()` again while a proxy is connecting, retrying or live.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pull_proxy::errors::PullError;
use pull_proxy::types::ProxyState;
use pull_proxy::ProxyError;
use pull_proxy_test_utils::{
    advance, config_with_retries, settle, video_track, ConnectOutcome, MockPullerFactory,
    TestProxy,
};

const OLD_URL: &str = "rtsp://old.example/stream";
const NEW_URL: &str = "rtsp://new.example/stream";

#[tokio::test(start_paused = true)]
async fn test_redirect_cancels_pending_retry() {
    let pullers = MockPullerFactory::builder()
        .fail_times(1)
        .default_succeed()
        .build();
    let proxy = TestProxy::spawn(config_with_retries(-1), pullers).await;

    proxy.handle.play(OLD_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Retrying);

    proxy.handle.play(NEW_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Live);

    // The old retry timer would have fired here.
    advance(Duration::from_secs(60)).await;

    let urls: Vec<String> = proxy
        .pullers
        .attempts()
        .into_iter()
        .map(|a| a.url)
        .collect();
    assert_eq!(urls, vec![OLD_URL.to_string(), NEW_URL.to_string()]);
    assert_eq!(proxy.handle.url(), NEW_URL);
    // A redirect is a fresh attempt, not a retry.
    assert_eq!(proxy.handle.repull_count(), 0);
    assert_eq!(proxy.handle.connect_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_redirect_while_live_keeps_sink_and_one_puller() {
    let pullers = MockPullerFactory::builder()
        .with_tracks(vec![video_track()])
        .build();
    let proxy = TestProxy::spawn(config_with_retries(-1), pullers).await;

    proxy.handle.play(OLD_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Live);

    proxy.handle.play(NEW_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Live);

    assert_eq!(proxy.pullers.created(), 2);
    assert_eq!(proxy.pullers.torn_down(), 1);
    assert_eq!(proxy.pullers.max_alive(), 1);

    let sink = proxy.sinks.sink().unwrap();
    assert_eq!(proxy.sinks.created(), 1);
    assert_eq!(sink.bind_count(), 2);
    assert_eq!(sink.detach_count(), 1);

    // Redirecting is not an upstream failure.
    assert_eq!(proxy.callbacks.disconnects(), 0);
    assert_eq!(proxy.callbacks.connects().len(), 2);
    assert_eq!(proxy.callbacks.play_results(), vec![Ok(())]);
}

#[tokio::test(start_paused = true)]
async fn test_each_play_reports_to_its_own_one_shot() {
    let pullers = MockPullerFactory::builder()
        .with_tracks(vec![video_track()])
        .build();
    let proxy = TestProxy::spawn(config_with_retries(-1), pullers).await;

    proxy.handle.play(OLD_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.callbacks.play_results(), vec![Ok(())]);

    let second = Arc::new(Mutex::new(Vec::new()));
    let results = Arc::clone(&second);
    proxy
        .handle
        .set_play_callback_once(move |result| results.lock().unwrap().push(result))
        .await
        .unwrap();

    proxy.handle.play(NEW_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Live);
    assert_eq!(second.lock().unwrap().as_slice(), &[Ok(())]);

    // Consumed by the second play; a session drop does not re-fire it.
    proxy
        .pullers
        .drop_active_session(PullError::shutdown("peer reset"));
    settle().await;
    advance(Duration::from_secs(2)).await;
    assert_eq!(proxy.handle.state(), ProxyState::Live);
    assert_eq!(second.lock().unwrap().len(), 1);
    assert_eq!(proxy.callbacks.play_results(), vec![Ok(())]);
}

#[tokio::test(start_paused = true)]
async fn test_one_shot_for_next_play_reports_its_failure() {
    let pullers = MockPullerFactory::builder()
        .then(ConnectOutcome::Succeed)
        .default_fail()
        .build();
    let proxy = TestProxy::spawn(config_with_retries(0), pullers).await;

    proxy.handle.play(OLD_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Live);

    let second = Arc::new(Mutex::new(Vec::new()));
    let results = Arc::clone(&second);
    proxy
        .handle
        .set_play_callback_once(move |result| results.lock().unwrap().push(result))
        .await
        .unwrap();

    proxy.handle.play(NEW_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Stopped);

    let second = second.lock().unwrap();
    assert_eq!(second.len(), 1);
    assert!(second[0].is_err());
}

#[tokio::test(start_paused = true)]
async fn test_redirect_cancels_in_flight_attempt() {
    let pullers = MockPullerFactory::builder()
        .then(ConnectOutcome::Hang)
        .default_succeed()
        .build();
    let proxy = TestProxy::spawn(config_with_retries(-1), pullers).await;

    proxy.handle.play(OLD_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Connecting);

    proxy.handle.play(NEW_URL).await.unwrap();
    settle().await;

    assert_eq!(proxy.handle.state(), ProxyState::Live);
    assert_eq!(proxy.pullers.max_alive(), 1);
    assert_eq!(proxy.pullers.torn_down(), 1);
    // The cancelled attempt reports nothing.
    assert_eq!(proxy.callbacks.play_results(), vec![Ok(())]);
}

#[tokio::test(start_paused = true)]
async fn test_play_after_budget_exhausted_reuses_proxy() {
    let pullers = MockPullerFactory::builder().fail_times(1).build();
    let proxy = TestProxy::spawn(config_with_retries(0), pullers).await;

    proxy.handle.play(OLD_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Stopped);

    proxy.handle.play(NEW_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Live);
    assert_eq!(proxy.sinks.created(), 1);

    // The one-shot was consumed by the first failure.
    assert_eq!(proxy.callbacks.play_results().len(), 1);
    assert!(proxy.callbacks.play_results()[0].is_err());
    assert_eq!(proxy.callbacks.connects().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_redirect_resets_failure_count() {
    let pullers = MockPullerFactory::builder().default_fail().build();
    let proxy = TestProxy::spawn(config_with_retries(1), pullers).await;

    proxy.handle.play(OLD_URL).await.unwrap();
    settle().await;
    advance(Duration::from_secs(2)).await;
    assert_eq!(proxy.handle.state(), ProxyState::Stopped);

    // A new play gets a fresh budget: first attempt plus one retry.
    proxy.handle.play(NEW_URL).await.unwrap();
    settle().await;
    assert_eq!(proxy.handle.state(), ProxyState::Retrying);
    advance(Duration::from_secs(2)).await;
    assert_eq!(proxy.handle.state(), ProxyState::Stopped);
    assert_eq!(proxy.pullers.attempt_count(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_empty_url_rejected() {
    let pullers = MockPullerFactory::builder().build();
    let proxy = TestProxy::spawn(config_with_retries(-1), pullers).await;

    let err = proxy.handle.play("").await.unwrap_err();
    assert!(matches!(err, ProxyError::InvalidUrl(_)));
    assert_eq!(err.error_code(), 1);

    let err = proxy.handle.play("   ").await.unwrap_err();
    assert!(matches!(err, ProxyError::InvalidUrl(_)));

    settle().await;
    assert_eq!(proxy.pullers.created(), 0);
    assert_eq!(proxy.handle.state(), ProxyState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_play_after_shutdown_reports_actor_unavailable() {
    let pullers = MockPullerFactory::builder().build();
    let proxy = TestProxy::spawn(config_with_retries(-1), pullers).await;

    proxy.handle.shutdown().await;

    let err = proxy.handle.play(NEW_URL).await.unwrap_err();
    assert!(matches!(err, ProxyError::ActorUnavailable(_)));
    assert!(proxy.handle.is_cancelled());

    // Session drops from a stopped proxy's pullers are ignored.
    assert!(!proxy
        .pullers
        .drop_active_session(PullError::shutdown("late")));
}
