//! Test fixtures: tracks, tuples, configs and a callback recorder.

use crate::mock_puller::MockPullerFactory;
use crate::mock_sink::MockSinkFactory;
use pull_proxy::errors::PullError;
use pull_proxy::types::{
    AudioAttributes, MediaTuple, ProtocolOption, TrackInfo, TranslationInfo, VideoAttributes,
};
use pull_proxy::{ProxyConfig, PullProxyActor, PullProxyHandle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The stream every test proxy republishes.
#[must_use]
pub fn test_tuple() -> MediaTuple {
    MediaTuple::new("__defaultVhost__", "live", "test")
}

/// 1080p25 H.264 video track.
#[must_use]
pub fn video_track() -> TrackInfo {
    TrackInfo {
        bitrate: Some(4_000_000),
        video: Some(VideoAttributes {
            width: Some(1920),
            height: Some(1080),
            fps: Some(25.0),
        }),
        ..TrackInfo::video("H264")
    }
}

/// 48kHz stereo AAC track.
#[must_use]
pub fn audio_track() -> TrackInfo {
    TrackInfo {
        bitrate: Some(128_000),
        audio: Some(AudioAttributes {
            sample_rate: Some(48_000),
            sample_bit: Some(16),
            channel_count: Some(2),
        }),
        ..TrackInfo::audio("AAC")
    }
}

/// Default delays (2s/60s/3s) with the given retry budget.
#[must_use]
pub fn config_with_retries(retry_count: i32) -> ProxyConfig {
    ProxyConfig {
        retry_count,
        ..ProxyConfig::default()
    }
}

/// A lifecycle callback as observed by [`CallbackRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackEvent {
    PlayResult(Result<(), PullError>),
    Close(PullError),
    Disconnect,
    Connect(TranslationInfo),
}

/// Records every lifecycle callback in firing order.
#[derive(Debug, Clone, Default)]
pub struct CallbackRecorder {
    events: Arc<Mutex<Vec<CallbackEvent>>>,
}

impl CallbackRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register all four callbacks on `handle`.
    pub async fn install(&self, handle: &PullProxyHandle) {
        let events = Arc::clone(&self.events);
        handle
            .set_play_callback_once(move |result| {
                events.lock().unwrap().push(CallbackEvent::PlayResult(result));
            })
            .await
            .unwrap();

        let events = Arc::clone(&self.events);
        handle
            .set_on_close(move |reason| {
                events
                    .lock()
                    .unwrap()
                    .push(CallbackEvent::Close(reason.clone()));
            })
            .await
            .unwrap();

        let events = Arc::clone(&self.events);
        handle
            .set_on_disconnect(move || {
                events.lock().unwrap().push(CallbackEvent::Disconnect);
            })
            .await
            .unwrap();

        let events = Arc::clone(&self.events);
        handle
            .set_on_connect(move |info| {
                events
                    .lock()
                    .unwrap()
                    .push(CallbackEvent::Connect(info.clone()));
            })
            .await
            .unwrap();
    }

    /// All events so far.
    #[must_use]
    pub fn events(&self) -> Vec<CallbackEvent> {
        self.events.lock().unwrap().clone()
    }

    #[must_use]
    pub fn play_results(&self) -> Vec<Result<(), PullError>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                CallbackEvent::PlayResult(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn closes(&self) -> Vec<PullError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                CallbackEvent::Close(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn disconnects(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, CallbackEvent::Disconnect))
            .count()
    }

    #[must_use]
    pub fn connects(&self) -> Vec<TranslationInfo> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                CallbackEvent::Connect(info) => Some(info),
                _ => None,
            })
            .collect()
    }
}

/// A spawned proxy wired to mocks, with callbacks already recorded.
pub struct TestProxy {
    pub handle: PullProxyHandle,
    pub task: JoinHandle<()>,
    pub pullers: MockPullerFactory,
    pub sinks: MockSinkFactory,
    pub callbacks: CallbackRecorder,
}

impl TestProxy {
    /// Spawn a proxy for [`test_tuple`] and install a [`CallbackRecorder`].
    pub async fn spawn(config: ProxyConfig, pullers: MockPullerFactory) -> Self {
        let sinks = MockSinkFactory::new();
        let (handle, task) = PullProxyActor::spawn(
            test_tuple(),
            ProtocolOption::default(),
            config,
            Arc::new(pullers.clone()),
            Arc::new(sinks.clone()),
            CancellationToken::new(),
        );

        let callbacks = CallbackRecorder::new();
        callbacks.install(&handle).await;

        Self {
            handle,
            task,
            pullers,
            sinks,
            callbacks,
        }
    }
}

/// Let spawned tasks run until they block.
///
/// With paused time this drains every ready task without moving the clock.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Advance paused time by `by`, then let tasks react.
pub async fn advance(by: Duration) {
    tokio::time::advance(by).await;
    settle().await;
}
