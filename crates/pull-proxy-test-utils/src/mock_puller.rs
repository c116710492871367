//! Scriptable mock puller for proxy tests.
//!
//! Every attempt pops the next scripted outcome; once the script runs out the
//! default outcome is used.
//!
//! # Example
//!
//! ```rust,ignore
//! use pull_proxy_test_utils::MockPullerFactory;
//!
//! let pullers = MockPullerFactory::builder()
//!     .fail_times(2)
//!     .default_succeed()
//!     .with_tracks(vec![video_track()])
//!     .build();
//!
//! // ... spawn a proxy with `pullers.clone()`, then later:
//! pullers.drop_active_session(PullError::shutdown("peer reset"));
//! ```

use pull_proxy::errors::PullError;
use pull_proxy::puller::{Puller, PullerFactory, PullerProbe, ShutdownReceiver};
use pull_proxy::types::{ProtocolOption, SockInfo, TrackInfo, TrackType};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::time::Instant;

/// What a single connect attempt does.
#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    /// Fail the handshake with this error.
    Fail(PullError),
    /// Connect; the session stays up until dropped or torn down.
    Succeed,
    /// Never finish (exercises the connect timeout and cancellation).
    Hang,
}

/// One recorded `connect` call.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub url: String,
    pub at: Instant,
}

#[derive(Debug)]
struct MockProbe {
    byte_speed: i64,
    endpoint: Option<SockInfo>,
    loss_rate: Option<f32>,
}

impl PullerProbe for MockProbe {
    fn bytes_per_second(&self) -> i64 {
        self.byte_speed
    }

    fn endpoint(&self) -> Option<SockInfo> {
        self.endpoint.clone()
    }

    fn loss_rate(&self, _track_type: TrackType) -> Option<f32> {
        self.loss_rate
    }
}

/// Mock puller factory. Clones share state, so the test keeps one clone and
/// hands another to the proxy.
#[derive(Debug, Clone)]
pub struct MockPullerFactory {
    state: Arc<FactoryState>,
}

#[derive(Debug)]
struct FactoryState {
    script: Mutex<VecDeque<ConnectOutcome>>,
    default_outcome: ConnectOutcome,
    tracks: Vec<TrackInfo>,
    probe: Arc<MockProbe>,
    attempts: Mutex<Vec<AttemptRecord>>,
    created: AtomicUsize,
    torn_down: AtomicUsize,
    alive: AtomicUsize,
    max_alive: AtomicUsize,
    active_session: Mutex<Option<oneshot::Sender<PullError>>>,
}

impl MockPullerFactory {
    /// Create a new builder.
    #[must_use]
    pub fn builder() -> MockPullerFactoryBuilder {
        MockPullerFactoryBuilder::default()
    }

    /// Pullers created so far.
    #[must_use]
    pub fn created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    /// Pullers torn down so far.
    #[must_use]
    pub fn torn_down(&self) -> usize {
        self.state.torn_down.load(Ordering::SeqCst)
    }

    /// Pullers currently in existence.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.state.alive.load(Ordering::SeqCst)
    }

    /// Highest number of pullers that existed at the same time.
    #[must_use]
    pub fn max_alive(&self) -> usize {
        self.state.max_alive.load(Ordering::SeqCst)
    }

    /// Every `connect` call, in order.
    #[must_use]
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.state.attempts.lock().unwrap().clone()
    }

    /// Number of `connect` calls.
    #[must_use]
    pub fn attempt_count(&self) -> usize {
        self.state.attempts.lock().unwrap().len()
    }

    /// Whether a connected session is currently up.
    #[must_use]
    pub fn has_active_session(&self) -> bool {
        self.state.active_session.lock().unwrap().is_some()
    }

    /// Simulate the upstream dropping the connected session.
    ///
    /// Returns `false` if no session was up.
    pub fn drop_active_session(&self, reason: PullError) -> bool {
        match self.state.active_session.lock().unwrap().take() {
            Some(tx) => tx.send(reason).is_ok(),
            None => false,
        }
    }

    /// Append outcomes to the script.
    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = ConnectOutcome>) {
        self.state.script.lock().unwrap().extend(outcomes);
    }
}

impl FactoryState {
    fn next_outcome(&self) -> ConnectOutcome {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_outcome.clone())
    }
}

impl PullerFactory for MockPullerFactory {
    fn create(&self, url: &str, _option: &ProtocolOption) -> Box<dyn Puller> {
        self.state.created.fetch_add(1, Ordering::SeqCst);
        let alive = self.state.alive.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_alive.fetch_max(alive, Ordering::SeqCst);

        Box::new(MockPuller {
            factory: Arc::clone(&self.state),
            created_for: url.to_string(),
            connected: false,
            torn_down: false,
        })
    }
}

/// Builder for [`MockPullerFactory`].
#[derive(Debug)]
pub struct MockPullerFactoryBuilder {
    script: VecDeque<ConnectOutcome>,
    default_outcome: ConnectOutcome,
    tracks: Vec<TrackInfo>,
    byte_speed: i64,
    endpoint: Option<SockInfo>,
    loss_rate: Option<f32>,
}

impl Default for MockPullerFactoryBuilder {
    fn default() -> Self {
        Self {
            script: VecDeque::new(),
            default_outcome: ConnectOutcome::Succeed,
            tracks: Vec::new(),
            byte_speed: 0,
            endpoint: None,
            loss_rate: None,
        }
    }
}

impl MockPullerFactoryBuilder {
    /// Fail the next `n` attempts with a connect error.
    #[must_use]
    pub fn fail_times(mut self, n: usize) -> Self {
        for i in 0..n {
            self.script.push_back(ConnectOutcome::Fail(PullError::connect(format!(
                "scripted failure {}",
                i + 1
            ))));
        }
        self
    }

    /// Append one scripted outcome.
    #[must_use]
    pub fn then(mut self, outcome: ConnectOutcome) -> Self {
        self.script.push_back(outcome);
        self
    }

    /// Succeed once the script runs out (the default).
    #[must_use]
    pub fn default_succeed(mut self) -> Self {
        self.default_outcome = ConnectOutcome::Succeed;
        self
    }

    /// Fail every attempt once the script runs out.
    #[must_use]
    pub fn default_fail(mut self) -> Self {
        self.default_outcome = ConnectOutcome::Fail(PullError::connect("connection refused"));
        self
    }

    /// Hang every attempt once the script runs out.
    #[must_use]
    pub fn default_hang(mut self) -> Self {
        self.default_outcome = ConnectOutcome::Hang;
        self
    }

    #[must_use]
    pub fn with_tracks(mut self, tracks: Vec<TrackInfo>) -> Self {
        self.tracks = tracks;
        self
    }

    #[must_use]
    pub fn with_byte_speed(mut self, byte_speed: i64) -> Self {
        self.byte_speed = byte_speed;
        self
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: SockInfo) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    #[must_use]
    pub fn with_loss_rate(mut self, loss_rate: f32) -> Self {
        self.loss_rate = Some(loss_rate);
        self
    }

    /// Build the factory.
    #[must_use]
    pub fn build(self) -> MockPullerFactory {
        let state = FactoryState {
            script: Mutex::new(self.script),
            default_outcome: self.default_outcome,
            tracks: self.tracks,
            probe: Arc::new(MockProbe {
                byte_speed: self.byte_speed,
                endpoint: self.endpoint,
                loss_rate: self.loss_rate,
            }),
            attempts: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
            torn_down: AtomicUsize::new(0),
            alive: AtomicUsize::new(0),
            max_alive: AtomicUsize::new(0),
            active_session: Mutex::new(None),
        };
        MockPullerFactory {
            state: Arc::new(state),
        }
    }
}

/// Puller handed out by [`MockPullerFactory`].
#[derive(Debug)]
pub struct MockPuller {
    factory: Arc<FactoryState>,
    created_for: String,
    connected: bool,
    torn_down: bool,
}

#[async_trait::async_trait]
impl Puller for MockPuller {
    async fn connect(&mut self, url: &str) -> Result<ShutdownReceiver, PullError> {
        assert_eq!(url, self.created_for, "connect URL differs from create URL");
        self.factory.attempts.lock().unwrap().push(AttemptRecord {
            url: url.to_string(),
            at: Instant::now(),
        });

        match self.factory.next_outcome() {
            ConnectOutcome::Fail(err) => Err(err),
            ConnectOutcome::Succeed => {
                let (tx, rx) = oneshot::channel();
                *self.factory.active_session.lock().unwrap() = Some(tx);
                self.connected = true;
                Ok(rx)
            }
            ConnectOutcome::Hang => std::future::pending().await,
        }
    }

    fn tracks(&self) -> Vec<TrackInfo> {
        self.factory.tracks.clone()
    }

    fn probe(&self) -> Arc<dyn PullerProbe> {
        self.factory.probe.clone()
    }

    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.factory.torn_down.fetch_add(1, Ordering::SeqCst);
        if self.connected {
            self.factory.active_session.lock().unwrap().take();
        }
    }
}

impl Drop for MockPuller {
    fn drop(&mut self) {
        self.factory.alive.fetch_sub(1, Ordering::SeqCst);
    }
}
