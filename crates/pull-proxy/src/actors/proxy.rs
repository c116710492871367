//! `PullProxyActor` - one actor per pulled stream.
//!
//! The actor owns the whole reconnect state machine:
//!
//! ```text
//! Idle --play--> Connecting --ok--> Live --drop--> Retrying --timer--> Connecting
//!                    |                |                ^
//!                    +----fail--------+----------------+  (budget left)
//!                    +----fail, budget exhausted-----> Stopped
//! Live/Connecting/Retrying --active close--> Stopped (or Retrying if standing)
//! ```
//!
//! # Lifecycle
//!
//! 1. Spawned with its media tuple, protocol option and retry config
//! 2. Runs until every handle is dropped or the cancellation token fires
//! 3. On exit cancels the retry timer, tears down the puller and shuts the
//!    sink down

use super::events::ProxyEventHandler;
use super::messages::ProxyMessage;
use super::shared::ProxyShared;
use crate::backoff::{Backoff, RetryDecision, RetryPolicy};
use crate::callbacks::Callbacks;
use crate::config::{url_for_log, ProxyConfig};
use crate::errors::{ProxyError, PullError, PullErrorKind};
use crate::observability::metrics;
use crate::puller::{Puller, PullerFactory, ShutdownReceiver};
use crate::sink::SinkFactory;
use crate::types::{LiveStatus, MediaTuple, ProtocolOption, ProxyState, TranslationInfo};

use serde::Serialize;
use std::fmt;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Channel buffer size for the proxy mailbox.
const PROXY_CHANNEL_BUFFER: usize = 32;

/// Point-in-time view of a proxy for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ProxySnapshot {
    /// Upstream URL with credentials masked.
    pub url: String,
    pub media_tuple: MediaTuple,
    pub state: ProxyState,
    pub status: i32,
    pub live_secs: u64,
    pub repull_count: u64,
    pub connect_attempts: u64,
    pub reader_count: usize,
    pub translation: TranslationInfo,
}

/// Handle to a `PullProxyActor`.
///
/// Cheap to clone. Queries read shared atomics and never wait on the actor.
#[derive(Clone)]
pub struct PullProxyHandle {
    sender: mpsc::Sender<ProxyMessage>,
    cancel_token: CancellationToken,
    shared: Arc<ProxyShared>,
}

impl fmt::Debug for PullProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PullProxyHandle")
            .field("media_tuple", self.shared.media_tuple())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PullProxyHandle {
    /// Start pulling `url`.
    ///
    /// Cancels any pending retry and tears down the current puller first;
    /// the sink is kept. Connection failures are reported through callbacks,
    /// never here.
    pub async fn play(&self, url: impl Into<String>) -> Result<(), ProxyError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(ProxyError::InvalidUrl("URL must not be empty".to_string()));
        }

        let (tx, rx) = oneshot::channel();
        self.send(ProxyMessage::Play {
            url,
            respond_to: tx,
        })
        .await?;
        rx.await
            .map_err(|e| ProxyError::ActorUnavailable(format!("play not acknowledged: {e}")))
    }

    /// Install the callback that receives the first attempt's outcome.
    ///
    /// Fires once per `play()`. Installed after the current `play()` has
    /// reported, it fires for the next one.
    pub async fn set_play_callback_once<F>(&self, cb: F) -> Result<(), ProxyError>
    where
        F: FnOnce(Result<(), PullError>) + Send + 'static,
    {
        self.send(ProxyMessage::SetPlayResult(Box::new(cb))).await
    }

    pub async fn set_on_close<F>(&self, cb: F) -> Result<(), ProxyError>
    where
        F: FnMut(&PullError) + Send + 'static,
    {
        self.send(ProxyMessage::SetOnClose(Box::new(cb))).await
    }

    pub async fn set_on_disconnect<F>(&self, cb: F) -> Result<(), ProxyError>
    where
        F: FnMut() + Send + 'static,
    {
        self.send(ProxyMessage::SetOnDisconnect(Box::new(cb))).await
    }

    pub async fn set_on_connect<F>(&self, cb: F) -> Result<(), ProxyError>
    where
        F: FnMut(&TranslationInfo) + Send + 'static,
    {
        self.send(ProxyMessage::SetOnConnect(Box::new(cb))).await
    }

    async fn send(&self, message: ProxyMessage) -> Result<(), ProxyError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| ProxyError::ActorUnavailable(format!("channel send failed: {e}")))
    }

    /// Subscribers of the sink, 0 before it exists.
    #[must_use]
    pub fn total_reader_count(&self) -> usize {
        self.shared.total_reader_count()
    }

    #[must_use]
    pub fn status(&self) -> LiveStatus {
        self.shared.stats.status()
    }

    #[must_use]
    pub fn state(&self) -> ProxyState {
        self.shared.stats.state()
    }

    /// Cumulative seconds spent live.
    #[must_use]
    pub fn live_secs(&self) -> u64 {
        self.shared.stats.live_secs()
    }

    /// Retried attempts since construction (the first attempt of a `play()`
    /// is not a retry).
    #[must_use]
    pub fn repull_count(&self) -> u64 {
        self.shared.stats.repull_count()
    }

    /// All attempts since construction.
    #[must_use]
    pub fn connect_attempts(&self) -> u64 {
        self.shared.stats.connect_attempts()
    }

    /// Snapshot captured at the last successful connection.
    #[must_use]
    pub fn translation_info(&self) -> TranslationInfo {
        self.shared.translation_info()
    }

    #[must_use]
    pub fn url(&self) -> String {
        self.shared.url()
    }

    #[must_use]
    pub fn media_tuple(&self) -> &MediaTuple {
        self.shared.media_tuple()
    }

    #[must_use]
    pub fn option(&self) -> &ProtocolOption {
        self.shared.option()
    }

    #[must_use]
    pub fn snapshot(&self) -> ProxySnapshot {
        ProxySnapshot {
            url: url_for_log(&self.url()),
            media_tuple: self.media_tuple().clone(),
            state: self.state(),
            status: self.status().code(),
            live_secs: self.live_secs(),
            repull_count: self.repull_count(),
            connect_attempts: self.connect_attempts(),
            reader_count: self.total_reader_count(),
            translation: self.translation_info(),
        }
    }

    /// Whether the actor task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Cancel the proxy actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Cancel the actor and wait until it has released puller and sink.
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        self.sender.closed().await;
    }
}

/// Result of an attempt task. `None` when cancelled; the task has already
/// torn its puller down.
type AttemptOutcome = Option<(Box<dyn Puller>, Result<ShutdownReceiver, PullError>)>;

/// A connect attempt running on its own task.
struct InFlight {
    number: u64,
    started: Instant,
    token: CancellationToken,
    task: JoinHandle<AttemptOutcome>,
}

/// An established upstream session.
struct LiveSession {
    puller: Box<dyn Puller>,
    shutdown: ShutdownReceiver,
}

/// The `PullProxyActor` implementation.
pub struct PullProxyActor {
    shared: Arc<ProxyShared>,
    config: ProxyConfig,
    pullers: Arc<dyn PullerFactory>,
    sinks: Arc<dyn SinkFactory>,
    receiver: mpsc::Receiver<ProxyMessage>,
    /// Weak so the sink's handler never keeps the actor alive.
    mailbox: mpsc::WeakSender<ProxyMessage>,
    cancel_token: CancellationToken,
    callbacks: Callbacks,
    backoff: Backoff,
    attempt: Option<InFlight>,
    session: Option<LiveSession>,
    retry_timer: Option<Pin<Box<Sleep>>>,
    attempt_seq: u64,
    ever_live: bool,
}

impl PullProxyActor {
    /// Spawn a new proxy actor.
    ///
    /// Returns a handle and the task join handle. Nothing is pulled until
    /// [`PullProxyHandle::play`] is called.
    pub fn spawn(
        tuple: MediaTuple,
        option: ProtocolOption,
        config: ProxyConfig,
        pullers: Arc<dyn PullerFactory>,
        sinks: Arc<dyn SinkFactory>,
        cancel_token: CancellationToken,
    ) -> (PullProxyHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(PROXY_CHANNEL_BUFFER);
        let shared = Arc::new(ProxyShared::new(tuple, option));

        let actor = Self {
            shared: Arc::clone(&shared),
            backoff: Backoff::new(RetryPolicy::from(&config)),
            config,
            pullers,
            sinks,
            receiver,
            mailbox: sender.downgrade(),
            cancel_token: cancel_token.clone(),
            callbacks: Callbacks::default(),
            attempt: None,
            session: None,
            retry_timer: None,
            attempt_seq: 0,
            ever_live: false,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = PullProxyHandle {
            sender,
            cancel_token,
            shared,
        };

        (handle, task_handle)
    }

    /// Run the actor loop.
    #[instrument(
        skip_all,
        name = "pull_proxy.actor",
        fields(stream = %self.shared.media_tuple())
    )]
    async fn run(mut self) {
        debug!(target: "pull_proxy.actor", "PullProxyActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(target: "pull_proxy.actor", "PullProxyActor received cancellation signal");
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            debug!(target: "pull_proxy.actor", "All handles dropped");
                            break;
                        }
                    }
                }

                (number, started, result) = wait_attempt(&mut self.attempt) => {
                    self.attempt = None;
                    self.on_attempt_finished(number, started, result).await;
                }

                () = wait_retry(&mut self.retry_timer) => {
                    self.retry_timer = None;
                    self.start_attempt(true);
                }

                reason = wait_session_end(&mut self.session) => {
                    self.on_session_lost(reason).await;
                }
            }
        }

        self.release().await;
        debug!(target: "pull_proxy.actor", "PullProxyActor stopped");
    }

    async fn handle_message(&mut self, message: ProxyMessage) {
        match message {
            ProxyMessage::Play { url, respond_to } => {
                self.play(url).await;
                let _ = respond_to.send(());
            }
            ProxyMessage::SetPlayResult(cb) => self.callbacks.set_play_result(cb),
            ProxyMessage::SetOnClose(cb) => self.callbacks.set_on_close(cb),
            ProxyMessage::SetOnDisconnect(cb) => self.callbacks.set_on_disconnect(cb),
            ProxyMessage::SetOnConnect(cb) => self.callbacks.set_on_connect(cb),
            ProxyMessage::CloseRequested => self.on_close_requested().await,
        }
    }

    async fn play(&mut self, url: String) {
        info!(
            target: "pull_proxy.actor",
            url = %url_for_log(&url),
            "Play requested"
        );

        self.retry_timer = None;
        self.cancel_attempt().await;
        self.end_session().await;

        self.shared.set_url(url);
        self.backoff.reset();
        self.callbacks.rearm_play_result();
        self.start_attempt(false);
    }

    /// Create a fresh puller and connect it on a child task.
    fn start_attempt(&mut self, is_retry: bool) {
        let url = self.shared.url();
        let puller = self.pullers.create(&url, self.shared.option());

        self.attempt_seq += 1;
        let number = self.attempt_seq;
        self.shared.stats.record_attempt(is_retry);
        self.shared.stats.set_state(ProxyState::Connecting);

        debug!(
            target: "pull_proxy.attempt",
            attempt = number,
            is_retry,
            url = %url_for_log(&url),
            "Starting connect attempt"
        );

        let token = self.cancel_token.child_token();
        let task = tokio::spawn(run_attempt(
            puller,
            url,
            self.config.connect_timeout,
            token.clone(),
        ));

        self.attempt = Some(InFlight {
            number,
            started: Instant::now(),
            token,
            task,
        });
    }

    async fn on_attempt_finished(
        &mut self,
        number: u64,
        started: Instant,
        result: Result<AttemptOutcome, JoinError>,
    ) {
        let elapsed = started.elapsed();
        match result {
            Ok(Some((puller, Ok(shutdown)))) => {
                metrics::record_connect_attempt("success", elapsed);
                self.on_connected(number, puller, shutdown);
            }
            Ok(Some((mut puller, Err(reason)))) => {
                puller.teardown().await;
                let outcome = if reason.kind() == PullErrorKind::Timeout {
                    "timeout"
                } else {
                    "failed"
                };
                metrics::record_connect_attempt(outcome, elapsed);
                warn!(
                    target: "pull_proxy.attempt",
                    attempt = number,
                    error = %reason,
                    "Connect attempt failed"
                );
                self.on_failure(reason, false);
            }
            Ok(None) => {
                metrics::record_connect_attempt("cancelled", elapsed);
                debug!(target: "pull_proxy.attempt", attempt = number, "Attempt cancelled");
            }
            Err(e) => {
                metrics::record_connect_attempt("failed", elapsed);
                warn!(
                    target: "pull_proxy.attempt",
                    attempt = number,
                    error = %e,
                    "Attempt task failed"
                );
                self.on_failure(PullError::other(format!("attempt task failed: {e}")), false);
            }
        }
    }

    fn on_connected(&mut self, number: u64, puller: Box<dyn Puller>, shutdown: ShutdownReceiver) {
        let tracks = puller.tracks();
        let probe = puller.probe();

        match self.shared.sink() {
            Some(sink) => sink.bind(&tracks),
            None => {
                let events = Arc::new(ProxyEventHandler::new(self.mailbox.clone(), &self.shared));
                let sink = self
                    .sinks
                    .create(self.shared.media_tuple(), self.shared.option(), events);
                self.shared.install_sink(sink).bind(&tracks);
                debug!(target: "pull_proxy.actor", "Sink created");
            }
        }

        let translation =
            TranslationInfo::capture(&tracks, probe.bytes_per_second(), epoch_millis());
        self.shared.set_translation_info(translation.clone());
        self.shared.set_probe(Some(probe));
        self.session = Some(LiveSession { puller, shutdown });

        self.shared.stats.mark_live();
        self.shared.stats.set_state(ProxyState::Live);
        self.ever_live = true;
        self.backoff.reset();

        info!(
            target: "pull_proxy.actor",
            attempt = number,
            tracks = tracks.len(),
            byte_speed = translation.byte_speed,
            "Upstream connected"
        );

        self.callbacks.fire_play_result(Ok(()));
        self.callbacks.fire_on_connect(&translation);
    }

    async fn on_session_lost(&mut self, reason: PullError) {
        self.end_session().await;
        // Tracks and start time stay as the last session left them.
        self.shared.reset_byte_speed();
        metrics::record_disconnect(reason.kind().as_str());
        warn!(
            target: "pull_proxy.actor",
            error = %reason,
            live_secs = self.shared.stats.live_secs(),
            "Upstream session lost"
        );
        self.on_failure(reason, true);
    }

    /// Common failure path. The puller is already gone.
    fn on_failure(&mut self, reason: PullError, was_live: bool) {
        self.callbacks.fire_play_result(Err(reason));

        let notified = was_live || self.ever_live;
        if notified {
            self.callbacks.fire_on_disconnect();
        }

        match self.backoff.record_failure() {
            RetryDecision::Retry { attempt, delay } => self.schedule_retry(attempt, delay),
            RetryDecision::GiveUp { failures } => {
                self.shared.stats.set_state(ProxyState::Stopped);
                metrics::record_budget_exhausted();
                warn!(
                    target: "pull_proxy.actor",
                    failures,
                    retry_count = self.config.retry_count,
                    "Retry budget exhausted, giving up"
                );
                if !notified {
                    self.callbacks.fire_on_disconnect();
                }
            }
        }
    }

    /// Arm the single retry timer, replacing any previous one.
    fn schedule_retry(&mut self, retry: u32, delay: Duration) {
        self.shared.stats.set_state(ProxyState::Retrying);
        self.retry_timer = Some(Box::pin(tokio::time::sleep(delay)));
        metrics::record_reconnect_scheduled(delay);
        info!(
            target: "pull_proxy.actor",
            retry,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Reconnect scheduled"
        );
    }

    async fn on_close_requested(&mut self) {
        info!(
            target: "pull_proxy.actor",
            state = %self.shared.stats.state(),
            "Active close requested"
        );

        self.retry_timer = None;
        self.cancel_attempt().await;
        self.end_session().await;
        metrics::record_active_close();

        let reason = PullError::closed_by_request();
        self.callbacks.fire_play_result(Err(reason.clone()));
        self.callbacks.fire_on_close(&reason);

        if self.config.standing_connection && !self.shared.url().is_empty() {
            match self.backoff.record_failure() {
                RetryDecision::Retry { attempt, delay } => {
                    self.schedule_retry(attempt, delay);
                    return;
                }
                RetryDecision::GiveUp { failures } => {
                    metrics::record_budget_exhausted();
                    warn!(
                        target: "pull_proxy.actor",
                        failures,
                        "Retry budget exhausted after active close"
                    );
                }
            }
        }
        self.shared.stats.set_state(ProxyState::Stopped);
    }

    /// Cancel the in-flight attempt and wait for its puller to be released.
    async fn cancel_attempt(&mut self) {
        let Some(inflight) = self.attempt.take() else {
            return;
        };
        inflight.token.cancel();
        match inflight.task.await {
            // Finished before it saw the cancellation.
            Ok(Some((mut puller, _))) => puller.teardown().await,
            Ok(None) => {}
            Err(e) => {
                warn!(target: "pull_proxy.attempt", error = %e, "Cancelled attempt task failed");
            }
        }
        debug!(
            target: "pull_proxy.attempt",
            attempt = inflight.number,
            "Superseded connect attempt"
        );
    }

    /// Tear down the live session, if any, and settle uptime.
    async fn end_session(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.puller.teardown().await;
        self.shared.set_probe(None);
        self.shared.stats.settle_live();
        if let Some(sink) = self.shared.sink() {
            sink.detach();
        }
    }

    async fn release(&mut self) {
        self.retry_timer = None;
        self.cancel_attempt().await;
        self.end_session().await;
        if let Some(sink) = self.shared.sink() {
            sink.shutdown();
        }
        self.shared.stats.set_state(ProxyState::Stopped);
    }
}

/// Connect `puller` to `url`, bounded by `timeout` and cancellable.
async fn run_attempt(
    mut puller: Box<dyn Puller>,
    url: String,
    timeout: Duration,
    token: CancellationToken,
) -> AttemptOutcome {
    let result = tokio::select! {
        () = token.cancelled() => None,
        result = tokio::time::timeout(timeout, puller.connect(&url)) => {
            Some(result.unwrap_or_else(|_| Err(PullError::timeout(timeout))))
        }
    };

    match result {
        Some(result) => Some((puller, result)),
        None => {
            puller.teardown().await;
            None
        }
    }
}

async fn wait_attempt(
    slot: &mut Option<InFlight>,
) -> (u64, Instant, Result<AttemptOutcome, JoinError>) {
    match slot {
        Some(inflight) => {
            let result = (&mut inflight.task).await;
            (inflight.number, inflight.started, result)
        }
        None => pending().await,
    }
}

async fn wait_retry(slot: &mut Option<Pin<Box<Sleep>>>) {
    match slot {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

async fn wait_session_end(slot: &mut Option<LiveSession>) -> PullError {
    match slot {
        Some(session) => (&mut session.shutdown)
            .await
            .unwrap_or_else(|_| PullError::shutdown("puller went away")),
        None => pending().await,
    }
}

fn epoch_millis() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
