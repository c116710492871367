//! Lifecycle callbacks.
//!
//! All callbacks run on the proxy actor task, in transition order. Missing
//! callbacks are skipped.

use crate::errors::PullError;
use crate::types::TranslationInfo;
use tracing::debug;

/// Receives the outcome of the first attempt of a `play()`. Fires at most
/// once per `play()`.
pub type PlayResultCallback = Box<dyn FnOnce(Result<(), PullError>) + Send>;

/// Invoked when the sink asks the proxy to stop.
pub type OnCloseCallback = Box<dyn FnMut(&PullError) + Send>;

/// Invoked when the proxy loses its upstream.
pub type OnDisconnectCallback = Box<dyn FnMut() + Send>;

/// Invoked after every successful connection.
pub type OnConnectCallback = Box<dyn FnMut(&TranslationInfo) + Send>;

/// Callback slots owned by the actor.
#[derive(Default)]
pub struct Callbacks {
    play_result: Option<PlayResultCallback>,
    play_result_fired: bool,
    on_close: Option<OnCloseCallback>,
    on_disconnect: Option<OnDisconnectCallback>,
    on_connect: Option<OnConnectCallback>,
}

impl Callbacks {
    /// Install the one-shot play-result callback, replacing any unfired one.
    ///
    /// If the current `play()` has already reported its outcome, the callback
    /// waits for the next `play()`.
    pub fn set_play_result(&mut self, cb: PlayResultCallback) {
        if self.play_result_fired {
            debug!(target: "pull_proxy.events", "Play result already reported, callback armed for next play");
        }
        self.play_result = Some(cb);
    }

    /// Start a new `play()` lifetime: the next outcome is reported again.
    ///
    /// An installed callback that has not fired yet is kept.
    pub fn rearm_play_result(&mut self) {
        self.play_result_fired = false;
    }

    pub fn set_on_close(&mut self, cb: OnCloseCallback) {
        self.on_close = Some(cb);
    }

    pub fn set_on_disconnect(&mut self, cb: OnDisconnectCallback) {
        self.on_disconnect = Some(cb);
    }

    pub fn set_on_connect(&mut self, cb: OnConnectCallback) {
        self.on_connect = Some(cb);
    }

    /// Report the first-attempt outcome. No-op until the next rearm.
    pub fn fire_play_result(&mut self, result: Result<(), PullError>) {
        if self.play_result_fired {
            return;
        }
        self.play_result_fired = true;
        if let Some(cb) = self.play_result.take() {
            cb(result);
        }
    }

    pub fn fire_on_close(&mut self, reason: &PullError) {
        if let Some(cb) = self.on_close.as_mut() {
            cb(reason);
        }
    }

    pub fn fire_on_disconnect(&mut self) {
        if let Some(cb) = self.on_disconnect.as_mut() {
            cb();
        }
    }

    pub fn fire_on_connect(&mut self, info: &TranslationInfo) {
        if let Some(cb) = self.on_connect.as_mut() {
            cb(info);
        }
    }
}
