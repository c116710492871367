//! Upstream pull client interface.
//!
//! A [`Puller`] performs the protocol handshake against a remote source and
//! exposes the decoded tracks. The proxy owns exactly one at a time and asks
//! the [`PullerFactory`] for a fresh one on every attempt.

use crate::errors::PullError;
use crate::types::{ProtocolOption, SockInfo, TrackInfo, TrackType};
use std::sync::Arc;
use tokio::sync::oneshot;

/// Resolves once an established session ends, carrying the reason.
///
/// If the puller drops the sending half without a reason the proxy treats it
/// as a plain shutdown.
pub type ShutdownReceiver = oneshot::Receiver<PullError>;

/// One upstream pull session.
#[async_trait::async_trait]
pub trait Puller: Send {
    /// Connect to `url` and start receiving media.
    ///
    /// On success returns a receiver that resolves when the session drops.
    async fn connect(&mut self, url: &str) -> Result<ShutdownReceiver, PullError>;

    /// Tracks decoded from the session, in attachment order.
    ///
    /// Only meaningful after a successful `connect`.
    fn tracks(&self) -> Vec<TrackInfo>;

    /// Live statistics readable from any thread while the session runs.
    fn probe(&self) -> Arc<dyn PullerProbe>;

    /// Release the session. Must be safe to call on a puller that never
    /// connected.
    async fn teardown(&mut self);
}

/// Read-only view into a running puller.
pub trait PullerProbe: Send + Sync {
    /// Current ingest throughput in bytes per second.
    fn bytes_per_second(&self) -> i64;

    /// Socket endpoints of the session, if connected.
    fn endpoint(&self) -> Option<SockInfo>;

    /// Measured packet loss for the given track, if the protocol reports it.
    fn loss_rate(&self, track_type: TrackType) -> Option<f32>;
}

/// Creates a fresh [`Puller`] per attempt.
pub trait PullerFactory: Send + Sync {
    fn create(&self, url: &str, option: &ProtocolOption) -> Box<dyn Puller>;
}
