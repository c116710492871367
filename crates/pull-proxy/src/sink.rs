//! Republishing sink interface.
//!
//! The sink fans tracks out to local subscribers. The proxy is its only
//! writer: it creates the sink once, on the first successful connection, and
//! re-feeds it with each new upstream session. In the other direction the sink
//! talks back through [`MediaSourceEvent`], which the proxy injects at
//! creation.

use crate::types::{MediaTuple, OriginType, ProtocolOption, SockInfo, TrackInfo, TrackType};
use std::sync::Arc;

/// Local multiplexed output for one [`MediaTuple`].
pub trait Sink: Send + Sync {
    /// Attach the tracks of a freshly connected session, replacing any
    /// previous ones.
    fn bind(&self, tracks: &[TrackInfo]);

    /// Number of subscribers currently reading.
    fn reader_count(&self) -> usize;

    /// Drop the current tracks while keeping readers attached.
    fn detach(&self);

    /// Release the sink for good.
    fn shutdown(&self);
}

/// Creates the sink on first successful connection.
pub trait SinkFactory: Send + Sync {
    fn create(
        &self,
        tuple: &MediaTuple,
        option: &ProtocolOption,
        events: Arc<dyn MediaSourceEvent>,
    ) -> Arc<dyn Sink>;
}

/// Capabilities the sink may invoke on the stream's origin.
///
/// Every call names the sink that makes it.
pub trait MediaSourceEvent: Send + Sync {
    /// Ask the origin to stop. Returns whether the request was accepted.
    fn close(&self, sender: &MediaTuple) -> bool;

    /// Subscribers across everything the origin feeds.
    fn total_reader_count(&self, sender: &MediaTuple) -> usize;

    fn origin_type(&self, sender: &MediaTuple) -> OriginType;

    /// Upstream URL being pulled.
    fn origin_url(&self, sender: &MediaTuple) -> String;

    /// Upstream endpoint, `None` while not connected.
    fn origin_sock(&self, sender: &MediaTuple) -> Option<SockInfo>;

    /// Measured upstream loss for a track, `None` while not connected.
    fn loss_rate(&self, sender: &MediaTuple, track_type: TrackType) -> Option<f32>;
}
