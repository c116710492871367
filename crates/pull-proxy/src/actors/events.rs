//! The proxy's side of the sink event interface.

use super::messages::ProxyMessage;
use super::shared::ProxyShared;
use crate::sink::MediaSourceEvent;
use crate::types::{MediaTuple, OriginType, SockInfo, TrackType};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::debug;

/// Injected into the sink at creation.
///
/// The sink is stored inside [`ProxyShared`], so everything here is held
/// weakly: once the proxy is gone every request is refused and every query
/// falls back to its "not connected" answer.
pub struct ProxyEventHandler {
    mailbox: mpsc::WeakSender<ProxyMessage>,
    shared: Weak<ProxyShared>,
}

impl ProxyEventHandler {
    pub(crate) fn new(mailbox: mpsc::WeakSender<ProxyMessage>, shared: &Arc<ProxyShared>) -> Self {
        Self {
            mailbox,
            shared: Arc::downgrade(shared),
        }
    }
}

impl MediaSourceEvent for ProxyEventHandler {
    fn close(&self, sender: &MediaTuple) -> bool {
        let Some(mailbox) = self.mailbox.upgrade() else {
            debug!(target: "pull_proxy.events", sink = %sender, "Close requested after proxy stopped");
            return false;
        };
        match mailbox.try_send(ProxyMessage::CloseRequested) {
            Ok(()) => {
                debug!(target: "pull_proxy.events", sink = %sender, "Close request queued");
                true
            }
            Err(e) => {
                debug!(target: "pull_proxy.events", sink = %sender, error = %e, "Close request refused");
                false
            }
        }
    }

    fn total_reader_count(&self, _sender: &MediaTuple) -> usize {
        self.shared
            .upgrade()
            .map_or(0, |shared| shared.total_reader_count())
    }

    fn origin_type(&self, _sender: &MediaTuple) -> OriginType {
        OriginType::PullProxy
    }

    fn origin_url(&self, _sender: &MediaTuple) -> String {
        self.shared
            .upgrade()
            .map(|shared| shared.url())
            .unwrap_or_default()
    }

    fn origin_sock(&self, _sender: &MediaTuple) -> Option<SockInfo> {
        self.shared
            .upgrade()
            .and_then(|shared| shared.probe())
            .and_then(|probe| probe.endpoint())
    }

    fn loss_rate(&self, _sender: &MediaTuple, track_type: TrackType) -> Option<f32> {
        self.shared
            .upgrade()
            .and_then(|shared| shared.probe())
            .and_then(|probe| probe.loss_rate(track_type))
    }
}
