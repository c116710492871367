//! Messages accepted by the proxy actor.

use crate::callbacks::{
    OnCloseCallback, OnConnectCallback, OnDisconnectCallback, PlayResultCallback,
};
use std::fmt;
use tokio::sync::oneshot;

/// Messages sent to the `PullProxyActor`.
pub enum ProxyMessage {
    /// Start pulling `url`, replacing whatever is in progress.
    ///
    /// Acknowledged once the first attempt has been started.
    Play {
        url: String,
        respond_to: oneshot::Sender<()>,
    },

    /// Install the one-shot play-result callback.
    SetPlayResult(PlayResultCallback),

    SetOnClose(OnCloseCallback),

    SetOnDisconnect(OnDisconnectCallback),

    SetOnConnect(OnConnectCallback),

    /// Active close requested by the sink.
    CloseRequested,
}

impl fmt::Debug for ProxyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyMessage::Play { .. } => f.write_str("Play"),
            ProxyMessage::SetPlayResult(_) => f.write_str("SetPlayResult"),
            ProxyMessage::SetOnClose(_) => f.write_str("SetOnClose"),
            ProxyMessage::SetOnDisconnect(_) => f.write_str("SetOnDisconnect"),
            ProxyMessage::SetOnConnect(_) => f.write_str("SetOnConnect"),
            ProxyMessage::CloseRequested => f.write_str("CloseRequested"),
        }
    }
}
