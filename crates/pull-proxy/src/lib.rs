//! Pull Proxy Library
//!
//! A self-healing stream-pull proxy: it connects to a remote media source
//! through a [`Puller`](puller::Puller), republishes the received tracks
//! through a local multiplexed [`Sink`](sink::Sink), and recovers from
//! connection loss by retrying with bounded backoff.
//!
//! # Architecture
//!
//! Each proxy is a single actor task that owns the whole state machine:
//!
//! ```text
//! PullProxyHandle (cloneable, lock-free reads)
//! └── PullProxyActor (one task per proxy)
//!     ├── owns the active Puller (one at a time, replaced per attempt)
//!     │   └── attempt task (connect + timeout, cancellable)
//!     ├── owns the retry timer (at most one pending)
//!     ├── binds the Sink (created once, rebound on every reconnect)
//!     │   └── ProxyEventHandler (injected into the Sink, weak mailbox)
//!     └── dispatches lifecycle callbacks
//! ```
//!
//! # Modules
//!
//! - [`actors`] - The proxy actor, its handle, messages and live stats
//! - [`backoff`] - Retry budget and reconnect delay policy
//! - [`callbacks`] - One-shot and repeatable lifecycle callbacks
//! - [`config`] - Proxy configuration from environment
//! - [`errors`] - Error types
//! - [`observability`] - Metrics, tracing setup and status endpoints
//! - [`puller`] - Upstream pull client interface
//! - [`sink`] - Republishing sink interface and its event capability
//! - [`types`] - Track and session snapshot records

pub mod actors;
pub mod backoff;
pub mod callbacks;
pub mod config;
pub mod errors;
pub mod observability;
pub mod puller;
pub mod sink;
pub mod types;

pub use actors::{PullProxyActor, PullProxyHandle};
pub use config::ProxyConfig;
pub use errors::{ProxyError, PullError, PullErrorKind};
