//! Actor implementation of the pull proxy.
//!
//! ```text
//! PullProxyHandle (cloneable)
//! └── PullProxyActor (one task per proxy)
//!     ├── attempt task (at most one; connect + timeout, cancellable)
//!     ├── retry timer (at most one)
//!     └── ProxyShared (atomics + snapshots read by handles and the sink)
//!         └── Sink ── ProxyEventHandler (weak back-references)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single owner**: only the actor task touches the puller, the callbacks
//!   and the timer; everything else goes through the mailbox
//! - **Weak back-references**: the sink's event handler holds a weak mailbox
//!   sender, so dropping every handle stops the proxy
//! - **Lock-free reads**: status, state, uptime and counters are atomics
//!
//! # Modules
//!
//! - [`proxy`] - `PullProxyActor` and its handle
//! - [`messages`] - Mailbox message types
//! - [`metrics`] - Live status, uptime and attempt counters
//! - [`events`] - The `MediaSourceEvent` implementation given to the sink
//! - [`shared`] - State shared between actor, handles and sink

pub mod events;
pub mod messages;
pub mod metrics;
pub mod proxy;
pub mod shared;

pub use events::ProxyEventHandler;
pub use messages::ProxyMessage;
pub use metrics::ProxyStats;
pub use proxy::{ProxySnapshot, PullProxyActor, PullProxyHandle};
pub use shared::ProxyShared;
