//! # Pull Proxy Test Utilities
//!
//! Mock implementations and fixtures for testing the pull proxy without a
//! real upstream or sink.
//!
//! ## Modules
//!
//! - `mock_puller` - Scriptable puller factory (fail/succeed/hang, session drops)
//! - `mock_sink` - Sink factory recording bindings, exposing the injected handler
//! - `fixtures` - Tracks, configs, callback recorder and a spawned test proxy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pull_proxy_test_utils::*;
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_example() {
//!     let pullers = MockPullerFactory::builder().fail_times(1).build();
//!     let proxy = TestProxy::spawn(config_with_retries(-1), pullers).await;
//!
//!     proxy.handle.play("rtsp://camera/1").await.unwrap();
//!     settle().await;
//!     advance(Duration::from_secs(2)).await;
//!
//!     assert_eq!(proxy.handle.repull_count(), 1);
//! }
//! ```

pub mod fixtures;
pub mod mock_puller;
pub mod mock_sink;

pub use fixtures::*;
pub use mock_puller::*;
pub use mock_sink::*;
