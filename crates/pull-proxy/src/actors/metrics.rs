//! Lock-free live statistics for one proxy.
//!
//! The actor is the only writer; handles and the sink's event handler read
//! from any thread without touching the actor mailbox.

use crate::types::{LiveStatus, ProxyState};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use tokio::time::Instant;

/// Top bit of `live_clock`: set while live.
const LIVE_FLAG: u64 = 1 << 63;

/// Counters and live-time accounting shared between the actor and its handles.
///
/// Uptime lives in a single word so readers never observe a torn update:
/// while live it holds the anchor `now - accumulated` (with [`LIVE_FLAG`]),
/// otherwise the accumulated milliseconds.
#[derive(Debug)]
pub struct ProxyStats {
    live_status: AtomicU8,
    state: AtomicU8,
    live_clock: AtomicU64,
    repull_count: AtomicU64,
    connect_attempts: AtomicU64,
    clock_base: Instant,
}

impl Default for ProxyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyStats {
    #[must_use]
    pub fn new() -> Self {
        Self {
            live_status: AtomicU8::new(LiveStatus::Connecting as u8),
            state: AtomicU8::new(ProxyState::Idle as u8),
            live_clock: AtomicU64::new(0),
            repull_count: AtomicU64::new(0),
            connect_attempts: AtomicU64::new(0),
            clock_base: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.clock_base.elapsed().as_millis()).unwrap_or(u64::MAX >> 1)
    }

    /// Coarse live status.
    #[must_use]
    pub fn status(&self) -> LiveStatus {
        LiveStatus::from_u8(self.live_status.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn state(&self) -> ProxyState {
        ProxyState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ProxyState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Count a connect attempt. Retries also bump the re-pull counter.
    pub fn record_attempt(&self, is_retry: bool) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        if is_retry {
            self.repull_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn repull_count(&self) -> u64 {
        self.repull_count.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn connect_attempts(&self) -> u64 {
        self.connect_attempts.load(Ordering::Relaxed)
    }

    /// Flip to live and start accumulating uptime.
    ///
    /// Returns `false` if the proxy was already live.
    pub fn mark_live(&self) -> bool {
        let previous = self
            .live_status
            .swap(LiveStatus::Live as u8, Ordering::AcqRel);
        if LiveStatus::from_u8(previous) == LiveStatus::Live {
            return false;
        }
        let accumulated = self.live_clock.load(Ordering::Acquire) & !LIVE_FLAG;
        let anchor = self.now_ms().saturating_sub(accumulated);
        self.live_clock.store(anchor | LIVE_FLAG, Ordering::Release);
        self.set_state(ProxyState::Live);
        true
    }

    /// Leave live and fold the current session into the accumulated uptime.
    ///
    /// Returns `true` if the proxy was live.
    pub fn settle_live(&self) -> bool {
        let previous = self
            .live_status
            .swap(LiveStatus::Connecting as u8, Ordering::AcqRel);
        if LiveStatus::from_u8(previous) != LiveStatus::Live {
            return false;
        }
        let clock = self.live_clock.load(Ordering::Acquire);
        if clock & LIVE_FLAG != 0 {
            let accumulated = self.now_ms().saturating_sub(clock & !LIVE_FLAG);
            self.live_clock.store(accumulated, Ordering::Release);
        }
        true
    }

    /// Cumulative time spent live, in milliseconds.
    #[must_use]
    pub fn live_millis(&self) -> u64 {
        let clock = self.live_clock.load(Ordering::Acquire);
        if clock & LIVE_FLAG == 0 {
            clock
        } else {
            self.now_ms().saturating_sub(clock & !LIVE_FLAG)
        }
    }

    /// Cumulative time spent live, in whole seconds.
    #[must_use]
    pub fn live_secs(&self) -> u64 {
        self.live_millis() / 1000
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_initial_values() {
        let stats = ProxyStats::new();
        assert_eq!(stats.status(), LiveStatus::Connecting);
        assert_eq!(stats.state(), ProxyState::Idle);
        assert_eq!(stats.live_secs(), 0);
        assert_eq!(stats.repull_count(), 0);
        assert_eq!(stats.connect_attempts(), 0);
    }

    #[test]
    fn test_record_attempt_counts_retries_separately() {
        let stats = ProxyStats::new();
        stats.record_attempt(false);
        stats.record_attempt(true);
        stats.record_attempt(true);

        assert_eq!(stats.connect_attempts(), 3);
        assert_eq!(stats.repull_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_time_accumulates_only_while_live() {
        let stats = ProxyStats::new();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(stats.live_secs(), 0);

        assert!(stats.mark_live());
        assert_eq!(stats.status(), LiveStatus::Live);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(stats.live_secs(), 10);

        assert!(stats.settle_live());
        assert_eq!(stats.status(), LiveStatus::Connecting);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(stats.live_secs(), 10);

        assert!(stats.mark_live());
        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(stats.live_secs(), 13);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_transitions_are_idempotent() {
        let stats = ProxyStats::new();
        assert!(!stats.settle_live());

        assert!(stats.mark_live());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!stats.mark_live());
        assert_eq!(stats.live_secs(), 2);

        assert!(stats.settle_live());
        assert!(!stats.settle_live());
        assert_eq!(stats.live_secs(), 2);
    }
}
