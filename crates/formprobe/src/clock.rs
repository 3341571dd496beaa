//! Clocks for bounded waits.
//!
//! Every wait in the engine goes through a [`Clock`], so the same polling code
//! runs against real time in a browser session and against virtual time in
//! tests. [`VirtualClock`] never blocks: sleeping advances its time, which
//! makes poll timings exact and reproducible.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Monotonic time source with an async sleep
#[async_trait]
pub trait Clock: Send + Sync + Debug {
    /// Time elapsed since the clock was created
    fn elapsed(&self) -> Duration;

    /// Suspend for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Thread-safe clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Wall-clock time backed by tokio
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: tokio::time::Instant,
}

impl SystemClock {
    /// Create a clock starting now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }

    /// Create a shared handle
    #[must_use]
    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual time for deterministic tests
///
/// Time only moves when something sleeps or [`advance`](Self::advance) is
/// called.
#[derive(Debug, Default)]
pub struct VirtualClock {
    /// Current virtual time in microseconds
    now_us: AtomicU64,
    /// Number of sleeps performed
    sleeps: AtomicU64,
}

impl VirtualClock {
    /// Create a clock at virtual time zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared handle
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Move virtual time forward
    pub fn advance(&self, duration: Duration) {
        self.now_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    /// Number of sleeps observed so far
    #[must_use]
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Clock for VirtualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_micros(self.now_us.load(Ordering::SeqCst))
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        self.advance(duration);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_clock_starts_at_zero() {
        let clock = VirtualClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[test]
    fn test_virtual_clock_advance() {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_millis(150));
        clock.advance(Duration::from_millis(50));
        assert_eq!(clock.elapsed(), Duration::from_millis(200));
    }

    #[test]
    fn test_virtual_sleep_advances_without_blocking() {
        let clock = VirtualClock::new();
        futures::executor::block_on(clock.sleep(Duration::from_secs(3600)));
        assert_eq!(clock.elapsed(), Duration::from_secs(3600));
        assert_eq!(clock.sleep_count(), 1);
    }

    #[test]
    fn test_shared_virtual_clock_is_shared() {
        let clock = VirtualClock::shared();
        let as_dyn: SharedClock = clock.clone();
        clock.advance(Duration::from_millis(10));
        assert_eq!(as_dyn.elapsed(), Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_system_clock_sleep() {
        let clock = SystemClock::new();
        clock.sleep(Duration::from_millis(250)).await;
        assert!(clock.elapsed() >= Duration::from_millis(250));
    }
}
