use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};

/// Distinguishes remote-server time (used to read timestamps the API hands
/// back, e.g. `route.arrival`) from `monotonic()` deadline math (used for
/// local sleeps/backoff), so the two are never mixed. The remote server's
/// clock can differ from local by up to an hour; this type is the only place
/// that boundary is allowed to matter.
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
    fn monotonic(&self) -> Instant;
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

/// A controllable clock for tests: `now()` is fixed unless advanced, and
/// `monotonic()` is backed by the real `Instant` since deadline math in tests
/// cares only about relative ordering, not absolute wall time.
#[derive(Debug, Clone)]
pub struct FakeClock {
    epoch_millis: Arc<AtomicI64>,
}

impl FakeClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            epoch_millis: Arc::new(AtomicI64::new(now.timestamp_millis())),
        }
    }

    pub fn advance(&self, delta: chrono::Duration) {
        self.epoch_millis.fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.epoch_millis.load(Ordering::SeqCst)).expect("valid fake clock timestamp")
    }

    fn monotonic(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advancing_the_fake_clock_moves_now_forward() {
        let start = Utc::now();
        let clock = FakeClock::at(start);
        clock.advance(chrono::Duration::seconds(40));
        assert_eq!((clock.now() - start).num_seconds(), 40);
    }
}
