use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{distributions::Alphanumeric, thread_rng, Rng};

/// Generates a random alphanumeric string of a given length.
///
/// # Examples
///
/// ```
/// let random_string = utils::generate_random_string(10);
/// assert_eq!(random_string.len(), 10);
/// ```
pub fn generate_random_string(length: usize) -> String {
    let rng = thread_rng();
    rng.sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Utility function for getting current time as milliseconds since UNIX_EPOCH.
///
/// Sub-millisecond precision is dropped. A system clock set before the epoch
/// reads as zero.
///
/// # Examples
///
/// ```
/// let now = utils::current_time_duration();
/// assert_eq!(now.subsec_nanos() % 1_000_000, 0);
/// ```
pub fn current_time_duration() -> Duration {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    Duration::from_millis(saturating_millis(since_epoch))
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Source of wall-clock readings, as a duration since UNIX_EPOCH.
pub trait Clock: Send + Sync {
    fn now(&self) -> Duration;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        current_time_duration()
    }
}

/// Clock that only moves when told to.
///
/// Clones share the same reading, so a test can keep one handle and give the
/// other to the component under test.
///
/// ```
/// use std::time::Duration;
/// use utils::{Clock, ManualClock};
///
/// let clock = ManualClock::starting_at(Duration::from_millis(1_000));
/// let handle = clock.clone();
/// handle.advance(Duration::from_millis(50));
/// assert_eq!(clock.now(), Duration::from_millis(1_050));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(start: Duration) -> Self {
        let clock = Self::new();
        clock.set(start);
        clock
    }

    pub fn set(&self, at: Duration) {
        self.millis.store(saturating_millis(at), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let by = saturating_millis(by);
        let _ = self
            .millis
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |ms| {
                Some(ms.saturating_add(by))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}
