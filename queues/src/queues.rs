use internals::Message;
use tracing::{debug, error, info, instrument, warn};
use utils::{Clock, SystemClock};
use uuid::Uuid;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::errors::QueueError;
use crate::load::OperationLog;

/// Snapshot of the queue counters. Taking one is not an operation and does not
/// show up in the peak-load log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub admitted: u64,
    pub delivered: u64,
    pub expired: u64,
    pub held: usize,
}

#[derive(Default)]
struct QueueState {
    held: HashMap<Uuid, Message>,
    admitted: u64,
    delivered: u64,
    expired: u64,
    op_log: OperationLog,
}

impl QueueState {
    fn admit(&mut self, message: Message, now: Duration) -> Result<(), QueueError> {
        self.op_log.record(now);

        let id = message.id();
        if self.held.contains_key(&id) {
            return Err(QueueError::Duplicate(id));
        }

        self.held.insert(id, message);
        self.admitted += 1;
        Ok(())
    }

    fn expire(&mut self, now: Duration) -> usize {
        let before = self.held.len();
        self.held.retain(|id, message| {
            let expired = message.is_expired_at(now);
            if expired {
                debug!(uuid = %id, "transient message expired");
            }
            !expired
        });
        let dropped = before - self.held.len();
        self.expired += dropped as u64;
        dropped
    }

    /// Oldest held message, ties going to the smaller id.
    fn earliest(&self) -> Option<&Message> {
        self.held
            .values()
            .min_by_key(|message| (message.timestamp(), message.id()))
    }

    fn release(&mut self, now: Duration, delay: Duration) -> Option<Message> {
        self.op_log.record(now);

        if self.held.is_empty() {
            return None;
        }
        self.expire(now);

        let id = self
            .earliest()
            .filter(|candidate| candidate.is_eligible_at(now, delay))?
            .id();
        let message = self.held.remove(&id)?;
        self.delivered += 1;
        Some(message)
    }
}

/// Staging queue that holds every message for at least `delay` after its own
/// timestamp, then hands them out oldest first.
///
/// Messages are deduplicated by id while they are held. Transient messages that
/// outlive their lifetime are dropped on the next `get_next` and never
/// delivered. Every `add` and `get_next` call is timestamped for
/// [`DelayQueue::peak_load`].
///
/// All operations run under one lock and never wait for a message to become
/// ready; consumers are expected to poll.
pub struct DelayQueue<C: Clock = SystemClock> {
    delay: Duration,
    state: Mutex<QueueState>,
    clock: C,
}

impl DelayQueue<SystemClock> {
    pub fn new(delay: Duration) -> Self {
        Self::with_clock(delay, SystemClock)
    }

    /// Fails with [`QueueError::InvalidConfiguration`] on a negative delay.
    pub fn from_millis(delay_ms: i64) -> Result<Self, QueueError> {
        crate::config::QueueConfig::new(delay_ms).build()
    }
}

impl<C: Clock> DelayQueue<C> {
    pub fn with_clock(delay: Duration, clock: C) -> Self {
        Self {
            delay,
            state: Mutex::new(QueueState::default()),
            clock,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.state.lock().map_err(|e| {
            error!(error=%e, "queue state is unavailable");
            QueueError::Poisoned
        })
    }

    #[instrument(skip_all, fields(uuid = %message.id()))]
    pub fn try_add(&self, message: Message) -> Result<(), QueueError> {
        if message.is_no_message() {
            warn!("rejecting empty message");
            return Err(QueueError::InvalidInput(
                "cannot add the empty message".to_string(),
            ));
        }

        let mut state = self.lock_state()?;
        let now = self.clock.now();
        state
            .admit(message, now)
            .inspect_err(|_| warn!("message already held"))?;

        info!(held = state.held.len(), "message admitted");
        Ok(())
    }

    /// Returns `false` for the empty message and for an id that is already held.
    pub fn add(&self, message: Message) -> bool {
        self.try_add(message).is_ok()
    }

    /// Releases the oldest held message once it is at least `delay` old.
    ///
    /// Expired transient messages are swept first. If the oldest survivor is
    /// still too young nothing is returned, even when it is the only candidate:
    /// messages never leave out of timestamp order.
    #[instrument(skip_all)]
    pub fn try_get_next(&self) -> Result<Message, QueueError> {
        let mut state = self.lock_state()?;
        let now = self.clock.now();

        match state.release(now, self.delay) {
            Some(message) => {
                info!(uuid = %message.id(), held = state.held.len(), "message released");
                Ok(message)
            }
            None => {
                debug!(held = state.held.len(), "no message ready");
                Err(QueueError::NotReady)
            }
        }
    }

    /// `None` stands in for [`internals::NO_MESSAGE`].
    pub fn get_next(&self) -> Option<Message> {
        self.try_get_next().ok()
    }

    /// Number of messages ever admitted; does not shrink on delivery or expiry.
    pub fn total_msg_count(&self) -> Result<u64, QueueError> {
        Ok(self.lock_state()?.admitted)
    }

    /// Maximum number of `add`/`get_next` calls seen in any `window` anchored
    /// at one of those calls.
    #[instrument(skip_all, fields(window=?window))]
    pub fn peak_load(&self, window: Duration) -> Result<usize, QueueError> {
        let state = self.lock_state()?;
        Ok(state.op_log.peak_load(window))
    }

    pub fn stats(&self) -> Result<QueueStats, QueueError> {
        let state = self.lock_state()?;
        Ok(QueueStats {
            admitted: state.admitted,
            delivered: state.delivered,
            expired: state.expired,
            held: state.held.len(),
        })
    }

    /// Messages currently held, including expired transient ones the next
    /// `get_next` has not swept yet.
    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.lock_state()?.held.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use internals::{MessageBuilder, NO_MESSAGE};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use utils::ManualClock;

    const T: u64 = 1_700_000_000_000;

    fn at(offset_ms: u64) -> Duration {
        Duration::from_millis(T + offset_ms)
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn queue_with_clock(delay_ms: u64) -> (DelayQueue<ManualClock>, ManualClock) {
        let clock = ManualClock::starting_at(at(0));
        (DelayQueue::with_clock(ms(delay_ms), clock.clone()), clock)
    }

    fn message_at(offset_ms: u64) -> MessageBuilder {
        Message::builder(Uuid::new_v4())
            .receiver(Uuid::new_v4())
            .content("payload")
            .timestamp(at(offset_ms))
    }

    #[test]
    fn test_release_after_delay() {
        let (queue, clock) = queue_with_clock(100);
        let a = message_at(0).build().unwrap();
        let a_id = a.id();

        assert!(queue.add(a));

        clock.set(at(50));
        assert_eq!(queue.get_next(), None);

        clock.set(at(150));
        let released = queue.get_next().expect("message should be released");
        assert_eq!(released.id(), a_id);

        assert_eq!(queue.get_next(), None);
    }

    #[test]
    fn test_release_exactly_at_delay() {
        let (queue, clock) = queue_with_clock(100);
        queue.add(message_at(0).build().unwrap());

        clock.set(at(99));
        assert_eq!(queue.get_next(), None);
        clock.set(at(100));
        assert!(queue.get_next().is_some());
    }

    #[test]
    fn test_transient_expires_before_delay() {
        let (queue, clock) = queue_with_clock(100);
        let b = message_at(0).lifetime(ms(50)).build().unwrap();
        assert!(queue.add(b));

        clock.set(at(200));
        assert_eq!(queue.get_next(), None);
        assert!(queue.is_empty().unwrap());
        assert_eq!(queue.stats().unwrap().expired, 1);
        // counter is not touched by expiry
        assert_eq!(queue.total_msg_count().unwrap(), 1);
    }

    #[test]
    fn test_transient_delivered_while_alive() {
        let (queue, clock) = queue_with_clock(100);
        let msg = message_at(0).lifetime(ms(500)).build().unwrap();
        let id = msg.id();
        queue.add(msg);

        clock.set(at(120));
        assert_eq!(queue.get_next().map(|m| m.id()), Some(id));
    }

    #[test]
    fn test_transient_at_lifetime_boundary_is_not_expired() {
        let (queue, clock) = queue_with_clock(50);
        queue.add(message_at(0).lifetime(ms(50)).build().unwrap());

        clock.set(at(50));
        assert!(queue.get_next().is_some());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let (queue, _clock) = queue_with_clock(100);
        let id = Uuid::new_v4();
        let first = message_at(0).id(id).content("first").build().unwrap();
        let second = message_at(10).id(id).content("second").build().unwrap();

        assert!(queue.add(first));
        assert_eq!(queue.try_add(second), Err(QueueError::Duplicate(id)));
        assert_eq!(queue.len().unwrap(), 1);
        assert_eq!(queue.total_msg_count().unwrap(), 1);
    }

    #[test]
    fn test_id_can_be_reused_after_delivery() {
        let (queue, clock) = queue_with_clock(0);
        let id = Uuid::new_v4();
        assert!(queue.add(message_at(0).id(id).build().unwrap()));
        assert!(queue.get_next().is_some());

        clock.set(at(1));
        assert!(queue.add(message_at(1).id(id).build().unwrap()));
        assert_eq!(queue.total_msg_count().unwrap(), 2);
    }

    #[test]
    fn test_empty_message_rejected() {
        let (queue, _clock) = queue_with_clock(0);
        assert!(!queue.add(NO_MESSAGE));
        assert!(matches!(
            queue.try_add(Message::default()),
            Err(QueueError::InvalidInput(_))
        ));
        assert_eq!(queue.total_msg_count().unwrap(), 0);
        // rejected before touching the queue, so no load was recorded
        assert_eq!(queue.peak_load(ms(1_000)).unwrap(), 0);
    }

    #[test]
    fn test_earliest_first() {
        let (queue, clock) = queue_with_clock(100);
        let late = message_at(30).build().unwrap();
        let early = message_at(10).build().unwrap();
        let middle = message_at(20).build().unwrap();
        let (late_id, early_id, middle_id) = (late.id(), early.id(), middle.id());

        // arrival order differs from timestamp order
        queue.add(late);
        queue.add(early);
        queue.add(middle);

        clock.set(at(1_000));
        let order: Vec<Uuid> = std::iter::from_fn(|| queue.get_next())
            .map(|m| m.id())
            .collect();
        assert_eq!(order, vec![early_id, middle_id, late_id]);
    }

    #[test]
    fn test_young_head_blocks_release() {
        let (queue, clock) = queue_with_clock(100);
        queue.add(message_at(50).build().unwrap());
        let older = message_at(0).build().unwrap();
        let older_id = older.id();
        queue.add(older);

        clock.set(at(120));
        // the older one is due, the younger one is not
        assert_eq!(queue.get_next().map(|m| m.id()), Some(older_id));
        assert_eq!(queue.get_next(), None);
        clock.set(at(150));
        assert!(queue.get_next().is_some());
    }

    #[test]
    fn test_ties_broken_by_id() {
        let (queue, clock) = queue_with_clock(0);
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        queue.add(message_at(0).id(high).build().unwrap());
        queue.add(message_at(0).id(low).build().unwrap());

        clock.set(at(0));
        assert_eq!(queue.get_next().map(|m| m.id()), Some(low));
        assert_eq!(queue.get_next().map(|m| m.id()), Some(high));
    }

    #[test]
    fn test_expired_messages_are_not_selected() {
        let (queue, clock) = queue_with_clock(100);
        queue.add(message_at(0).lifetime(ms(10)).build().unwrap());
        let durable = message_at(5).build().unwrap();
        let durable_id = durable.id();
        queue.add(durable);

        clock.set(at(200));
        assert_eq!(queue.get_next().map(|m| m.id()), Some(durable_id));
        assert_eq!(
            queue.stats().unwrap(),
            QueueStats {
                admitted: 2,
                delivered: 1,
                expired: 1,
                held: 0,
            }
        );
    }

    #[test]
    fn test_add_does_not_expire() {
        let (queue, clock) = queue_with_clock(100);
        queue.add(message_at(0).lifetime(ms(10)).build().unwrap());
        clock.set(at(500));
        queue.add(message_at(500).build().unwrap());
        assert_eq!(queue.len().unwrap(), 2);
    }

    #[test]
    fn test_not_ready_error() {
        let (queue, _clock) = queue_with_clock(100);
        assert_eq!(queue.try_get_next(), Err(QueueError::NotReady));
    }

    #[test]
    fn test_every_call_is_logged() {
        let (queue, clock) = queue_with_clock(100);
        let dup = Uuid::new_v4();
        queue.add(message_at(0).id(dup).build().unwrap());
        queue.add(message_at(0).id(dup).build().unwrap()); // duplicate, still a call
        queue.get_next(); // nothing ready
        clock.set(at(2_000));
        queue.get_next();

        assert_eq!(queue.peak_load(ms(10)).unwrap(), 3);
        assert_eq!(queue.peak_load(ms(5_000)).unwrap(), 4);

        // reading counters is not an operation
        queue.total_msg_count().unwrap();
        queue.stats().unwrap();
        assert_eq!(queue.peak_load(ms(5_000)).unwrap(), 4);
    }

    #[test]
    fn test_from_millis_rejects_negative_delay() {
        assert!(matches!(
            DelayQueue::from_millis(-10),
            Err(QueueError::InvalidConfiguration(_))
        ));
        assert_eq!(DelayQueue::from_millis(10).unwrap().delay(), ms(10));
    }

    #[test]
    fn test_concurrent_producers_and_consumer() {
        let clock = ManualClock::starting_at(at(0));
        let queue = Arc::new(DelayQueue::with_clock(ms(0), clock.clone()));
        let mut handles = vec![];

        for _ in 0..8 {
            let q = Arc::clone(&queue);
            handles.push(thread::spawn(move || {
                for i in 0..25 {
                    assert!(q.add(message_at(i).build().unwrap()));
                }
            }));
        }

        let consumer = {
            let q = Arc::clone(&queue);
            thread::spawn(move || {
                let mut seen = HashSet::new();
                for _ in 0..10_000 {
                    if let Some(m) = q.get_next() {
                        assert!(seen.insert(m.id()), "message delivered twice");
                    }
                    if seen.len() == 200 {
                        break;
                    }
                }
                seen
            })
        };

        for h in handles {
            h.join().unwrap();
        }
        clock.set(at(1_000));

        let mut seen = consumer.join().unwrap();
        while let Some(m) = queue.get_next() {
            assert!(seen.insert(m.id()), "message delivered twice");
        }

        assert_eq!(seen.len(), 200);
        assert_eq!(queue.total_msg_count().unwrap(), 200);
        assert!(queue.is_empty().unwrap());
    }

    /// Panics once `broken` is set, from inside the queue's critical section.
    struct BreakableClock {
        inner: ManualClock,
        broken: Arc<AtomicBool>,
    }

    impl Clock for BreakableClock {
        fn now(&self) -> Duration {
            if self.broken.load(Ordering::SeqCst) {
                panic!("clock failure");
            }
            self.inner.now()
        }
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let broken = Arc::new(AtomicBool::new(false));
        let clock = BreakableClock {
            inner: ManualClock::starting_at(at(0)),
            broken: broken.clone(),
        };
        let queue = Arc::new(DelayQueue::with_clock(ms(100), clock));
        assert!(queue.add(message_at(0).build().unwrap()));

        broken.store(true, Ordering::SeqCst);
        let q = Arc::clone(&queue);
        assert!(thread::spawn(move || q.get_next()).join().is_err());
        broken.store(false, Ordering::SeqCst);

        // a poisoned queue must not look drained
        assert_eq!(queue.len(), Err(QueueError::Poisoned));
        assert_eq!(queue.is_empty(), Err(QueueError::Poisoned));
        assert_eq!(queue.stats(), Err(QueueError::Poisoned));
        assert_eq!(queue.total_msg_count(), Err(QueueError::Poisoned));
        assert_eq!(queue.peak_load(ms(1_000)), Err(QueueError::Poisoned));
        assert_eq!(queue.try_get_next(), Err(QueueError::Poisoned));
        assert!(!queue.add(message_at(1).build().unwrap()));
    }
}
