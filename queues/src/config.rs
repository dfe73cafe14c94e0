use std::time::Duration;

use serde::Deserialize;
use utils::{Clock, SystemClock};

use crate::errors::QueueError;
use crate::queues::DelayQueue;

/// Queue settings as they arrive from a config file or the command line.
///
/// The delay is signed here so a bad value can be reported instead of wrapping.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct QueueConfig {
    pub delay_ms: i64,
}

impl QueueConfig {
    pub fn new(delay_ms: i64) -> Self {
        Self { delay_ms }
    }

    pub fn delay(&self) -> Result<Duration, QueueError> {
        u64::try_from(self.delay_ms)
            .map(Duration::from_millis)
            .map_err(|_| {
                QueueError::InvalidConfiguration(format!(
                    "delay must be >= 0, got {}ms",
                    self.delay_ms
                ))
            })
    }

    pub fn build(&self) -> Result<DelayQueue<SystemClock>, QueueError> {
        self.build_with_clock(SystemClock)
    }

    pub fn build_with_clock<C: Clock>(&self, clock: C) -> Result<DelayQueue<C>, QueueError> {
        Ok(DelayQueue::with_clock(self.delay()?, clock))
    }
}
