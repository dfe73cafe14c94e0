use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use queues::DelayQueue;
use utils::Clock;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::config_definition::Consumer;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerReport {
    pub delivered: u64,
    pub ticks: u64,
    /// Set when the consumer stopped because the queue state was poisoned.
    pub aborted: bool,
}

/// Polls the queue on a fixed interval and drains whatever is ready.
///
/// Stops once `producers_done` is set and the queue is empty, when nothing has
/// been released for `idle_timeout_ms` after the producers finished, or when the
/// queue can no longer be read.
#[instrument(skip_all, fields(consumer=%consumer.name))]
pub async fn run_consumer<C: Clock>(
    consumer: Consumer,
    queue: Arc<DelayQueue<C>>,
    producers_done: Arc<AtomicBool>,
) -> ConsumerReport {
    let mut report = ConsumerReport::default();
    let idle_timeout = Duration::from_millis(consumer.idle_timeout_ms);
    let mut interval = tokio::time::interval(Duration::from_millis(consumer.poll_interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut quiet_since = Instant::now();

    info!("consuming");
    loop {
        interval.tick().await;
        report.ticks += 1;

        while let Some(message) = queue.get_next() {
            report.delivered += 1;
            quiet_since = Instant::now();
            debug!(
                uuid = %message.id(),
                age_ms = message.age_at(utils::current_time_duration()).as_millis() as u64,
                "delivered"
            );
        }

        if !producers_done.load(Ordering::SeqCst) {
            quiet_since = Instant::now();
            continue;
        }
        let held = match queue.len() {
            Ok(held) => held,
            Err(e) => {
                error!(error=%e, "queue is unavailable, stopping");
                report.aborted = true;
                break;
            }
        };
        if held == 0 {
            break;
        }
        if quiet_since.elapsed() >= idle_timeout {
            warn!(held, "giving up on held messages");
            break;
        }
    }

    info!(delivered = report.delivered, "consumer finished");
    report
}
