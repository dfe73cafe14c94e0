use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, Instrument};

use crate::config_definition::ScenarioConfig;
use crate::consumer::{run_consumer, ConsumerReport};
use crate::errors::ScenarioError;
use crate::producer::{run_producer, ProducerReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub name: String,
    pub produced: ProducerReport,
    pub consumed: ConsumerReport,
    pub total_msg_count: u64,
    pub expired: u64,
    pub held: usize,
    pub peak_window: Duration,
    pub peak_load: usize,
}

impl fmt::Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario:  {}", self.name)?;
        writeln!(
            f,
            "sent:      {} ({} accepted, {} rejected)",
            self.produced.sent, self.produced.accepted, self.produced.rejected
        )?;
        writeln!(f, "admitted:  {}", self.total_msg_count)?;
        writeln!(f, "delivered: {}", self.consumed.delivered)?;
        writeln!(f, "expired:   {}", self.expired)?;
        writeln!(f, "held:      {}", self.held)?;
        write!(
            f,
            "peak load: {} ops in {}ms",
            self.peak_load,
            self.peak_window.as_millis()
        )
    }
}

/// Runs every producer and the consumer against one fresh queue and reports
/// what happened to the messages.
pub async fn run_scenario(config: ScenarioConfig) -> Result<ScenarioReport, ScenarioError> {
    config.validate()?;
    let queue = Arc::new(config.queue.build()?);
    let producers_done = Arc::new(AtomicBool::new(false));

    let span = info_span!("run_scenario", scenario=%config.name, delay=?queue.delay());
    span.in_scope(|| info!("starting scenario"));

    let consumer = tokio::spawn(
        run_consumer(config.consumer.clone(), queue.clone(), producers_done.clone())
            .instrument(span.clone()),
    );

    let producers: Vec<_> = config
        .producers
        .iter()
        .cloned()
        .map(|producer| {
            tokio::spawn(run_producer(producer, queue.clone()).instrument(span.clone()))
        })
        .collect();

    let mut results = Vec::with_capacity(producers.len());
    for handle in producers {
        results.push(handle.await);
    }
    producers_done.store(true, Ordering::SeqCst);
    let consumed = consumer.await?;

    let mut produced = ProducerReport::default();
    for result in results {
        produced += result??;
    }

    let stats = queue.stats()?;
    let peak_window = Duration::from_millis(config.peak_window_ms);
    let report = ScenarioReport {
        name: config.name,
        produced,
        consumed,
        total_msg_count: queue.total_msg_count()?,
        expired: stats.expired,
        held: stats.held,
        peak_window,
        peak_load: queue.peak_load(peak_window)?,
    };
    span.in_scope(|| info!(delivered = report.consumed.delivered, "scenario finished"));
    Ok(report)
}
