use internals::MessageError;
use queues::QueueConfig;
use serde_derive::Deserialize;

use crate::errors::ScenarioError;

const DEFAULT_PEAK_WINDOW_MS: u64 = 1000;

/// A staging run: one delay queue, some producers feeding it and one consumer
/// polling it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub queue: QueueConfig,
    #[serde(default = "default_peak_window_ms")]
    pub peak_window_ms: u64,
    pub producers: Vec<Producer>,
    pub consumer: Consumer,
}

fn default_peak_window_ms() -> u64 {
    DEFAULT_PEAK_WINDOW_MS
}

#[derive(Default, Debug, Clone, PartialEq, Deserialize)]
pub struct Producer {
    pub name: String,
    pub messages_produced: u32,
    #[serde(default)]
    pub message_payload_bytes: usize,
    #[serde(default)]
    pub post_message_delay_ms: u64,
    /// `simple_msg` or `tweet`
    #[serde(default)]
    pub message_type: Option<String>,
    /// Makes every message transient with this lifetime.
    #[serde(default)]
    pub transient_lifetime_ms: Option<i64>,
    /// Re-send the previous message after every n-th one.
    #[serde(default)]
    pub resend_every: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Consumer {
    pub name: String,
    pub poll_interval_ms: u64,
    /// Give up once producers are done and nothing was released for this long.
    pub idle_timeout_ms: u64,
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.queue.delay()?;

        if self.consumer.poll_interval_ms == 0 {
            return Err(ScenarioError::InvalidScenario(format!(
                "consumer '{}' needs a poll interval above 0ms",
                self.consumer.name
            )));
        }
        for producer in &self.producers {
            if producer.resend_every == Some(0) {
                return Err(ScenarioError::InvalidScenario(format!(
                    "producer '{}' has resend_every set to 0",
                    producer.name
                )));
            }
            if let Some(ms) = producer.transient_lifetime_ms.filter(|ms| *ms < 0) {
                return Err(MessageError::NegativeLifetime(ms).into());
            }
            if let Some(kind) = &producer.message_type {
                kind.parse::<internals::MessageType>()?;
            }
        }
        Ok(())
    }

    /// Used when no scenario file is given.
    pub fn demo() -> Self {
        ScenarioConfig {
            name: "demo".to_string(),
            queue: QueueConfig::new(200),
            peak_window_ms: DEFAULT_PEAK_WINDOW_MS,
            producers: vec![
                Producer {
                    name: "feed".to_string(),
                    messages_produced: 20,
                    message_payload_bytes: 16,
                    post_message_delay_ms: 25,
                    message_type: Some("tweet".to_string()),
                    transient_lifetime_ms: None,
                    resend_every: Some(5),
                },
                Producer {
                    name: "alerts".to_string(),
                    messages_produced: 10,
                    message_payload_bytes: 8,
                    post_message_delay_ms: 40,
                    message_type: None,
                    transient_lifetime_ms: Some(100),
                    resend_every: None,
                },
            ],
            consumer: Consumer {
                name: "poller".to_string(),
                poll_interval_ms: 50,
                idle_timeout_ms: 1000,
            },
        }
    }
}
