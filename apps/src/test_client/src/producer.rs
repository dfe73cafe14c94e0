use std::ops::AddAssign;
use std::sync::Arc;
use std::time::Duration;

use internals::{Message, MessageType};
use queues::DelayQueue;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config_definition::Producer;
use crate::errors::ScenarioError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProducerReport {
    pub sent: u32,
    pub accepted: u32,
    pub rejected: u32,
}

impl AddAssign for ProducerReport {
    fn add_assign(&mut self, other: Self) {
        self.sent += other.sent;
        self.accepted += other.accepted;
        self.rejected += other.rejected;
    }
}

impl ProducerReport {
    fn record(&mut self, accepted: bool) {
        self.sent += 1;
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }
}

pub fn build_message(
    producer: &Producer,
    sender: Uuid,
    index: u32,
) -> Result<Message, ScenarioError> {
    let message_type = match &producer.message_type {
        Some(kind) => kind.parse::<MessageType>()?,
        None => MessageType::default(),
    };
    let content = index.to_string()
        + " "
        + &utils::generate_random_string(producer.message_payload_bytes);

    let builder = Message::builder(sender)
        .receiver(Uuid::new_v4())
        .content(content)
        .message_type(message_type);
    let builder = match producer.transient_lifetime_ms {
        Some(lifetime_ms) => builder.lifetime_millis(lifetime_ms),
        None => builder,
    };
    Ok(builder.build()?)
}

#[instrument(skip_all, fields(producer=%producer.name))]
pub async fn run_producer(
    producer: Producer,
    queue: Arc<DelayQueue>,
) -> Result<ProducerReport, ScenarioError> {
    let sender = Uuid::new_v4();
    let mut report = ProducerReport::default();
    info!(messages_to_produce=%producer.messages_produced, "producing messages");

    for index in 1..=producer.messages_produced {
        let message = build_message(&producer, sender, index)?;
        let resend = producer
            .resend_every
            .filter(|every| index % every == 0)
            .map(|_| message.clone());

        report.record(queue.add(message));

        if let Some(duplicate) = resend {
            let uuid = duplicate.id();
            let accepted = queue.add(duplicate);
            if accepted {
                warn!(%uuid, "re-sent message was accepted, original already left the queue");
            } else {
                debug!(%uuid, "re-sent message rejected as duplicate");
            }
            report.record(accepted);
        }

        tokio::time::sleep(Duration::from_millis(producer.post_message_delay_ms)).await;
    }

    info!(
        sent = report.sent,
        accepted = report.accepted,
        rejected = report.rejected,
        "produced all messages"
    );
    Ok(report)
}
