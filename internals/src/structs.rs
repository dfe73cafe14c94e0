use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

use crate::errors::MessageError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MessageType {
    #[default]
    SimpleMsg,
    Tweet,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::SimpleMsg => write!(f, "simple_msg"),
            MessageType::Tweet => write!(f, "tweet"),
        }
    }
}

impl FromStr for MessageType {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple_msg" | "simplemsg" | "simple" => Ok(MessageType::SimpleMsg),
            "tweet" => Ok(MessageType::Tweet),
            _ => Err(MessageError::UnknownType(s.to_string())),
        }
    }
}

/// Unit of pub/sub traffic.
///
/// All fields are fixed at construction. A message carrying a lifetime is
/// *transient*: once `now - timestamp` exceeds the lifetime it must never be
/// delivered.
///
/// Two messages are equal when their ids are equal, whatever their content.
#[derive(Clone, Debug)]
pub struct Message {
    id: Uuid,
    timestamp: Duration, // since UNIX_EPOCH, millisecond resolution
    sender: Uuid,
    receivers: Vec<Uuid>,
    content: String,
    message_type: MessageType,
    lifetime: Option<Duration>,
}

/// "No message available". Carries the nil id, which no builder accepts, so it
/// never collides with a real message.
pub const NO_MESSAGE: Message = Message {
    id: Uuid::nil(),
    timestamp: Duration::ZERO,
    sender: Uuid::nil(),
    receivers: Vec::new(),
    content: String::new(),
    message_type: MessageType::SimpleMsg,
    lifetime: None,
};

impl Default for Message {
    fn default() -> Self {
        NO_MESSAGE
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Message {}

impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Message {
    pub fn builder(sender: Uuid) -> MessageBuilder {
        MessageBuilder::new(sender)
    }

    /// Fresh id, stamped now, [`MessageType::SimpleMsg`].
    pub fn new(
        sender: Uuid,
        receivers: Vec<Uuid>,
        content: impl Into<String>,
    ) -> Result<Self, MessageError> {
        Self::builder(sender)
            .receivers(receivers)
            .content(content)
            .build()
    }

    pub fn to_one(sender: Uuid, receiver: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: utils::current_time_duration(),
            sender,
            receivers: vec![receiver],
            content: content.into(),
            message_type: MessageType::SimpleMsg,
            lifetime: None,
        }
    }

    pub fn transient(
        sender: Uuid,
        receivers: Vec<Uuid>,
        content: impl Into<String>,
        lifetime: Duration,
    ) -> Result<Self, MessageError> {
        Self::builder(sender)
            .receivers(receivers)
            .content(content)
            .lifetime(lifetime)
            .build()
    }

    pub fn transient_to_one(
        sender: Uuid,
        receiver: Uuid,
        content: impl Into<String>,
        lifetime: Duration,
    ) -> Self {
        Self {
            lifetime: Some(truncate_to_millis(lifetime)),
            ..Self::to_one(sender, receiver, content)
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn sender(&self) -> Uuid {
        self.sender
    }

    pub fn receivers(&self) -> &[Uuid] {
        &self.receivers
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn is_transient(&self) -> bool {
        self.lifetime.is_some()
    }

    /// `None` for plain messages.
    pub fn lifetime(&self) -> Option<Duration> {
        self.lifetime
    }

    pub fn is_no_message(&self) -> bool {
        self.id.is_nil()
    }

    /// Age at `now`; zero for a message stamped in the future.
    pub fn age_at(&self, now: Duration) -> Duration {
        now.saturating_sub(self.timestamp)
    }

    /// True once a transient message has outlived its lifetime. Plain messages
    /// never expire.
    pub fn is_expired_at(&self, now: Duration) -> bool {
        match self.lifetime {
            Some(lifetime) => now
                .checked_sub(self.timestamp)
                .is_some_and(|age| age > lifetime),
            None => false,
        }
    }

    /// True when `now - delay` is at or past the timestamp.
    pub fn is_eligible_at(&self, now: Duration, delay: Duration) -> bool {
        now.checked_sub(delay)
            .is_some_and(|cutoff| cutoff >= self.timestamp)
    }
}

/// Full-form construction of a [`Message`].
///
/// ```
/// use std::time::Duration;
/// use internals::{Message, MessageType};
/// use uuid::Uuid;
///
/// let msg = Message::builder(Uuid::new_v4())
///     .receiver(Uuid::new_v4())
///     .content("hello")
///     .message_type(MessageType::Tweet)
///     .lifetime(Duration::from_millis(500))
///     .build()
///     .unwrap();
/// assert!(msg.is_transient());
/// ```
#[derive(Clone, Debug)]
pub struct MessageBuilder {
    id: Option<Uuid>,
    timestamp: Option<Duration>,
    sender: Uuid,
    receivers: Vec<Uuid>,
    content: String,
    message_type: MessageType,
    lifetime_ms: Option<i64>,
}

impl MessageBuilder {
    pub fn new(sender: Uuid) -> Self {
        Self {
            id: None,
            timestamp: None,
            sender,
            receivers: Vec::new(),
            content: String::new(),
            message_type: MessageType::default(),
            lifetime_ms: None,
        }
    }

    pub fn id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    /// Since UNIX_EPOCH. Anything finer than a millisecond is dropped.
    pub fn timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn receiver(mut self, receiver: Uuid) -> Self {
        self.receivers.push(receiver);
        self
    }

    pub fn receivers(mut self, receivers: impl IntoIterator<Item = Uuid>) -> Self {
        self.receivers.extend(receivers);
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime_ms = Some(i64::try_from(lifetime.as_millis()).unwrap_or(i64::MAX));
        self
    }

    /// Signed form for values coming from configuration; negatives are
    /// rejected by [`MessageBuilder::build`].
    pub fn lifetime_millis(mut self, lifetime_ms: i64) -> Self {
        self.lifetime_ms = Some(lifetime_ms);
        self
    }

    pub fn build(self) -> Result<Message, MessageError> {
        let id = self.id.unwrap_or_else(Uuid::new_v4);
        if id.is_nil() {
            return Err(MessageError::ReservedId(id));
        }
        if self.receivers.is_empty() {
            return Err(MessageError::NoReceivers);
        }
        let lifetime = match self.lifetime_ms {
            Some(ms) if ms < 0 => return Err(MessageError::NegativeLifetime(ms)),
            Some(ms) => Some(Duration::from_millis(ms as u64)),
            None => None,
        };

        Ok(Message {
            id,
            timestamp: self
                .timestamp
                .map(truncate_to_millis)
                .unwrap_or_else(utils::current_time_duration),
            sender: self.sender,
            receivers: self.receivers,
            content: self.content,
            message_type: self.message_type,
            lifetime,
        })
    }
}

fn truncate_to_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}
