use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Duplicate message: {0}")]
    Duplicate(Uuid),

    #[error("No message ready")]
    NotReady,

    #[error("Queue state is unavailable: lock poisoned")]
    Poisoned,
}
