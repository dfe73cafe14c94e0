use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageError {
    #[error("Reserved message id: {0}")]
    ReservedId(Uuid),

    #[error("Message must have at least one receiver")]
    NoReceivers,

    #[error("Negative lifetime: {0}ms")]
    NegativeLifetime(i64),

    #[error("Unknown message type: {0}")]
    UnknownType(String),
}
