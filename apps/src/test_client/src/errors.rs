use std::path::PathBuf;

use internals::MessageError;
use queues::QueueError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Invalid path: {0}")]
    InvalidPath(PathBuf),

    #[error("Failed to read scenario: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
