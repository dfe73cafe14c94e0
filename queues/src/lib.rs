pub mod config;
pub mod errors;
pub mod load;
pub mod queues;

pub use config::QueueConfig;
pub use errors::QueueError;
pub use load::OperationLog;
pub use queues::{DelayQueue, QueueStats};
