//! Message model shared by the staging queue and its producers.

pub mod errors;
pub mod structs;

pub use errors::MessageError;
pub use structs::{Message, MessageBuilder, MessageType, NO_MESSAGE};
