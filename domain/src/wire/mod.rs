//! Wire-level message model.
//!
//! - [`message`]: the closed [`Message`](message::Message) type and the outgoing [`Request`](message::Request)
//! - [`classifier`]: turns a decoded JSON value into a `Message`
//! - [`error`]: protocol violations

pub mod classifier;
pub mod error;
pub mod message;
