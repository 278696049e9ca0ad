//! Structural matching of received messages.
//!
//! - [`engine`]: notification and response matchers
//! - [`pattern`]: regex and string-form helpers
//! - [`expectation`]: expectations a test step waits for
//! - [`error`]: assertion failures

pub mod engine;
pub mod error;
pub mod expectation;
pub mod pattern;
