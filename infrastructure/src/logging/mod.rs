//! Wire transcript logging.
//!
//! Provides [`JsonlWireLogger`], a JSONL file writer that implements the
//! [`WireLogger`](harness_application::WireLogger) port.

mod jsonl_logger;

pub use jsonl_logger::JsonlWireLogger;
