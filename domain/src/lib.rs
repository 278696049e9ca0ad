//! Domain layer for padre-harness
//!
//! This crate contains the I/O-free core of the harness: the typed wire
//! messages exchanged with a PADRE debugger server, request correlation,
//! structural matching of messages against expectations, and the process
//! lifecycle model used for leak detection.
//!
//! # Core Concepts
//!
//! ## Wire messages
//!
//! The server writes two kinds of JSON values onto one TCP stream:
//!
//! - **Notification**: `["call", "<function>", [<arg>, ...]]`, unsolicited
//! - **Response**: `[<request number>, <body>]`, answering a client request
//!
//! Every decoded value is classified exactly once into [`Message`] and
//! matched exhaustively from then on.
//!
//! ## Expectations
//!
//! A test step states what it expects to receive as a list of
//! [`Expectation`]s and verifies the decoded messages against them.

pub mod matching;
pub mod session;
pub mod wire;

// Re-export commonly used types
pub use matching::{
    engine::{match_notifications, match_response},
    error::MatchError,
    expectation::{Expectation, ExpectedCall, expected_count, verify_all},
};
pub use session::{
    correlator::{CorrelatorError, RequestCorrelator},
    launch::{DEFAULT_HOST, LaunchError, LaunchSpec, ListenAddress, startup_banner},
    process::{ProcessState, ProcessTree},
};
pub use wire::{
    classifier::classify,
    error::ProtocolError,
    message::{CALL_TAG, Message, Notification, Request, Response},
};
