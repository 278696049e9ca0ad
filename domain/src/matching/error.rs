//! Assertion failures

use thiserror::Error;

/// A received message stream did not satisfy an expectation.
///
/// These are test failures, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("Function `{function}` was not called (calls seen: {seen:?})")]
    FunctionNotCalled { function: String, seen: Vec<String> },

    #[error("`{function}` was called {candidates} time(s), never with arguments {expected}")]
    NoMatchingCall {
        function: String,
        expected: String,
        candidates: usize,
    },

    #[error("Expected {expected} distinct call(s) to `{function}` matching {patterns}, only {matched} matching notification(s) arrived")]
    NotEnoughCalls {
        function: String,
        patterns: String,
        expected: usize,
        matched: usize,
    },

    #[error("Expected exactly one response to request {request_number}, found {found}")]
    ResponseCountMismatch { request_number: i64, found: usize },

    #[error("Response to request {request_number} differs at `{path}`: {reason}")]
    ResponseBodyMismatch {
        request_number: i64,
        path: String,
        reason: String,
    },

    #[error("Expected {expected} message(s), received {actual}")]
    UnexpectedMessageCount { expected: usize, actual: usize },

    #[error("Invalid pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
