//! Request numbering

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorrelatorError {
    #[error("No request has been issued yet")]
    NoRequestIssued,
}

/// Hands out request numbers for one session.
///
/// Numbers start at 1, strictly increase and are never reused, even when
/// requests go out over different connections of the same session.
#[derive(Debug, Clone)]
pub struct RequestCorrelator {
    next: i64,
    last: Option<i64>,
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self {
            next: 1,
            last: None,
        }
    }
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current counter value and advance it.
    pub fn next_request_number(&mut self) -> i64 {
        let number = self.next;
        self.next += 1;
        self.last = Some(number);
        number
    }

    /// The most recently issued number.
    pub fn last_request_number(&self) -> Result<i64, CorrelatorError> {
        self.last.ok_or(CorrelatorError::NoRequestIssued)
    }

    /// Whether `number` was handed out by this correlator.
    pub fn was_issued(&self, number: i64) -> bool {
        number >= 1 && number < self.next
    }
}
