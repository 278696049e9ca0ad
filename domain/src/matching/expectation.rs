//! Expectations a test step waits for.

use super::engine::{call_matches, match_notifications, match_response};
use super::error::MatchError;
use crate::wire::message::Message;
use serde_json::Value;

/// One expected `["call", function, args]` notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedCall {
    pub function: String,
    pub args: Vec<Value>,
}

impl ExpectedCall {
    pub fn new(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

/// An assertion in flight.
///
/// Created for one exchange step and discarded once verified.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    /// Every call must appear, in any order, each on its own notification.
    Calls(Vec<ExpectedCall>),
    /// Exactly one response with this number, matching `body`.
    Response { request_number: i64, body: Value },
}

impl Expectation {
    /// How many messages this expectation accounts for.
    pub fn message_count(&self) -> usize {
        match self {
            Expectation::Calls(calls) => calls.len(),
            Expectation::Response { .. } => 1,
        }
    }

    pub fn verify(&self, messages: &[Message]) -> Result<(), MatchError> {
        match self {
            Expectation::Calls(calls) => assign_calls(&calls.iter().collect::<Vec<_>>(), messages),
            Expectation::Response {
                request_number,
                body,
            } => match_response(messages, *request_number, body).map(|_| ()),
        }
    }
}

/// Total number of messages a set of expectations accounts for.
pub fn expected_count(expectations: &[Expectation]) -> usize {
    expectations.iter().map(Expectation::message_count).sum()
}

/// Verify that `messages` is exactly what `expectations` describe: the
/// counts agree and every expectation holds.
pub fn verify_all(expectations: &[Expectation], messages: &[Message]) -> Result<(), MatchError> {
    let expected = expected_count(expectations);
    if messages.len() != expected {
        return Err(MatchError::UnexpectedMessageCount {
            expected,
            actual: messages.len(),
        });
    }
    let calls: Vec<&ExpectedCall> = expectations
        .iter()
        .filter_map(|e| match e {
            Expectation::Calls(calls) => Some(calls),
            Expectation::Response { .. } => None,
        })
        .flatten()
        .collect();
    assign_calls(&calls, messages)?;
    expectations
        .iter()
        .filter(|e| matches!(e, Expectation::Response { .. }))
        .try_for_each(|e| e.verify(messages))
}

/// Give every expected call a distinct notification.
///
/// A call with no candidate at all is reported by [`match_notifications`].
/// Otherwise candidates are assigned by augmenting paths, so an earlier
/// broad pattern gives way when a later call needs its notification.
fn assign_calls(calls: &[&ExpectedCall], messages: &[Message]) -> Result<(), MatchError> {
    let mut candidates = Vec::with_capacity(calls.len());
    for call in calls {
        match_notifications(messages, &call.function, &call.args)?;
        let mut matching = Vec::new();
        for (index, message) in messages.iter().enumerate() {
            if let Message::Notification(n) = message
                && call_matches(n, &call.function, &call.args)?
            {
                matching.push(index);
            }
        }
        candidates.push(matching);
    }

    let mut owner: Vec<Option<usize>> = vec![None; messages.len()];
    for (index, call) in calls.iter().enumerate() {
        let mut visited = vec![false; messages.len()];
        if !augment(index, &candidates, &mut owner, &mut visited) {
            return Err(MatchError::NotEnoughCalls {
                function: call.function.clone(),
                patterns: Value::Array(call.args.clone()).to_string(),
                expected: calls.iter().filter(|c| *c == call).count(),
                matched: candidates[index].len(),
            });
        }
    }
    Ok(())
}

fn augment(
    call: usize,
    candidates: &[Vec<usize>],
    owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &message in &candidates[call] {
        if visited[message] {
            continue;
        }
        visited[message] = true;
        let free = match owner[message] {
            None => true,
            Some(other) => augment(other, candidates, owner, visited),
        };
        if free {
            owner[message] = Some(call);
            return true;
        }
    }
    false
}
