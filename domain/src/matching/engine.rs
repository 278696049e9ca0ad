//! Notification and response matchers.
//!
//! Both matchers are pure functions of their inputs, so checking the same
//! messages twice always gives the same answer.

use super::error::MatchError;
use super::pattern::{pattern_matches, string_form};
use crate::wire::message::{Message, Notification, Response};
use serde_json::{Map, Value};

/// Find a call to `function` whose arguments satisfy `expected_args`.
///
/// Arguments are compared positionally and the counts must agree:
///
/// - a string or other scalar is a pattern: its string form is matched
///   against the actual argument's string form, so `2` accepts `25`
/// - an object is accepted without inspection (mapping arguments are not
///   compared structurally)
/// - an array must equal the actual argument
pub fn match_notifications<'a>(
    messages: &'a [Message],
    function: &str,
    expected_args: &[Value],
) -> Result<&'a Notification, MatchError> {
    let calls: Vec<&Notification> = messages.iter().filter_map(Message::as_notification).collect();

    let candidates: Vec<&Notification> = calls
        .iter()
        .copied()
        .filter(|n| n.function == function)
        .collect();
    if candidates.is_empty() {
        return Err(MatchError::FunctionNotCalled {
            function: function.to_string(),
            seen: calls.iter().map(|n| n.function.clone()).collect(),
        });
    }

    for &candidate in &candidates {
        if args_match(expected_args, &candidate.args)? {
            return Ok(candidate);
        }
    }

    Err(MatchError::NoMatchingCall {
        function: function.to_string(),
        expected: Value::Array(expected_args.to_vec()).to_string(),
        candidates: candidates.len(),
    })
}

/// Whether `notification` is a call to `function` with arguments that
/// satisfy `expected_args`, by the rules of [`match_notifications`].
pub fn call_matches(
    notification: &Notification,
    function: &str,
    expected_args: &[Value],
) -> Result<bool, MatchError> {
    if notification.function != function {
        return Ok(false);
    }
    args_match(expected_args, &notification.args)
}

fn args_match(expected: &[Value], actual: &[Value]) -> Result<bool, MatchError> {
    if expected.len() != actual.len() {
        return Ok(false);
    }
    for (expected, actual) in expected.iter().zip(actual) {
        if !arg_matches(expected, actual)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn arg_matches(expected: &Value, actual: &Value) -> Result<bool, MatchError> {
    match expected {
        Value::Object(_) => Ok(true),
        Value::Array(_) => Ok(expected == actual),
        pattern => pattern_matches(&string_form(pattern), &string_form(actual)),
    }
}

/// Find the single response to `request_number` and compare its body.
///
/// Comparison is recursive: objects need identical key sets, strings are
/// patterns, numbers compare numerically, arrays element-wise, and
/// everything else by equality.
pub fn match_response<'a>(
    messages: &'a [Message],
    request_number: i64,
    expected_body: &Value,
) -> Result<&'a Response, MatchError> {
    let responses: Vec<&Response> = messages
        .iter()
        .filter_map(Message::as_response)
        .filter(|r| r.request_number == request_number)
        .collect();

    let &[response] = responses.as_slice() else {
        return Err(MatchError::ResponseCountMismatch {
            request_number,
            found: responses.len(),
        });
    };

    compare_body(expected_body, &response.body, "body").map_err(|(path, reason)| {
        MatchError::ResponseBodyMismatch {
            request_number,
            path,
            reason,
        }
    })?;
    Ok(response)
}

type Mismatch = (String, String);

fn compare_body(expected: &Value, actual: &Value, path: &str) -> Result<(), Mismatch> {
    let mismatch = |reason: String| Err((path.to_string(), reason));

    match (expected, actual) {
        (Value::Object(expected), Value::Object(actual)) => compare_objects(expected, actual, path),
        (Value::String(pattern), Value::String(actual)) => {
            match pattern_matches(pattern, actual) {
                Ok(true) => Ok(()),
                Ok(false) => mismatch(format!("pattern {pattern:?} does not match {actual:?}")),
                Err(e) => mismatch(e.to_string()),
            }
        }
        (Value::Number(e), Value::Number(a)) => {
            let equal = match (e.as_i64(), a.as_i64()) {
                (Some(e), Some(a)) => e == a,
                _ => e.as_f64() == a.as_f64(),
            };
            if equal {
                Ok(())
            } else {
                mismatch(format!("expected {e}, found {a}"))
            }
        }
        (Value::Array(expected), Value::Array(actual)) => {
            if expected.len() != actual.len() {
                return mismatch(format!(
                    "expected {} element(s), found {}",
                    expected.len(),
                    actual.len()
                ));
            }
            for (i, (e, a)) in expected.iter().zip(actual).enumerate() {
                compare_body(e, a, &format!("{path}[{i}]"))?;
            }
            Ok(())
        }
        (e, a) if e == a => Ok(()),
        (e, a) => mismatch(format!("expected {e}, found {a}")),
    }
}

fn compare_objects(
    expected: &Map<String, Value>,
    actual: &Map<String, Value>,
    path: &str,
) -> Result<(), Mismatch> {
    let expected_keys: Vec<&String> = expected.keys().collect();
    let mut actual_keys: Vec<&String> = actual.keys().collect();
    let mut sorted_expected = expected_keys.clone();
    sorted_expected.sort();
    actual_keys.sort();
    if sorted_expected != actual_keys {
        return Err((
            path.to_string(),
            format!("expected keys {sorted_expected:?}, found {actual_keys:?}"),
        ));
    }

    for key in expected_keys {
        compare_body(&expected[key], &actual[key], &format!("{path}.{key}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::message::{Notification, Response};
    use serde_json::json;

    fn call(function: &str, args: Value) -> Message {
        let Value::Array(args) = args else {
            panic!("args must be an array");
        };
        Message::Notification(Notification::new(function, args))
    }

    fn response(number: i64, body: Value) -> Message {
        Message::Response(Response::new(number, body))
    }

    #[test]
    fn test_notification_matches_with_patterns() {
        let messages = vec![
            response(1, json!({"pid": "1234", "status": "OK"})),
            call("padre#debugger#JumpToPosition", json!(["/tmp/abc/test_prog.c", 2])),
        ];
        let found = match_notifications(
            &messages,
            "padre#debugger#JumpToPosition",
            &[json!(".*test_prog.c$"), json!(2)],
        )
        .unwrap();
        assert_eq!(found.args[1], json!(2));
    }

    #[test]
    fn test_function_not_called() {
        let messages = vec![call("padre#debugger#Log", json!([4, "hello"]))];
        let err = match_notifications(&messages, "padre#debugger#JumpToPosition", &[]).unwrap_err();
        assert_eq!(
            err,
            MatchError::FunctionNotCalled {
                function: "padre#debugger#JumpToPosition".to_string(),
                seen: vec!["padre#debugger#Log".to_string()],
            }
        );
    }

    #[test]
    fn test_no_matching_call() {
        let messages = vec![
            call("padre#debugger#JumpToPosition", json!(["test_prog.c", 16])),
            call("padre#debugger#JumpToPosition", json!(["test_prog.c", 17])),
        ];
        let err =
            match_notifications(&messages, "padre#debugger#JumpToPosition", &[json!("test_prog.c"), json!(2)])
                .unwrap_err();
        assert!(matches!(err, MatchError::NoMatchingCall { candidates: 2, .. }));
    }

    #[test]
    fn test_any_candidate_may_match() {
        let messages = vec![
            call("f", json!(["a", 1])),
            call("f", json!(["b", 2])),
        ];
        assert!(match_notifications(&messages, "f", &[json!("b"), json!(2)]).is_ok());
    }

    #[test]
    fn test_argument_count_must_agree() {
        let messages = vec![call("f", json!([1, 2]))];
        assert!(match_notifications(&messages, "f", &[json!(1)]).is_err());
        assert!(match_notifications(&messages, "f", &[json!(1), json!(2), json!(3)]).is_err());
    }

    #[test]
    fn test_mapping_arguments_are_accepted_without_comparison() {
        let messages = vec![call("padre#debugger#BreakpointSet", json!([{"file": "a.c", "line": 3}]))];
        let result = match_notifications(
            &messages,
            "padre#debugger#BreakpointSet",
            &[json!({"file": "completely different"})],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_scalar_arguments_are_patterns_over_string_form() {
        let messages = vec![call("f", json!([25])), call("g", json!(["x", 16]))];
        assert!(match_notifications(&messages, "f", &[json!(25)]).is_ok());
        // Prefix match, like any other pattern
        assert!(match_notifications(&messages, "f", &[json!(2)]).is_ok());
        assert!(match_notifications(&messages, "g", &[json!("x"), json!(1)]).is_ok());
        assert!(match_notifications(&messages, "f", &[json!(3)]).is_err());
        assert!(match_notifications(&messages, "f", &[json!("2\\d$")]).is_ok());
        assert!(match_notifications(&messages, "f", &[json!(250)]).is_err());
    }

    #[test]
    fn test_response_matches_exact_body() {
        let messages = vec![response(1, json!({"status": "OK"}))];
        let found = match_response(&messages, 1, &json!({"status": "OK"})).unwrap();
        assert_eq!(found.request_number, 1);
    }

    #[test]
    fn test_response_string_leaves_are_patterns() {
        let messages = vec![response(1, json!({"pid": "31337", "status": "OK"}))];
        assert!(match_response(&messages, 1, &json!({"pid": "\\d+$", "status": "OK"})).is_ok());
        let err = match_response(&messages, 1, &json!({"pid": "[a-z]+", "status": "OK"})).unwrap_err();
        assert!(matches!(
            err,
            MatchError::ResponseBodyMismatch { ref path, .. } if path == "body.pid"
        ));
    }

    #[test]
    fn test_response_key_sets_must_be_identical() {
        let messages = vec![response(3, json!({"status": "OK", "extra": 1}))];
        let err = match_response(&messages, 3, &json!({"status": "OK"})).unwrap_err();
        assert!(matches!(
            err,
            MatchError::ResponseBodyMismatch { request_number: 3, ref path, .. } if path == "body"
        ));
    }

    #[test]
    fn test_response_nested_mismatch_names_path() {
        let messages = vec![response(
            2,
            json!({"status": "OK", "location": {"file": "a.c", "line": 16}}),
        )];
        let err = match_response(
            &messages,
            2,
            &json!({"status": "OK", "location": {"file": "a.c", "line": 17}}),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MatchError::ResponseBodyMismatch {
                request_number: 2,
                path: "body.location.line".to_string(),
                reason: "expected 17, found 16".to_string(),
            }
        );
    }

    #[test]
    fn test_response_type_mismatch() {
        let messages = vec![response(1, json!({"line": "16"}))];
        let err = match_response(&messages, 1, &json!({"line": 16})).unwrap_err();
        assert!(matches!(err, MatchError::ResponseBodyMismatch { .. }));
    }

    #[test]
    fn test_response_count_mismatch() {
        let none = vec![response(2, json!({"status": "OK"}))];
        assert_eq!(
            match_response(&none, 1, &json!({"status": "OK"})).unwrap_err(),
            MatchError::ResponseCountMismatch {
                request_number: 1,
                found: 0
            }
        );

        let twice = vec![
            response(1, json!({"status": "OK"})),
            response(1, json!({"status": "OK"})),
        ];
        assert_eq!(
            match_response(&twice, 1, &json!({"status": "OK"})).unwrap_err(),
            MatchError::ResponseCountMismatch {
                request_number: 1,
                found: 2
            }
        );
    }

    #[test]
    fn test_response_ignores_notifications() {
        let messages = vec![
            call("padre#debugger#Log", json!([4, "x"])),
            response(1, json!({"status": "OK"})),
        ];
        assert!(match_response(&messages, 1, &json!({"status": "OK"})).is_ok());
    }

    #[test]
    fn test_response_matching_is_idempotent() {
        let messages = vec![response(5, json!({"status": "ERROR", "error": "No such file"}))];
        let expected = json!({"status": "OK", "error": "No such file"});
        let first = match_response(&messages, 5, &expected).map(|r| r.clone());
        let second = match_response(&messages, 5, &expected).map(|r| r.clone());
        assert_eq!(first, second);

        let expected = json!({"status": "ERROR", "error": "No such"});
        let first = match_response(&messages, 5, &expected).map(|r| r.clone());
        let second = match_response(&messages, 5, &expected).map(|r| r.clone());
        assert!(first.is_ok());
        assert_eq!(first, second);
    }

    #[test]
    fn test_response_arrays_compare_elementwise() {
        let messages = vec![response(1, json!({"frames": ["main", "f"]}))];
        assert!(match_response(&messages, 1, &json!({"frames": ["ma", "f"]})).is_ok());
        let err = match_response(&messages, 1, &json!({"frames": ["main"]})).unwrap_err();
        assert!(matches!(
            err,
            MatchError::ResponseBodyMismatch { ref path, .. } if path == "body.frames"
        ));
    }
}
