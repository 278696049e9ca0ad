//! Pattern helpers.
//!
//! Expected strings are regular expressions anchored at the start of the
//! actual text, so `"OK"` accepts `"OK file=test_prog.c line=16"`. Add `$`
//! to a pattern to pin the end as well.

use super::error::MatchError;
use regex::Regex;
use serde_json::Value;

/// Text a non-string value is compared as: strings verbatim, everything
/// else as compact JSON.
pub fn string_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Compile `pattern` anchored at the start of the input.
pub fn anchored(pattern: &str) -> Result<Regex, MatchError> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|e| MatchError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

pub fn pattern_matches(pattern: &str, actual: &str) -> Result<bool, MatchError> {
    Ok(anchored(pattern)?.is_match(actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_form() {
        assert_eq!(string_form(&json!("test_prog.c")), "test_prog.c");
        assert_eq!(string_form(&json!(2)), "2");
        assert_eq!(string_form(&json!(true)), "true");
        assert_eq!(string_form(&json!(null)), "null");
        assert_eq!(string_form(&json!([1, "a"])), r#"[1,"a"]"#);
    }

    #[test]
    fn test_matches_is_anchored_at_start() {
        assert!(pattern_matches("OK", "OK file=test_prog.c").unwrap());
        assert!(!pattern_matches("file", "OK file=test_prog.c").unwrap());
        assert!(pattern_matches(".*test_prog.c", "/tmp/x/test_prog.c").unwrap());
        assert!(!pattern_matches("OK$", "OK file").unwrap());
    }

    #[test]
    fn test_alternation_stays_anchored() {
        assert!(pattern_matches("a|b", "b").unwrap());
        assert!(!pattern_matches("a|b", "cb").unwrap());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = pattern_matches("(unclosed", "x").unwrap_err();
        assert!(matches!(err, MatchError::InvalidPattern { .. }));
    }
}
