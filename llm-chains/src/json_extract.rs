//! Pulls the first JSON object out of free-form model output.
//!
//! Models wrap JSON in prose, code fences and sometimes several half-formed
//! attempts. The scan walks every `{`, finds its balanced `}` (ignoring braces
//! inside string literals) and returns the first candidate that parses as an
//! object. It never panics and never errors; `None` is the only failure mode.

use serde_json::{Map, Value};
use tracing::warn;

pub type JsonObject = Map<String, Value>;

/// First balanced `{...}` block in `text` that parses as a JSON object.
pub fn extract_first_json_block(text: &str) -> Option<JsonObject> {
    let bytes = text.as_bytes();
    let mut from = 0;

    while let Some(offset) = text[from..].find('{') {
        let start = from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(&text[start..=end]) {
                return Some(obj);
            }
        }
        from = start + 1;
    }
    None
}

/// Same as [`extract_first_json_block`], logging a warning on miss.
pub fn extract_or_warn(text: &str, what: &str) -> Option<JsonObject> {
    let out = extract_first_json_block(text);
    if out.is_none() {
        warn!(%what, response_len = text.len(), "no JSON object found in model output");
    }
    out
}

/// Index of the `}` closing the `{` at `start`, if any.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Reads a boolean that models sometimes emit as a string.
pub fn loose_bool(v: Option<&Value>) -> Option<bool> {
    match v? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn finds_object_inside_prose_and_fences() {
        let text = "Sure! Here you go:\n```json\n{\"classification\": \"Safe\", \"reason\": \"ok\"}\n```\nThanks.";
        let obj = extract_first_json_block(text).unwrap();
        assert_eq!(obj["classification"], "Safe");
    }

    #[test]
    fn tolerates_nested_objects() {
        let text = r#"{"is_compound": true, "queries": {"1": "a?", "2": "b?"}} trailing"#;
        let obj = extract_first_json_block(text).unwrap();
        assert_eq!(obj["queries"], json!({"1": "a?", "2": "b?"}));
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scan() {
        let text = r#"noise {"reason": "uses } and { inside", "is_answer": false}"#;
        let obj = extract_first_json_block(text).unwrap();
        assert_eq!(obj["is_answer"], false);
    }

    #[test]
    fn skips_invalid_candidates() {
        let text = r#"{not json} then {"match": false}"#;
        let obj = extract_first_json_block(text).unwrap();
        assert_eq!(obj["match"], false);
    }

    #[test]
    fn returns_none_without_panicking() {
        for text in ["", "{", "}", "}{", "no json here", "{\"a\": ", "{\"a\": \"\\\"}"] {
            assert!(extract_first_json_block(text).is_none(), "{text:?}");
        }
    }

    #[test]
    fn multibyte_text_is_safe() {
        let text = "Ответ: {\"match\": true, \"response\": \"9–5\"} ✓";
        let obj = extract_first_json_block(text).unwrap();
        assert_eq!(obj["response"], "9–5");
    }

    #[test]
    fn loose_bool_accepts_strings() {
        assert_eq!(loose_bool(Some(&json!("True"))), Some(true));
        assert_eq!(loose_bool(Some(&json!(false))), Some(false));
        assert_eq!(loose_bool(Some(&json!(1))), None);
        assert_eq!(loose_bool(None), None);
    }
}
