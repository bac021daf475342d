//! Two-tier JSON parsing for streamed tool arguments.
//!
//! While a tool call is still streaming its argument buffer is usually a
//! prefix of a JSON document. [`parse_lenient`] salvages what it can from such
//! a prefix; [`parse_strict`] is used once the call is final. Both fall back
//! to an empty object, and neither ever replaces the raw buffer.

use serde_json::{Map, Value};

/// The value used whenever arguments cannot be parsed.
pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Parse a complete argument buffer. Anything unparseable becomes `{}`.
pub fn parse_strict(buffer: &str) -> Value {
    if buffer.trim().is_empty() {
        return empty_object();
    }
    serde_json::from_str(buffer).unwrap_or_else(|_| empty_object())
}

/// Best-effort parse of a partial argument buffer.
///
/// Closes an unterminated string, drops a dangling `,` / `:` / key, and
/// appends the missing closers before parsing. Falls back to `{}`.
pub fn parse_lenient(buffer: &str) -> Value {
    if buffer.trim().is_empty() {
        return empty_object();
    }
    if let Ok(value) = serde_json::from_str(buffer) {
        return value;
    }
    complete_prefix(buffer)
        .and_then(|repaired| serde_json::from_str(&repaired).ok())
        .unwrap_or_else(empty_object)
}

/// Turn a JSON prefix into a syntactically closed document, if possible.
fn complete_prefix(input: &str) -> Option<String> {
    let mut out = String::with_capacity(input.len() + 8);
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for ch in input.chars() {
        out.push(ch);
        if in_string {
            if escape_next {
                escape_next = false;
            } else if ch == '\\' {
                escape_next = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                if stack.pop() != Some(ch) {
                    return None;
                }
            }
            _ => {}
        }
    }

    if in_string {
        if escape_next {
            out.pop();
        }
        out.push('"');
    }

    loop {
        let trimmed = out.trim_end();
        if trimmed.ends_with(',') || trimmed.ends_with(':') {
            let cut = trimmed.len() - 1;
            out.truncate(cut);
            // A trailing ':' leaves an orphaned key behind it.
            if stack.last() == Some(&'}') {
                drop_dangling_key(&mut out);
            }
            continue;
        }
        if stack.last() == Some(&'}') && ends_with_bare_key(trimmed) {
            drop_dangling_key(&mut out);
            continue;
        }
        break;
    }

    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    Some(out)
}

/// True when the tail of an object body is a lone `"key"` with no value.
fn ends_with_bare_key(trimmed: &str) -> bool {
    if !trimmed.ends_with('"') {
        return false;
    }
    let Some(start) = string_start(trimmed) else {
        return false;
    };
    let before = trimmed[..start].trim_end();
    before.ends_with('{') || before.ends_with(',')
}

/// Remove a trailing `"key"` (and the separator before it).
fn drop_dangling_key(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    if !out.ends_with('"') {
        return;
    }
    if let Some(start) = string_start(out) {
        let before = out[..start].trim_end();
        if before.ends_with('{') || before.ends_with(',') {
            out.truncate(start);
            let trimmed_len = out.trim_end().len();
            out.truncate(trimmed_len);
            if out.ends_with(',') {
                out.pop();
            }
        }
    }
}

/// Byte offset of the opening quote of the string literal ending `s`.
fn string_start(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = bytes.len().checked_sub(1)?;
    while i > 0 {
        i -= 1;
        if bytes[i] == b'"' {
            let mut backslashes = 0;
            let mut j = i;
            while j > 0 && bytes[j - 1] == b'\\' {
                backslashes += 1;
                j -= 1;
            }
            if backslashes % 2 == 0 {
                return Some(i);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strict_complete_document() {
        assert_eq!(parse_strict(r#"{"a":1,"b":2}"#), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_strict_rejects_prefix() {
        assert_eq!(parse_strict(r#"{"a":1,"b":"#), json!({}));
        assert_eq!(parse_strict(""), json!({}));
    }

    #[test]
    fn test_lenient_closes_object() {
        assert_eq!(parse_lenient(r#"{"a":1"#), json!({"a": 1}));
    }

    #[test]
    fn test_lenient_drops_dangling_key() {
        assert_eq!(parse_lenient(r#"{"a":1,"b":"#), json!({"a": 1}));
        assert_eq!(parse_lenient(r#"{"a":1,"b""#), json!({"a": 1}));
        assert_eq!(parse_lenient(r#"{"a":1,"#), json!({"a": 1}));
    }

    #[test]
    fn test_lenient_closes_string_and_array() {
        assert_eq!(
            parse_lenient(r#"{"path":"src/ma"#),
            json!({"path": "src/ma"})
        );
        assert_eq!(
            parse_lenient(r#"{"items":[1,2"#),
            json!({"items": [1, 2]})
        );
    }

    #[test]
    fn test_lenient_only_open_brace() {
        assert_eq!(parse_lenient("{"), json!({}));
        assert_eq!(parse_lenient(r#"{""#), json!({}));
    }

    #[test]
    fn test_lenient_garbage_falls_back() {
        assert_eq!(parse_lenient("not json"), json!({}));
        assert_eq!(parse_lenient("}"), json!({}));
    }
}
