//! Best-effort parsing of tool call argument text
//!
//! Local models regularly stop mid-object or leave trailing commas. Repair
//! closes an unterminated string, strips trailing commas and appends the
//! missing closers in nesting order. It never invents keys or values, so
//! text truncated between a key and its value stays unparseable.

use serde_json::{Map, Value};

/// Parse argument text, repairing common truncation damage
///
/// Empty or whitespace-only text parses to an empty object. Returns `None`
/// if the text is still invalid after repair.
pub fn repair(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Some(Value::Object(Map::new()));
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    let repaired = close_structure(trimmed);

    match serde_json::from_str(&repaired) {
        Ok(value) => {
            tracing::debug!(original = %raw, repaired = %repaired, "repaired tool call arguments");
            Some(value)
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                original = %raw,
                repaired = %repaired,
                "failed to repair tool call arguments"
            );
            None
        }
    }
}

/// Apply the structural fixes without parsing
pub fn close_structure(text: &str) -> String {
    let mut closed = text.to_owned();
    close_string(&mut closed);

    let mut out = String::with_capacity(closed.len() + 8);
    let mut openers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut chars = closed.chars();

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' | '[' => openers.push(c),
            '}' | ']' => {
                openers.pop();
            }
            ',' => {
                let rest = chars.clone().find(|c| !c.is_whitespace());
                if matches!(rest, None | Some('}' | ']')) {
                    continue;
                }
            }
            _ => {}
        }

        out.push(c);
    }

    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);

    for opener in openers.into_iter().rev() {
        out.push(if opener == '{' { '}' } else { ']' });
    }

    out
}

/// Append a closing quote when the unescaped quote count is odd
fn close_string(text: &mut String) {
    let mut quotes = 0usize;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            quotes += 1;
        }
    }

    if quotes % 2 == 1 {
        // A dangling backslash would escape the quote we are about to add
        if escaped {
            text.pop();
        }
        text.push('"');
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn empty_is_empty_object() {
        assert_eq!(repair(""), Some(json!({})));
        assert_eq!(repair("  \n\t"), Some(json!({})));
    }

    #[test]
    fn valid_json_passes_through() {
        assert_eq!(repair(r#"{"path": "a.txt"}"#), Some(json!({"path": "a.txt"})));
        assert_eq!(repair("[1, 2]"), Some(json!([1, 2])));
    }

    #[test]
    fn balances_brackets() {
        assert_eq!(repair(r#"{"a": [1, 2"#), Some(json!({"a": [1, 2]})));
        assert_eq!(repair(r#"{"a": {"b": [1"#), Some(json!({"a": {"b": [1]}})));
        assert_eq!(repair(r#"[{"a": 1}, {"b": 2"#), Some(json!([{"a": 1}, {"b": 2}])));
    }

    #[test]
    fn closes_truncated_string() {
        assert_eq!(repair(r#"{"path": "a.tx"#), Some(json!({"path": "a.tx"})));
        assert_eq!(
            repair(r#"{"cmd": "echo", "args": ["-n", "hel"#),
            Some(json!({"cmd": "echo", "args": ["-n", "hel"]}))
        );
    }

    #[test]
    fn escaped_quotes_are_not_counted() {
        assert_eq!(
            repair(r#"{"text": "say \"hi\" now"#),
            Some(json!({"text": "say \"hi\" now"}))
        );
    }

    #[test]
    fn dangling_escape_is_dropped() {
        assert_eq!(repair(r#"{"text": "line\"#), Some(json!({"text": "line"})));
    }

    #[test]
    fn strips_trailing_commas() {
        assert_eq!(repair(r#"{"a": 1, "b": [1, 2,],}"#), Some(json!({"a": 1, "b": [1, 2]})));
        assert_eq!(repair(r#"{"a": 1,"#), Some(json!({"a": 1})));
        assert_eq!(repair("[1, 2,  \n"), Some(json!([1, 2])));
    }

    #[test]
    fn commas_and_brackets_inside_strings_untouched() {
        assert_eq!(
            repair(r#"{"pattern": "a,}]{", "n": 1,"#),
            Some(json!({"pattern": "a,}]{", "n": 1}))
        );
    }

    #[test]
    fn unrepairable_returns_none() {
        assert_eq!(repair(r#"{"path": "#), None);
        assert_eq!(repair("not json at all"), None);
        assert_eq!(repair(r#"{"a": 1}}"#), None);
    }

    #[test]
    fn close_structure_orders_closers() {
        assert_eq!(close_structure(r#"{"a": [{"b": "c"#), r#"{"a": [{"b": "c"}]}"#);
        assert_eq!(close_structure(r#"{"a": 1}}"#), r#"{"a": 1}}"#);
    }
}
