//! Chat component flattening
//!
//! Kick packets carry their reason as a JSON chat component. Kick
//! classification only cares about the visible text, so components are
//! flattened depth-first and any colour markup is removed.

use crate::text::strip_color;
use serde_json::Value;

/// Flatten a serialized chat component to plain, uncoloured text
///
/// Accepts a JSON string, object or array. Input that is not valid JSON is
/// treated as legacy text.
///
/// ```
/// use relink_types::chat_to_plain;
///
/// let raw = r#"{"text":"Server ","color":"red","extra":[{"text":"§lclosed"}]}"#;
/// assert_eq!(chat_to_plain(raw), "Server closed");
/// ```
pub fn chat_to_plain(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => {
            let mut out = String::new();
            flatten(&value, &mut out);
            strip_color(&out)
        }
        Err(_) => strip_color(raw),
    }
}

fn flatten(value: &Value, out: &mut String) {
    match value {
        Value::String(s) => out.push_str(s),
        Value::Array(parts) => parts.iter().for_each(|part| flatten(part, out)),
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                out.push_str(text);
            } else if let Some(Value::String(key)) = map.get("translate") {
                // No translation tables here; the key is the best we have
                out.push_str(key);
            }
            if let Some(Value::Array(extra)) = map.get("extra") {
                extra.iter().for_each(|part| flatten(part, out));
            }
        }
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Null => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json_string() {
        assert_eq!(chat_to_plain(r#""Server closed""#), "Server closed");
    }

    #[test]
    fn test_legacy_text_fallback() {
        assert_eq!(chat_to_plain("§cServer closed"), "Server closed");
    }

    #[test]
    fn test_nested_extra_and_arrays() {
        let raw = r#"[{"text":"A"},{"text":"B","extra":["C",{"text":"D"}]}]"#;
        assert_eq!(chat_to_plain(raw), "ABCD");
    }

    #[test]
    fn test_translate_key_used_when_no_text() {
        let raw = r#"{"translate":"multiplayer.disconnect.server_shutdown"}"#;
        assert_eq!(chat_to_plain(raw), "multiplayer.disconnect.server_shutdown");
    }
}
