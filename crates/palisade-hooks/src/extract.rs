//! Content and subject extraction from opaque request payloads.
//!
//! Runner payloads vary by integration, so extraction follows a fixed
//! fallback contract: well-known content keys in order, then the whole
//! payload stringified; well-known subject keys, then `"anonymous"`.

use serde_json::Value;

/// Content keys probed in order on object payloads.
pub const CONTENT_KEYS: [&str; 6] = ["content", "message", "prompt", "query", "text", "input"];

/// Subject-id keys probed in order on object payloads.
pub const SUBJECT_KEYS: [&str; 2] = ["user_id", "userId"];

/// Subject id used when the payload carries none.
pub const ANONYMOUS_SUBJECT: &str = "anonymous";

/// Extracts the textual content to check from a payload.
///
/// String payloads are used directly. Object payloads are probed with
/// [`CONTENT_KEYS`] in order; if no key yields non-empty text the whole
/// payload is stringified.
pub fn extract_content(payload: &Value) -> String {
    let extracted = match payload {
        Value::String(text) => text.clone(),
        Value::Object(map) => CONTENT_KEYS
            .iter()
            .find_map(|key| map.get(*key))
            .map(value_text)
            .unwrap_or_default(),
        Value::Null => String::new(),
        other => value_text(other),
    };

    if extracted.is_empty() && matches!(payload, Value::Object(_)) {
        return payload.to_string();
    }
    extracted
}

/// Extracts the subject id from a payload, defaulting to
/// [`ANONYMOUS_SUBJECT`].
pub fn extract_subject_id(payload: &Value) -> String {
    SUBJECT_KEYS
        .iter()
        .find_map(|key| payload.get(*key))
        .map(value_text)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| ANONYMOUS_SUBJECT.to_string())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn string_payload_is_used_directly() {
        assert_eq!(extract_content(&json!("hello agent")), "hello agent");
    }

    #[test]
    fn content_keys_are_probed_in_order() {
        let payload = json!({ "prompt": "from prompt", "text": "from text" });
        assert_eq!(extract_content(&payload), "from prompt");

        let payload = json!({ "message": "from message", "content": "from content" });
        assert_eq!(extract_content(&payload), "from content");
    }

    #[test]
    fn non_string_content_values_are_stringified() {
        let payload = json!({ "query": { "nested": true } });
        assert_eq!(extract_content(&payload), r#"{"nested":true}"#);
    }

    #[test]
    fn object_without_known_keys_is_stringified_whole() {
        let payload = json!({ "task": "summarize" });
        assert_eq!(extract_content(&payload), r#"{"task":"summarize"}"#);
    }

    #[test]
    fn empty_content_value_falls_back_to_whole_payload() {
        let payload = json!({ "content": "", "task": "x" });
        let extracted = extract_content(&payload);
        assert!(extracted.contains("task"));
    }

    #[test]
    fn null_payload_yields_empty_content() {
        assert_eq!(extract_content(&Value::Null), "");
    }

    #[test]
    fn subject_id_prefers_snake_case_key() {
        let payload = json!({ "user_id": "alpha", "userId": "beta" });
        assert_eq!(extract_subject_id(&payload), "alpha");
    }

    #[test]
    fn subject_id_falls_back_to_camel_case_key() {
        let payload = json!({ "userId": "beta" });
        assert_eq!(extract_subject_id(&payload), "beta");
    }

    #[test]
    fn missing_subject_id_is_anonymous() {
        assert_eq!(extract_subject_id(&json!({ "content": "x" })), "anonymous");
        assert_eq!(extract_subject_id(&json!("plain string")), "anonymous");
    }

    #[test]
    fn numeric_subject_id_is_stringified() {
        let payload = json!({ "user_id": 42 });
        assert_eq!(extract_subject_id(&payload), "42");
    }
}
