use serde_json::{Map, Value};

/// Drops a leading ```` ``` ```` fence line (with optional language tag) and
/// a trailing fence line.
pub fn strip_code_fence(text: &str) -> String {
    let raw = text.trim();
    if !raw.starts_with("```") {
        return raw.to_string();
    }
    let body = match raw.split_once('\n') {
        Some((_, rest)) => rest,
        // Single line such as ```{"a":1}```
        None => raw.trim_start_matches('`').trim_start_matches("json"),
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim().to_string()
}

/// Strict half of recovery: a JSON object or nothing.
///
/// Tries the fence-stripped text first, then its outermost `{...}` slice.
pub fn parse_json_object(text: &str) -> Option<Map<String, Value>> {
    let raw = strip_code_fence(text);
    if raw.is_empty() {
        return None;
    }
    let mut candidates = vec![raw.as_str()];
    if let (Some(start), Some(end)) = (raw.find('{'), raw.rfind('}')) {
        if end > start {
            candidates.push(&raw[start..=end]);
        }
    }
    candidates.into_iter().find_map(|candidate| {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        }
    })
}

/// Turns whatever a model replied with into a JSON object.
///
/// Objects pass through; strings are parsed leniently; anything else (or an
/// unparsable string) goes to `fallback` with the raw text.
pub fn recover<F>(reply: Value, fallback: F) -> Map<String, Value>
where
    F: FnOnce(&str) -> Map<String, Value>,
{
    match reply {
        Value::Object(object) => object,
        Value::String(text) => parse_json_object(&text).unwrap_or_else(|| fallback(text.trim())),
        other => fallback(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn wrap_description(raw: &str) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert("name".to_string(), json!("Lamp"));
        out.insert("description".to_string(), json!(raw));
        out
    }

    #[test]
    fn strip_code_fence_handles_tagged_and_bare_fences() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```JSON\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn recover_passes_objects_through() {
        let payload = json!({"name": "Blade", "description": "Sharp."});
        let recovered = recover(payload.clone(), wrap_description);
        assert_eq!(Value::Object(recovered), payload);
    }

    #[test]
    fn recover_is_idempotent_on_valid_json_text() {
        let text = r#"{"name":"Blade","description":"Sharp."}"#;
        let once = recover(Value::String(text.to_string()), wrap_description);
        let twice = recover(Value::String(Value::Object(once.clone()).to_string()), wrap_description);
        assert_eq!(once, twice);
    }

    #[test]
    fn recover_fenced_json_matches_unwrapped() {
        let plain = r#"{"name":"Blade","description":"Sharp."}"#;
        let fenced = format!("```json\n{plain}\n```");
        assert_eq!(
            recover(Value::String(fenced), wrap_description),
            recover(Value::String(plain.to_string()), wrap_description)
        );
    }

    #[test]
    fn recover_extracts_object_embedded_in_prose() {
        let text = "Sure! Here it is: {\"name\": \"Blade\"} Enjoy.";
        let recovered = recover(Value::String(text.to_string()), wrap_description);
        assert_eq!(recovered.get("name"), Some(&json!("Blade")));
        assert!(recovered.get("description").is_none());
    }

    #[test]
    fn recover_wraps_garbage_in_fallback() {
        let recovered = recover(
            Value::String("  the bard mumbled something  ".to_string()),
            wrap_description,
        );
        assert_eq!(recovered.get("name"), Some(&json!("Lamp")));
        assert_eq!(
            recovered.get("description"),
            Some(&json!("the bard mumbled something"))
        );

        let from_array = recover(json!([1, 2]), wrap_description);
        assert_eq!(from_array.get("description"), Some(&json!("[1,2]")));
    }

    #[test]
    fn parse_json_object_rejects_non_objects() {
        assert!(parse_json_object("").is_none());
        assert!(parse_json_object("[1,2,3]").is_none());
        assert!(parse_json_object("\"text\"").is_none());
        assert!(parse_json_object("{broken").is_none());
    }
}
