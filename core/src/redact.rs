use crate::value::ArgValue;

pub const MAX_RECEIVED_CHARS: usize = 200;
pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_FIELD_MARKERS: [&str; 4] = ["key", "token", "secret", "password"];

/// Case-insensitive match on the whole field path, so `auth.token` and
/// `headers[0].api_key` are both caught.
pub fn is_sensitive_field(field: &str) -> bool {
    let lowered = field.to_ascii_lowercase();
    SENSITIVE_FIELD_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}

pub fn describe_received(field: &str, value: &ArgValue) -> String {
    if is_sensitive_field(field) {
        return REDACTED.to_string();
    }
    match value {
        ArgValue::Null => "null".to_string(),
        ArgValue::Bool(b) => b.to_string(),
        ArgValue::Number(n) => n.to_string(),
        ArgValue::String(s) => quote_truncated(s),
        ArgValue::Array(items) => match items.len() {
            1 => "array with 1 item".to_string(),
            n => format!("array with {n} items"),
        },
        ArgValue::Object(map) => match map.len() {
            1 => "object with 1 key".to_string(),
            n => format!("object with {n} keys"),
        },
    }
}

/// Same policy as [`describe_received`] for raw strings that never went
/// through the value model (path inputs, handle tokens).
pub fn describe_text(field: &str, text: &str) -> String {
    if is_sensitive_field(field) {
        return REDACTED.to_string();
    }
    quote_truncated(text)
}

fn quote_truncated(text: &str) -> String {
    let total = text.chars().count();
    if total <= MAX_RECEIVED_CHARS {
        return format!("\"{text}\"");
    }
    let head: String = text.chars().take(MAX_RECEIVED_CHARS).collect();
    format!("\"{head}\"...[truncated, {total} chars]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credential_like_fields_are_fully_redacted() {
        let value = ArgValue::from("sk-abcdef");
        for field in ["api_key", "API_KEY", "auth.Token", "client_secret", "db[0].password"] {
            let rendered = describe_received(field, &value);
            assert_eq!(rendered, REDACTED, "field {field}");
            assert!(!rendered.contains("sk-abcdef"));
        }
        assert_eq!(describe_text("x_api_key", "sk-abcdef"), REDACTED);
    }

    #[test]
    fn long_strings_are_truncated_with_marker() {
        let long = "a".repeat(450);
        let rendered = describe_received("focus", &ArgValue::from(long.as_str()));
        assert!(rendered.contains("...[truncated, 450 chars]"));
        assert!(rendered.len() < 260);
        let short = describe_received("focus", &ArgValue::from("short"));
        assert_eq!(short, "\"short\"");
    }

    #[test]
    fn truncation_starts_past_the_limit() {
        let at_limit = "b".repeat(MAX_RECEIVED_CHARS);
        assert_eq!(describe_text("focus", &at_limit), format!("\"{at_limit}\""));

        let over = "b".repeat(MAX_RECEIVED_CHARS + 1);
        assert_eq!(
            describe_text("focus", &over),
            format!("\"{at_limit}\"...[truncated, 201 chars]")
        );

        let wide = "é".repeat(MAX_RECEIVED_CHARS);
        assert!(!describe_text("focus", &wide).contains("truncated"));
    }

    #[test]
    fn containers_are_summarized_by_count() {
        let array = ArgValue::from_json(&json!(["secret-a", "secret-b", "secret-c"]));
        assert_eq!(describe_received("profiles", &array), "array with 3 items");
        let object = ArgValue::from_json(&json!({"inner": "value"}));
        assert_eq!(describe_received("labels", &object), "object with 1 key");
        let hours = ArgValue::from_json(&json!(12));
        assert_eq!(describe_received("hours", &hours), "12");
    }
}
