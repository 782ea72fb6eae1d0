use serde_json::{Value, json};

pub fn to_pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn serialized_json_size_bytes(value: &Value) -> usize {
    serde_json::to_vec(value)
        .map(|bytes| bytes.len())
        .unwrap_or(usize::MAX)
}

/// Type and size of a value without its contents.
pub fn summarize_json_shape(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sample_keys = map.keys().take(20).cloned().collect::<Vec<_>>();
            sample_keys.sort();
            json!({
                "omitted": true,
                "type": "object",
                "key_count": map.len(),
                "sample_keys": sample_keys
            })
        }
        Value::Array(items) => json!({
            "omitted": true,
            "type": "array",
            "item_count": items.len()
        }),
        Value::String(s) => json!({
            "omitted": true,
            "type": "string",
            "char_count": s.chars().count()
        }),
        Value::Number(_) => json!({ "omitted": true, "type": "number" }),
        Value::Bool(_) => json!({ "omitted": true, "type": "boolean" }),
        Value::Null => json!({ "omitted": true, "type": "null" }),
    }
}
