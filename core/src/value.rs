use std::collections::BTreeMap;

use serde_json::{Map, Number, Value};

/// Tool arguments after conversion at the protocol edge.
///
/// Keys are kept sorted so every traversal (validation, sanitizing,
/// error reporting) visits them in the same order for the same input.
pub type ArgMap = BTreeMap<String, ArgValue>;

/// Closed set of argument shapes the gate understands.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<ArgValue>),
    Object(ArgMap),
}

impl ArgValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ArgValue::Null,
            Value::Bool(b) => ArgValue::Bool(*b),
            Value::Number(n) => ArgValue::Number(n.clone()),
            Value::String(s) => ArgValue::String(s.clone()),
            Value::Array(items) => ArgValue::Array(items.iter().map(ArgValue::from_json).collect()),
            Value::Object(map) => ArgValue::Object(args_from_json(map)),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ArgValue::Null => Value::Null,
            ArgValue::Bool(b) => Value::Bool(*b),
            ArgValue::Number(n) => Value::Number(n.clone()),
            ArgValue::String(s) => Value::String(s.clone()),
            ArgValue::Array(items) => Value::Array(items.iter().map(ArgValue::to_json).collect()),
            ArgValue::Object(map) => Value::Object(args_to_json(map)),
        }
    }

    /// Lowercase label used in type-mismatch messages.
    pub fn kind_label(&self) -> &'static str {
        match self {
            ArgValue::Null => "null",
            ArgValue::Bool(_) => "boolean",
            ArgValue::Number(_) if self.is_integer() => "integer",
            ArgValue::Number(_) => "number",
            ArgValue::String(_) => "string",
            ArgValue::Array(_) => "array",
            ArgValue::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ArgValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ArgValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ArgValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Whole number as `i64`, accepting floats such as `2.0` the same way
    /// [`ArgValue::is_integer`] does.
    pub fn as_integer(&self) -> Option<i64> {
        let ArgValue::Number(n) = self else {
            return None;
        };
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
        n.as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .filter(|f| *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    }

    pub fn as_array(&self) -> Option<&[ArgValue]> {
        match self {
            ArgValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ArgMap> {
        match self {
            ArgValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Whole numbers only: any i64/u64, or a finite float without a fractional part.
    pub fn is_integer(&self) -> bool {
        match self {
            ArgValue::Number(n) => {
                n.is_i64()
                    || n.is_u64()
                    || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }
            _ => false,
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::String(value)
    }
}

pub fn args_from_json(map: &Map<String, Value>) -> ArgMap {
    map.iter()
        .map(|(key, value)| (key.clone(), ArgValue::from_json(value)))
        .collect()
}

pub fn args_to_json(args: &ArgMap) -> Map<String, Value> {
    args.iter()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect()
}

/// Optional string argument; empty strings count as absent.
pub fn optional_str<'a>(args: &'a ArgMap, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(ArgValue::as_str)
        .filter(|value| !value.is_empty())
}
