/*
    value.rs - Typed item values

    Items are stored as bytes. Typed values use a tagged text form so every
    device decodes them the same way:

      [STRING]hello      [NUMBER]1.5      [BOOLEAN]true
      [NULL]             [COMPLEX]{"a":1}
*/

use super::errors::{ObjectError, ObjectResult};
use serde_json::Value as JsonValue;

const STRING_TAG: &str = "[STRING]";
const NUMBER_TAG: &str = "[NUMBER]";
const BOOLEAN_TAG: &str = "[BOOLEAN]";
const NULL_TAG: &str = "[NULL]";
const COMPLEX_TAG: &str = "[COMPLEX]";

/// A typed item value
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Arrays and maps, stored as JSON
    Complex(JsonValue),
}

impl ObjectValue {
    /// Tagged byte encoding
    pub fn encode(&self) -> Vec<u8> {
        let text = match self {
            ObjectValue::Null => NULL_TAG.to_string(),
            ObjectValue::Bool(b) => format!("{BOOLEAN_TAG}{b}"),
            ObjectValue::Number(n) => format!("{NUMBER_TAG}{n}"),
            ObjectValue::String(s) => format!("{STRING_TAG}{s}"),
            ObjectValue::Complex(v) => format!("{COMPLEX_TAG}{v}"),
        };
        text.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> ObjectResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ObjectError::InvalidValue(format!("not utf-8: {}", e)))?;

        if let Some(rest) = text.strip_prefix(STRING_TAG) {
            return Ok(ObjectValue::String(rest.to_string()));
        }
        if text == NULL_TAG {
            return Ok(ObjectValue::Null);
        }
        if let Some(rest) = text.strip_prefix(NUMBER_TAG) {
            return rest
                .parse()
                .map(ObjectValue::Number)
                .map_err(|e| ObjectError::InvalidValue(format!("bad number '{}': {}", rest, e)));
        }
        if let Some(rest) = text.strip_prefix(BOOLEAN_TAG) {
            return rest
                .parse()
                .map(ObjectValue::Bool)
                .map_err(|e| ObjectError::InvalidValue(format!("bad boolean '{}': {}", rest, e)));
        }
        if let Some(rest) = text.strip_prefix(COMPLEX_TAG) {
            return serde_json::from_str(rest)
                .map(ObjectValue::Complex)
                .map_err(|e| ObjectError::InvalidValue(format!("bad json: {}", e)));
        }

        Err(ObjectError::InvalidValue(format!("untagged value '{}'", text)))
    }
}

impl From<&str> for ObjectValue {
    fn from(s: &str) -> Self {
        ObjectValue::String(s.to_string())
    }
}

impl From<String> for ObjectValue {
    fn from(s: String) -> Self {
        ObjectValue::String(s)
    }
}

impl From<f64> for ObjectValue {
    fn from(n: f64) -> Self {
        ObjectValue::Number(n)
    }
}

impl From<bool> for ObjectValue {
    fn from(b: bool) -> Self {
        ObjectValue::Bool(b)
    }
}

/// JSON scalars map to their own variants; only arrays and objects are complex
impl From<JsonValue> for ObjectValue {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => ObjectValue::Null,
            JsonValue::Bool(b) => ObjectValue::Bool(b),
            JsonValue::Number(n) => n.as_f64().map(ObjectValue::Number).unwrap_or(ObjectValue::Null),
            JsonValue::String(s) => ObjectValue::String(s),
            other => ObjectValue::Complex(other),
        }
    }
}
