use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::period::iso;

/// Typed value of a named event attribute.
///
/// Serializes as `{"type": "text", "value": ...}`, `{"type": "double", ...}` or
/// `{"type": "timestamp", ...}` so stored payloads stay self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Text(String),
    Double(f64),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Timestamp(t) => write!(f, "{}", iso(*t)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(flatten)]
    pub value: Value,
}

impl Attribute {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute { name: name.into(), value: Value::Text(value.into()) }
    }

    pub fn double(name: impl Into<String>, value: impl Into<f64>) -> Self {
        Attribute { name: name.into(), value: Value::Double(value.into()) }
    }

    pub fn timestamp(name: impl Into<String>, value: NaiveDateTime) -> Self {
        Attribute { name: name.into(), value: Value::Timestamp(value) }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self.value {
            Value::Double(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self.value {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let attr = Attribute::text("concept", "SUPERMART");
        let json = serde_json::to_value(&attr).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "concept", "type": "text", "value": "SUPERMART"})
        );
    }

    #[test]
    fn round_trips_through_json() {
        let attr = Attribute::double("amount", -0.1 + -0.2);
        let back: Attribute = serde_json::from_str(&serde_json::to_string(&attr).unwrap()).unwrap();
        assert_eq!(back, attr);
        assert_eq!(back.as_double(), Some(-0.30000000000000004));
        assert_eq!(back.as_text(), None);
    }
}
