//! Runtime value types for Ruleflow expressions
//!
//! The `Value` enum is what the expression evaluator receives in its context
//! and what it hands back. It mirrors JSON, which keeps records coming from
//! sources and going to sinks in one shape.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Runtime value type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    /// Null value
    #[default]
    Null,
    /// Boolean value
    Bool(bool),
    /// Number value (f64 handles both int and float)
    Number(f64),
    /// String value
    String(String),
    /// Array of values
    Array(Vec<Value>),
    /// Object (key-value map)
    Object(HashMap<String, Value>),
}

impl Value {
    /// Name of the variant, used in type error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Numeric contribution of a value to a running score.
    ///
    /// Numbers count as themselves, booleans as 1 or 0, finite numeric
    /// strings are parsed; anything else contributes nothing.
    pub fn to_contribution(&self) -> f64 {
        match self {
            Value::Number(n) if n.is_finite() => *n,
            Value::Bool(true) => 1.0,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Look up a field on an object value
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(field))
    }

    /// View the value as a list of records: arrays yield their items,
    /// null yields nothing, anything else is a single record.
    pub fn records(&self) -> Vec<&Value> {
        match self {
            Value::Array(items) => items.iter().collect(),
            Value::Null => Vec::new(),
            other => vec![other],
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            other => match serde_json::to_string(other) {
                Ok(json) => write!(f, "{}", json),
                Err(_) => write!(f, "<{}>", other.type_name()),
            },
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_object() {
        let mut map = HashMap::new();
        map.insert("name".to_string(), Value::String("Alice".to_string()));
        map.insert("age".to_string(), Value::Number(25.0));

        let val = Value::Object(map.clone());
        assert_eq!(val.get("age"), Some(&Value::Number(25.0)));
        assert_eq!(val.get("missing"), None);
        assert_eq!(val, Value::Object(map));
    }

    #[test]
    fn test_contribution_conversion() {
        assert_eq!(Value::Number(42.5).to_contribution(), 42.5);
        assert_eq!(Value::Bool(true).to_contribution(), 1.0);
        assert_eq!(Value::Bool(false).to_contribution(), 0.0);
        assert_eq!(Value::from(" 12 ").to_contribution(), 12.0);
        assert_eq!(Value::from("twelve").to_contribution(), 0.0);
        assert_eq!(Value::Null.to_contribution(), 0.0);
        assert_eq!(Value::Array(vec![Value::Number(1.0)]).to_contribution(), 0.0);
    }

    #[test]
    fn test_records_view() {
        let list = Value::Array(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(list.records().len(), 2);
        assert!(Value::Null.records().is_empty());
        assert_eq!(Value::from("one").records().len(), 1);
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::json!({"count": 42, "tags": ["a"], "active": true});
        let val = Value::from(json);

        assert_eq!(val.get("count"), Some(&Value::Number(42.0)));
        assert_eq!(val.get("active"), Some(&Value::Bool(true)));
        assert_eq!(
            val.get("tags"),
            Some(&Value::Array(vec![Value::String("a".to_string())]))
        );
    }

    #[test]
    fn test_value_serde_json() {
        let val = Value::Object({
            let mut map = HashMap::new();
            map.insert("count".to_string(), Value::Number(42.0));
            map.insert("active".to_string(), Value::Bool(true));
            map
        });

        let json = serde_json::to_string(&val).unwrap();
        assert!(json.contains("count"));

        let deserialized: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(val, deserialized);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::from("APPROVED").to_string(), "APPROVED");
        assert_eq!(Value::Number(46.0).to_string(), "46");
        assert_eq!(Value::Null.to_string(), "null");
    }
}
