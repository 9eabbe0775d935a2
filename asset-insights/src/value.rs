//! Typed domain value representation for alert records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A typed value extracted from (or destined for) a wire-format record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum FieldValue {
    /// Null/absent value
    Null,
    /// String value
    String(String),
    /// Whole number
    Int(i64),
    /// Floating point (severity scores, counters from older tenants)
    Float(f64),
    /// Boolean
    Bool(bool),
    /// UTC instant
    Timestamp(DateTime<Utc>),
    /// Structured payload the field table does not model (arrays, nested objects)
    Json(serde_json::Value),
}

impl FieldValue {
    /// Check if this value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            FieldValue::Float(f) => Some(*f),
            FieldValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to get as UTC timestamp
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Convert to JSON value for API payloads
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Null => serde_json::Value::Null,
            FieldValue::String(s) => serde_json::Value::String(s.clone()),
            FieldValue::Int(i) => serde_json::json!(*i),
            FieldValue::Float(f) => serde_json::json!(*f),
            FieldValue::Bool(b) => serde_json::Value::Bool(*b),
            FieldValue::Timestamp(t) => serde_json::Value::String(t.to_rfc3339()),
            FieldValue::Json(v) => v.clone(),
        }
    }

    /// Parse from a JSON wire value, without interpreting string contents
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::Null
                }
            }
            serde_json::Value::String(s) => FieldValue::String(s.clone()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                FieldValue::Json(json.clone())
            }
        }
    }
}

impl std::fmt::Display for FieldValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldValue::Null => write!(f, "(null)"),
            FieldValue::String(s) => write!(f, "{}", s),
            FieldValue::Int(i) => write!(f, "{}", i),
            FieldValue::Float(fl) => write!(f, "{}", fl),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            FieldValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(FieldValue::from_json(&json!(null)), FieldValue::Null);
        assert_eq!(FieldValue::from_json(&json!(true)), FieldValue::Bool(true));
        assert_eq!(FieldValue::from_json(&json!(42)), FieldValue::Int(42));
        assert_eq!(FieldValue::from_json(&json!(2.5)), FieldValue::Float(2.5));
        assert_eq!(
            FieldValue::from_json(&json!("Pump overheating")),
            FieldValue::String("Pump overheating".into())
        );
    }

    #[test]
    fn test_from_json_keeps_strings_verbatim() {
        // Date-looking strings stay strings unless a field extractor says otherwise
        let v = FieldValue::from_json(&json!("2021-01-01T16:00:00Z"));
        assert_eq!(v, FieldValue::String("2021-01-01T16:00:00Z".into()));
    }

    #[test]
    fn test_from_json_structured() {
        let payload = json!({"nested": [1, 2, 3]});
        assert_eq!(
            FieldValue::from_json(&payload),
            FieldValue::Json(payload.clone())
        );
    }

    #[test]
    fn test_round_trip_to_json() {
        let v = FieldValue::Int(10);
        assert_eq!(v.to_json(), json!(10));
        let v = FieldValue::String("A".into());
        assert_eq!(v.to_json(), json!("A"));
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(FieldValue::Int(3).as_float(), Some(3.0));
        assert_eq!(FieldValue::Float(3.5).as_int(), None);
    }
}
