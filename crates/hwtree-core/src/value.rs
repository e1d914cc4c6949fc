//! Typed hint values attached to device nodes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Display string used for an absent value
pub const NIL_DISPLAY: &str = "(nil)";

/// An immutable tagged value used as the payload of node hints.
///
/// Serialized untagged so scan records can write hints as plain
/// integers, strings and booleans (`null` for an absent value).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// No value
    #[default]
    Nil,
    /// Signed 64-bit integer
    Integer(i64),
    /// Boolean flag
    Boolean(bool),
    /// Free-form text
    Text(String),
}

impl Value {
    /// Create an absent value
    pub fn nil() -> Self {
        Self::Nil
    }

    /// True unless the value is absent
    pub fn is_defined(&self) -> bool {
        !matches!(self, Self::Nil)
    }

    /// Canonical string rendering.
    ///
    /// Integers render as uppercase hexadecimal with a `0x` prefix, using
    /// the two's complement bit pattern for negative numbers.
    pub fn as_string(&self) -> String {
        match self {
            Self::Nil => NIL_DISPLAY.to_string(),
            Self::Integer(n) => format!("0x{:X}", *n as u64),
            Self::Boolean(b) => b.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::nil(), Value::default());
        assert_eq!(Value::from(42), Value::Integer(42));
        assert_ne!(Value::from(1), Value::from(true));
        assert_ne!(Value::from("1"), Value::from(1));
        assert_ne!(Value::from("a"), Value::from("b"));
    }

    #[test]
    fn test_value_rendering() {
        assert_eq!(Value::from(255).as_string(), "0xFF");
        assert_eq!(Value::from(0).as_string(), "0x0");
        assert_eq!(Value::from(-1).as_string(), "0xFFFFFFFFFFFFFFFF");
        assert_eq!(Value::from(true).as_string(), "true");
        assert_eq!(Value::from(false).to_string(), "false");
        assert_eq!(Value::from("eth0").as_string(), "eth0");
        assert_eq!(Value::nil().as_string(), NIL_DISPLAY);
    }

    #[test]
    fn test_value_defined() {
        assert!(!Value::nil().is_defined());
        assert!(Value::from(0).is_defined());
        assert!(Value::from("").is_defined());
    }

    #[test]
    fn test_value_untagged_json() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, 16, true, "pci"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Nil,
                Value::Integer(16),
                Value::Boolean(true),
                Value::Text("pci".to_string()),
            ]
        );
    }
}
