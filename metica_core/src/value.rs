use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

/// Enum representing a dynamically-typed value.
///
/// Remote-config values and custom event payload fields are dynamically typed on the wire, so
/// they are carried as a tagged union rather than an opaque object.
///
/// Conveniently implements `From` conversions for `String`, `&str`, `f64`, and `bool` types.
///
/// Examples:
/// ```
/// # use metica_core::Value;
/// let string_value: Value = "example".into();
/// let number_value: Value = 42.0.into();
/// let bool_value: Value = true.into();
/// ```
#[derive(Debug, Serialize, Deserialize, PartialEq, From, Clone)]
#[serde(untagged)]
pub enum Value {
    /// A null value or absence of value.
    Null,
    /// A boolean value.
    Boolean(bool),
    /// A numerical value.
    Number(f64),
    /// A string value.
    String(String),
    /// An ordered list of values.
    Array(Vec<Value>),
    /// A string-keyed map of values.
    Object(HashMap<String, Value>),
}

impl Value {
    /// Returns the string slice if the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(s) = self {
            Some(s.as_str())
        } else {
            None
        }
    }

    /// Returns the number if the value is numerical.
    pub fn as_f64(&self) -> Option<f64> {
        if let Value::Number(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    /// Returns the boolean if the value is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Boolean(b) = self {
            Some(*b)
        } else {
            None
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}
