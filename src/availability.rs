//! The "available visualizations" descriptor shipped with a result set.
//!
//! Servers have sent it as a bare boolean, as a name → flag mapping, as a
//! name → file path mapping, and as a list of names. All of them answer the
//! same question: should this remote name be fetched?

use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    /// No descriptor, or a truthy scalar: attempt every slot
    All,
    /// A falsy scalar: attempt nothing
    Nothing,
    Named(Map<String, Value>),
    Listed(Vec<String>),
}

/// Presence test for one descriptor entry.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "" | "false" | "0"),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A mapping entry that exists marks its slot present unless it is an explicit negative.
pub fn is_explicitly_absent(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !*b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f == 0.0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "false" | "0"),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}

impl Availability {
    pub fn from_value(descriptor: Option<&Value>) -> Self {
        match descriptor {
            None | Some(Value::Null) => Availability::All,
            Some(Value::Object(map)) => Availability::Named(map.clone()),
            Some(Value::Array(items)) => {
                Availability::Listed(items.iter().filter_map(Value::as_str).map(String::from).collect())
            }
            Some(scalar) if is_truthy(scalar) => Availability::All,
            Some(_) => Availability::Nothing,
        }
    }

    pub fn is_present(&self, remote_name: &str) -> bool {
        match self {
            Availability::All => true,
            Availability::Nothing => false,
            Availability::Named(map) => map.get(remote_name).map_or(false, |v| !is_explicitly_absent(v)),
            Availability::Listed(names) => names.iter().any(|n| n == remote_name),
        }
    }
}

impl Default for Availability {
    fn default() -> Self {
        Availability::All
    }
}
