//! Primitive constructor argument values.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A primitive constructor argument.
///
/// Serialized untagged, so `true`, `42` and `"0xabc"` round-trip as plain
/// JSON/TOML values.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// A boolean.
    Bool(bool),
    /// A signed integer. Values beyond `i64` are passed as decimal text.
    Int(i64),
    /// Text: addresses, hex blobs, big numbers and plain strings.
    Text(String),
}

impl ArgValue {
    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Computes a stable digest of an argument list.
///
/// The same arguments always hash the same, so the digest can be compared
/// across runs.
#[must_use]
pub fn hash_arguments(args: &[ArgValue]) -> String {
    let json = serde_json::to_string(args).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Formats an argument list for logs: `["0xabc", 5, true]`.
#[must_use]
pub fn format_arguments(args: &[ArgValue]) -> String {
    let parts: Vec<String> = args.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_serialization() {
        let args = vec![
            ArgValue::from("0xAAA"),
            ArgValue::from(42_i64),
            ArgValue::from(true),
        ];
        let json = serde_json::to_string(&args).unwrap();
        assert_eq!(json, r#"["0xAAA",42,true]"#);

        let back: Vec<ArgValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, args);
    }

    #[test]
    fn test_hash_arguments_is_stable() {
        let a = vec![ArgValue::from("0xAAA"), ArgValue::from(1_i64)];
        let b = vec![ArgValue::from("0xAAA"), ArgValue::from(1_i64)];
        let c = vec![ArgValue::from("0xAAA"), ArgValue::from(2_i64)];

        assert_eq!(hash_arguments(&a), hash_arguments(&b));
        assert_ne!(hash_arguments(&a), hash_arguments(&c));
        assert_eq!(hash_arguments(&a).len(), 32);
    }

    #[test]
    fn test_order_matters() {
        let a = vec![ArgValue::from(1_i64), ArgValue::from(2_i64)];
        let b = vec![ArgValue::from(2_i64), ArgValue::from(1_i64)];
        assert_ne!(hash_arguments(&a), hash_arguments(&b));
    }

    #[test]
    fn test_format_arguments() {
        let args = vec![ArgValue::from("0xabc"), ArgValue::from(5_i64), ArgValue::from(false)];
        assert_eq!(format_arguments(&args), r#"["0xabc", 5, false]"#);
    }
}
