//! Stored representation of system configuration values.
//!
//! Configuration rows keep their value as a single text blob. Reads decode
//! the blob into a [`ConfigValue`] with a fixed precedence (structured
//! document, then number, then raw text); writes encode a JSON value back to
//! text. Values with no text form (null, booleans) have no encoding and the
//! caller decides whether that collapses to an empty blob or fails.

use serde::{Deserialize, Serialize};

/// Numeric configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConfigNumber {
    Int(i64),
    Float(f64),
}

/// Decoded configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Text(String),
    Number(ConfigNumber),
    Structured(serde_json::Value),
}

impl ConfigValue {
    /// Decodes a stored blob.
    ///
    /// Precedence: a valid JSON document (a JSON string decodes to `Text`,
    /// a JSON number to `Number`); otherwise a numeric literal (integer when
    /// it has no decimal point, float otherwise); otherwise the raw text.
    #[must_use]
    pub fn decode(raw: &str) -> Self {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(raw) {
            return match json {
                serde_json::Value::String(s) => ConfigValue::Text(s),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => ConfigValue::Number(ConfigNumber::Int(i)),
                    None => ConfigValue::Number(ConfigNumber::Float(n.as_f64().unwrap_or_default())),
                },
                other => ConfigValue::Structured(other),
            };
        }
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            if trimmed.contains('.') {
                if let Ok(f) = trimmed.parse::<f64>() {
                    if f.is_finite() {
                        return ConfigValue::Number(ConfigNumber::Float(f));
                    }
                }
            } else if let Ok(i) = trimmed.parse::<i64>() {
                return ConfigValue::Number(ConfigNumber::Int(i));
            }
        }
        ConfigValue::Text(raw.to_string())
    }

    /// Encodes a JSON value for storage.
    ///
    /// Strings pass through unchanged, numbers use their literal form, arrays
    /// and objects are serialized. Returns `None` for null and booleans.
    #[must_use]
    pub fn encode(value: &serde_json::Value) -> Option<String> {
        match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Some(value.to_string()),
            serde_json::Value::Null | serde_json::Value::Bool(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Number(ConfigNumber::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// JSON form for transport responses.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::Text(s) => serde_json::Value::String(s.clone()),
            ConfigValue::Number(ConfigNumber::Int(i)) => serde_json::Value::from(*i),
            ConfigValue::Number(ConfigNumber::Float(f)) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            ConfigValue::Structured(json) => json.clone(),
        }
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Number(ConfigNumber::Int(i))
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Text(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn decode_precedence() {
        assert_eq!(
            ConfigValue::decode(r#"{"a":1}"#),
            ConfigValue::Structured(json!({"a": 1}))
        );
        assert_eq!(ConfigValue::decode("42"), ConfigValue::from(42));
        assert_eq!(
            ConfigValue::decode("1.5"),
            ConfigValue::Number(ConfigNumber::Float(1.5))
        );
        assert_eq!(ConfigValue::decode("hello"), ConfigValue::from("hello"));
        assert_eq!(ConfigValue::decode(""), ConfigValue::from(""));
        // Not valid JSON, but numeric after trimming.
        assert_eq!(ConfigValue::decode(" 7"), ConfigValue::from(7));
        assert_eq!(
            ConfigValue::decode("true"),
            ConfigValue::Structured(json!(true))
        );
    }

    #[test]
    fn encode_precedence() {
        assert_eq!(ConfigValue::encode(&json!("abc")), Some("abc".to_string()));
        assert_eq!(ConfigValue::encode(&json!(12)), Some("12".to_string()));
        assert_eq!(ConfigValue::encode(&json!([1, 2])), Some("[1,2]".to_string()));
        assert_eq!(ConfigValue::encode(&json!(null)), None);
        assert_eq!(ConfigValue::encode(&json!(false)), None);
    }

    #[test]
    fn snapshot_survives_msgpack() {
        let value = ConfigValue::Structured(json!({"menu": ["a", "b"]}));
        let bytes = rmp_serde::to_vec(&value).unwrap();
        let back: ConfigValue = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back, value);
    }

    proptest! {
        #[test]
        fn integers_survive_encode_decode(n in any::<i64>()) {
            let stored = ConfigValue::encode(&json!(n)).unwrap();
            prop_assert_eq!(ConfigValue::decode(&stored), ConfigValue::from(n));
        }

        #[test]
        fn plain_words_stay_text(word in "[a-z]{1,12}") {
            prop_assume!(!matches!(word.as_str(), "true" | "false" | "null"));
            let stored = ConfigValue::encode(&json!(word)).unwrap();
            prop_assert_eq!(ConfigValue::decode(&stored), ConfigValue::Text(word));
        }
    }
}
