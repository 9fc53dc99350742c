use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of entries on a single line.
pub const MAX_ENTRIES: usize = 20;

/// Maximum key length in characters.
pub const MAX_KEY_LEN: usize = 64;

/// Maximum text value length in characters.
pub const MAX_TEXT_LEN: usize = 255;

/// A single property value: text, number or boolean.
///
/// Serialized without a tag so clients can send `{"size": "M", "gift": true}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

/// Errors raised when a property map exceeds its bounds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertiesError {
    #[error("too many properties: {count} (max {MAX_ENTRIES})")]
    TooManyEntries { count: usize },

    #[error("invalid property key '{key}' (must be 1..={MAX_KEY_LEN} characters)")]
    InvalidKey { key: String },

    #[error("property '{key}' value is too long (max {MAX_TEXT_LEN} characters)")]
    ValueTooLong { key: String },

    #[error("property '{key}' is not a finite number")]
    NonFiniteNumber { key: String },
}

/// Bounded key/value map attached to cart lines and order items.
///
/// Keys are ordered so two maps with the same entries always serialize
/// identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, PropertyValue>", into = "BTreeMap<String, PropertyValue>")]
pub struct Properties(BTreeMap<String, PropertyValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, enforcing the bounds.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<(), PropertiesError> {
        let key = key.into();
        let value = value.into();
        validate_entry(&key, &value)?;
        if !self.0.contains_key(&key) && self.0.len() >= MAX_ENTRIES {
            return Err(PropertiesError::TooManyEntries {
                count: self.0.len() + 1,
            });
        }
        self.0.insert(key, value);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }
}

fn validate_entry(key: &str, value: &PropertyValue) -> Result<(), PropertiesError> {
    let key_len = key.chars().count();
    if key_len == 0 || key_len > MAX_KEY_LEN {
        return Err(PropertiesError::InvalidKey {
            key: key.to_string(),
        });
    }
    match value {
        PropertyValue::Text(text) if text.chars().count() > MAX_TEXT_LEN => {
            Err(PropertiesError::ValueTooLong {
                key: key.to_string(),
            })
        }
        PropertyValue::Number(n) if !n.is_finite() => Err(PropertiesError::NonFiniteNumber {
            key: key.to_string(),
        }),
        _ => Ok(()),
    }
}

impl TryFrom<BTreeMap<String, PropertyValue>> for Properties {
    type Error = PropertiesError;

    fn try_from(map: BTreeMap<String, PropertyValue>) -> Result<Self, Self::Error> {
        if map.len() > MAX_ENTRIES {
            return Err(PropertiesError::TooManyEntries { count: map.len() });
        }
        for (key, value) in &map {
            validate_entry(key, value)?;
        }
        Ok(Self(map))
    }
}

impl From<Properties> for BTreeMap<String, PropertyValue> {
    fn from(props: Properties) -> Self {
        props.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_mixed_values() {
        let props: Properties =
            serde_json::from_str(r#"{"size": "M", "gift": true, "engraving_lines": 2}"#).unwrap();
        assert_eq!(props.len(), 3);
        assert_eq!(props.get("size"), Some(&PropertyValue::Text("M".into())));
        assert_eq!(props.get("gift"), Some(&PropertyValue::Bool(true)));
        assert_eq!(props.get("engraving_lines"), Some(&PropertyValue::Number(2.0)));
    }

    #[test]
    fn rejects_nested_documents() {
        let result: Result<Properties, _> = serde_json::from_str(r#"{"meta": {"a": 1}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_too_many_entries() {
        let mut map = BTreeMap::new();
        for i in 0..=MAX_ENTRIES {
            map.insert(format!("k{i}"), PropertyValue::Bool(true));
        }
        assert!(matches!(
            Properties::try_from(map),
            Err(PropertiesError::TooManyEntries { .. })
        ));
    }

    #[test]
    fn rejects_long_text_and_empty_key() {
        let mut props = Properties::new();
        let long = "x".repeat(MAX_TEXT_LEN + 1);
        assert!(matches!(
            props.insert("note", long),
            Err(PropertiesError::ValueTooLong { .. })
        ));
        assert!(matches!(
            props.insert("", "v"),
            Err(PropertiesError::InvalidKey { .. })
        ));
        assert!(props.is_empty());
    }

    #[test]
    fn serialization_is_key_ordered() {
        let mut props = Properties::new();
        props.insert("b", "2").unwrap();
        props.insert("a", "1").unwrap();
        assert_eq!(serde_json::to_string(&props).unwrap(), r#"{"a":"1","b":"2"}"#);
    }
}
