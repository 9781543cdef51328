//! Composite entity keys.
//!
//! A key is the ordered tuple of an entity's key member values. Only values
//! with stable equality and hashing can take part in a key: booleans,
//! integers and strings. Nulls, floats and structured values are rejected.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single key member value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Text(String),
}

impl KeyValue {
    /// Converts a JSON member value into a key value.
    pub fn from_json(member: &str, value: &serde_json::Value) -> crate::Result<Self> {
        let invalid = |reason: &str| Error::InvalidKey {
            member: member.to_string(),
            reason: reason.to_string(),
        };
        match value {
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(u) = n.as_u64() {
                    Ok(Self::UInt(u))
                } else {
                    Err(invalid("floating point values cannot be key members"))
                }
            }
            serde_json::Value::Null => Err(invalid("key member is null")),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Err(invalid("structured values cannot be key members"))
            }
        }
    }

    /// Returns the JSON representation of this key value.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::UInt(u) => serde_json::Value::from(*u),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::UInt(u) => write!(f, "{u}"),
            Self::Text(s) => write!(f, "{s:?}"),
        }
    }
}

/// The identity of an entity within its type: ordered `(member, value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    parts: Vec<(String, KeyValue)>,
}

impl EntityKey {
    /// Creates a key from already-converted parts.
    #[must_use]
    pub fn new(parts: Vec<(String, KeyValue)>) -> Self {
        Self { parts }
    }

    /// Builds a key by converting JSON member values in key-member order.
    pub fn from_json<'a, I>(members: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a serde_json::Value)>,
    {
        let parts = members
            .into_iter()
            .map(|(name, value)| Ok((name.to_string(), KeyValue::from_json(name, value)?)))
            .collect::<crate::Result<Vec<_>>>()?;
        Ok(Self { parts })
    }

    /// Shorthand for a single-member key.
    #[must_use]
    pub fn single(member: impl Into<String>, value: KeyValue) -> Self {
        Self {
            parts: vec![(member.into(), value)],
        }
    }

    /// Returns the key parts in member order.
    #[must_use]
    pub fn parts(&self) -> &[(String, KeyValue)] {
        &self.parts
    }

    /// Returns the value of a named key member.
    #[must_use]
    pub fn get(&self, member: &str) -> Option<&KeyValue> {
        self.parts
            .iter()
            .find(|(name, _)| name == member)
            .map(|(_, value)| value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, (name, value)) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}={value}")?;
        }
        write!(f, ")")
    }
}
