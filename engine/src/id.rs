//! Entity identifiers.
//!
//! Ids are either strings or integers, mirroring the two key types a JSON
//! record can carry in its id field.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Num(i64),
    Str(String),
}

impl EntityId {
    /// Read an id out of a JSON value.
    ///
    /// Strings and integers are accepted; anything else (floats, objects,
    /// `null`) is not an id.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(EntityId::Str(s.clone())),
            Value::Number(n) => n.as_i64().map(EntityId::Num),
            _ => None,
        }
    }

    /// JSON form of this id, as it appears in an entity's id field.
    pub fn to_json(&self) -> Value {
        match self {
            EntityId::Num(n) => Value::from(*n),
            EntityId::Str(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Num(n) => write!(f, "{}", n),
            EntityId::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(n: i64) -> Self {
        EntityId::Num(n)
    }
}

impl From<i32> for EntityId {
    fn from(n: i32) -> Self {
        EntityId::Num(n.into())
    }
}

impl From<u32> for EntityId {
    fn from(n: u32) -> Self {
        EntityId::Num(n.into())
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        EntityId::Str(s.to_string())
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        EntityId::Str(s)
    }
}

impl From<&EntityId> for EntityId {
    fn from(id: &EntityId) -> Self {
        id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_accepts_strings_and_integers() {
        assert_eq!(EntityId::from_json(&json!(7)), Some(EntityId::Num(7)));
        assert_eq!(
            EntityId::from_json(&json!("todo-1")),
            Some(EntityId::Str("todo-1".into()))
        );
        assert_eq!(EntityId::from_json(&json!(1.5)), None);
        assert_eq!(EntityId::from_json(&json!(null)), None);
        assert_eq!(EntityId::from_json(&json!({"id": 1})), None);
    }

    #[test]
    fn json_form_matches_variant() {
        assert_eq!(EntityId::from(3).to_json(), json!(3));
        assert_eq!(EntityId::from("a").to_json(), json!("a"));
    }

    #[test]
    fn numeric_and_string_ids_are_distinct() {
        assert_ne!(EntityId::from(1), EntityId::from("1"));
    }

    #[test]
    fn usable_as_json_map_key() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(EntityId::from(1), "one");
        map.insert(EntityId::from("two"), "two");

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json, json!({"1": "one", "two": "two"}));
    }
}
