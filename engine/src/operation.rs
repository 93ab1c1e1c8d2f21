//! Operation vocabulary: which entities an operation targets and how a
//! change is expressed.
//!
//! A change is either a literal partial (a JSON object) or a callback that
//! produces one from the current value. Both are resolved to a concrete
//! object before anything is merged.

use crate::{error::Result, EntityId, Error};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A partial record: the fields to overwrite.
pub type Patch = Map<String, Value>;

/// Which entities an operation applies to.
pub enum Target<'a, E> {
    /// Every entity, in `ids` order.
    All,
    /// One explicit id.
    Id(EntityId),
    /// A list of explicit ids.
    Ids(Vec<EntityId>),
    /// Every entity the predicate accepts, in `ids` order.
    Where(Box<dyn Fn(&E) -> bool + 'a>),
}

impl<'a, E> Target<'a, E> {
    /// Target the entities matching `predicate`.
    pub fn filter(predicate: impl Fn(&E) -> bool + 'a) -> Self {
        Target::Where(Box::new(predicate))
    }

    /// Target an explicit list of ids.
    pub fn ids<I: Into<EntityId>>(ids: impl IntoIterator<Item = I>) -> Self {
        Target::Ids(ids.into_iter().map(Into::into).collect())
    }
}

impl<E> fmt::Debug for Target<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::All => f.write_str("All"),
            Target::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Target::Ids(ids) => f.debug_tuple("Ids").field(ids).finish(),
            Target::Where(_) => f.write_str("Where(..)"),
        }
    }
}

macro_rules! target_from_ids {
    ($($ty:ty),*) => {
        $(
            impl<E> From<$ty> for Target<'_, E> {
                fn from(id: $ty) -> Self {
                    Target::Id(id.into())
                }
            }

            impl<E> From<Vec<$ty>> for Target<'_, E> {
                fn from(ids: Vec<$ty>) -> Self {
                    Target::ids(ids)
                }
            }

            impl<E, const N: usize> From<[$ty; N]> for Target<'_, E> {
                fn from(ids: [$ty; N]) -> Self {
                    Target::ids(ids)
                }
            }
        )*
    };
}

target_from_ids!(i32, i64, u32, &str, String, EntityId);

impl<E> From<&EntityId> for Target<'_, E> {
    fn from(id: &EntityId) -> Self {
        Target::Id(id.clone())
    }
}

/// How the targeted value changes.
pub enum Change<'a, T> {
    /// Merge this partial as-is.
    Patch(Value),
    /// Compute the partial from the current value.
    With(Box<dyn Fn(&T) -> Value + 'a>),
}

impl<'a, T> Change<'a, T> {
    /// Build a change from a callback over the current value.
    pub fn with(f: impl Fn(&T) -> Value + 'a) -> Self {
        Change::With(Box::new(f))
    }

    /// Resolve to the concrete partial for `current`.
    pub fn resolve(&self, current: &T) -> Result<Patch> {
        let value = match self {
            Change::Patch(value) => value.clone(),
            Change::With(f) => f(current),
        };
        match value {
            Value::Object(patch) => Ok(patch),
            other => Err(Error::InvalidPatch(format!(
                "expected a JSON object, got {}",
                kind_of(&other)
            ))),
        }
    }
}

impl<T> fmt::Debug for Change<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Patch(value) => f.debug_tuple("Patch").field(value).finish(),
            Change::With(_) => f.write_str("With(..)"),
        }
    }
}

impl<T> From<Value> for Change<'_, T> {
    fn from(value: Value) -> Self {
        Change::Patch(value)
    }
}

impl<T> From<Patch> for Change<'_, T> {
    fn from(patch: Patch) -> Self {
        Change::Patch(Value::Object(patch))
    }
}

/// Overwrite top-level fields of `base` with those of `patch`.
pub fn shallow_merge(base: &mut Patch, patch: Patch) {
    for (key, value) in patch {
        base.insert(key, value);
    }
}

/// Recursively merge `patch` into `base`.
///
/// Objects merge key by key; any other patch value (arrays included)
/// replaces what was there.
pub fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                match base.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

/// Deep-merge `patch` into the JSON form of `current` and rebuild a `T`.
///
/// Every top-level key of `patch` must already be a field of `current`;
/// otherwise serde would drop it and the merge would change nothing.
pub fn merge_deep_into<T: Serialize + DeserializeOwned>(current: &T, patch: Patch) -> Result<T> {
    let mut value =
        serde_json::to_value(current).map_err(|e| Error::InvalidPatch(e.to_string()))?;
    let Some(fields) = value.as_object() else {
        return Err(Error::InvalidPatch(format!(
            "cannot merge fields into {}",
            kind_of(&value)
        )));
    };
    if let Some(key) = patch.keys().find(|key| !fields.contains_key(*key)) {
        return Err(Error::InvalidPatch(format!("unknown field `{}`", key)));
    }
    deep_merge(&mut value, Value::Object(patch));
    serde_json::from_value(value).map_err(|e| Error::InvalidPatch(e.to_string()))
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
