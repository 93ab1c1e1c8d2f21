//! Entities: the records an entity store holds.
//!
//! Any serde record type can be stored. The store reads the id from the
//! record's JSON form under the configured key, and an update produces a new
//! record by shallow-merging a partial into that JSON form.

use crate::{
    error::Result,
    operation::{kind_of, shallow_merge, Patch},
    EntityId, Error,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// A record that can live in an entity store.
pub trait Entity: Clone + 'static {
    /// Read the id stored under `key`.
    fn id(&self, key: &str) -> Result<EntityId>;

    /// Produce a new entity with `patch` merged over this one's fields.
    fn merge(&self, patch: &Patch) -> Result<Self>;
}

impl<T> Entity for T
where
    T: Clone + Serialize + DeserializeOwned + 'static,
{
    fn id(&self, key: &str) -> Result<EntityId> {
        let value = serde_json::to_value(self).map_err(|e| Error::InvalidPatch(e.to_string()))?;
        value
            .get(key)
            .and_then(EntityId::from_json)
            .ok_or_else(|| Error::MissingId {
                key: key.to_string(),
            })
    }

    fn merge(&self, patch: &Patch) -> Result<Self> {
        let mut value =
            serde_json::to_value(self).map_err(|e| Error::InvalidPatch(e.to_string()))?;
        if !value.is_object() {
            return Err(Error::InvalidPatch(format!(
                "entity is {}, not an object",
                kind_of(&value)
            )));
        }
        if let Some(fields) = value.as_object_mut() {
            shallow_merge(fields, patch.clone());
        }
        serde_json::from_value(value).map_err(|e| Error::InvalidPatch(e.to_string()))
    }
}

/// Turn a plain JSON record into a typed entity.
///
/// This is the default construction hook for records handed to
/// `set_plain`/`add_plain`.
pub fn hydrate<E: DeserializeOwned>(record: Value) -> Result<E> {
    serde_json::from_value(record).map_err(|e| Error::InvalidPatch(e.to_string()))
}
