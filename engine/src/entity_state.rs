//! The normalized state held by an entity store.
//!
//! Entities live in a map for lookup and their ids in a list for order. The
//! two always hold the same set of ids. `active` names the focused
//! entity (or entities) and only ever refers to stored ids once an
//! operation has pruned it.
//!
//! Both collections are `im` persistent structures, so the next state is
//! built from a cheap clone of the previous one and shares every untouched
//! node with it.

use crate::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Entities by id.
pub type EntityMap<E> = im::HashMap<EntityId, Arc<E>>;

/// Ids in display order.
pub type IdList = im::Vector<EntityId>;

/// The currently focused entity or entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Active {
    /// Nothing is active.
    #[default]
    None,
    /// A single active entity.
    One(EntityId),
    /// Several active entities, in the order they were given.
    Many(Vec<EntityId>),
}

impl Active {
    /// Whether no id is active (`None`, or `Many` with an empty list).
    pub fn is_empty(&self) -> bool {
        match self {
            Active::None => true,
            Active::One(_) => false,
            Active::Many(ids) => ids.is_empty(),
        }
    }

    /// The active ids.
    pub fn ids(&self) -> Vec<EntityId> {
        match self {
            Active::None => Vec::new(),
            Active::One(id) => vec![id.clone()],
            Active::Many(ids) => ids.clone(),
        }
    }

    /// Whether `id` is active.
    pub fn contains(&self, id: &EntityId) -> bool {
        match self {
            Active::None => false,
            Active::One(active) => active == id,
            Active::Many(ids) => ids.contains(id),
        }
    }

    /// Keep only the active ids accepted by `keep`.
    ///
    /// A single active id that is dropped leaves nothing active; a list is
    /// filtered in place.
    pub fn retain(&self, keep: impl Fn(&EntityId) -> bool) -> Active {
        match self {
            Active::None => Active::None,
            Active::One(id) if keep(id) => Active::One(id.clone()),
            Active::One(_) => Active::None,
            Active::Many(ids) => Active::Many(ids.iter().filter(|&id| keep(id)).cloned().collect()),
        }
    }

    /// Follow an entity whose id changed from `from` to `to`.
    pub fn rename(&self, from: &EntityId, to: &EntityId) -> Active {
        let swap = |id: &EntityId| if id == from { to.clone() } else { id.clone() };
        match self {
            Active::None => Active::None,
            Active::One(id) => Active::One(swap(id)),
            Active::Many(ids) => Active::Many(ids.iter().map(swap).collect()),
        }
    }
}

macro_rules! active_from_ids {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Active {
                fn from(id: $ty) -> Self {
                    Active::One(id.into())
                }
            }
        )*
    };
}

active_from_ids!(i32, i64, u32, &str, String, EntityId);

impl<T: Into<EntityId>> From<Option<T>> for Active {
    fn from(id: Option<T>) -> Self {
        id.map_or(Active::None, |id| Active::One(id.into()))
    }
}

impl<T: Into<EntityId>> From<Vec<T>> for Active {
    fn from(ids: Vec<T>) -> Self {
        Active::Many(ids.into_iter().map(Into::into).collect())
    }
}

/// Root fields an entity store carries by default next to its collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Whether the collection is still being loaded
    pub loading: bool,
    /// Last error reported for this store
    pub error: Option<Value>,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            loading: true,
            error: None,
        }
    }
}

/// State of an entity store.
///
/// Cloning is cheap: every part is shared.
#[derive(Debug, Serialize)]
pub struct EntityState<E, R = Status> {
    /// Entities by id
    pub entities: Arc<EntityMap<E>>,
    /// Ids in display order
    pub ids: Arc<IdList>,
    /// Focused entity or entities
    pub active: Active,
    /// Extra root fields
    #[serde(flatten)]
    pub root: Arc<R>,
}

impl<E, R> Clone for EntityState<E, R> {
    fn clone(&self) -> Self {
        Self {
            entities: Arc::clone(&self.entities),
            ids: Arc::clone(&self.ids),
            active: self.active.clone(),
            root: Arc::clone(&self.root),
        }
    }
}

impl<E, R: Default> Default for EntityState<E, R> {
    fn default() -> Self {
        Self::new(R::default())
    }
}

impl<E, R> EntityState<E, R> {
    /// Empty collection with the given root fields.
    pub fn new(root: R) -> Self {
        Self {
            entities: Arc::new(EntityMap::new()),
            ids: Arc::new(IdList::new()),
            active: Active::None,
            root: Arc::new(root),
        }
    }

    /// Look up an entity.
    pub fn entity(&self, id: &EntityId) -> Option<&Arc<E>> {
        self.entities.get(id)
    }

    /// Whether an entity with `id` is stored.
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Entities in `ids` order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<E>> + '_ {
        self.ids.iter().filter_map(|id| self.entities.get(id))
    }

    /// The same root fields with a different collection.
    pub(crate) fn with_collection(
        &self,
        entities: Arc<EntityMap<E>>,
        ids: Arc<IdList>,
        active: Active,
    ) -> Self {
        Self {
            entities,
            ids,
            active,
            root: Arc::clone(&self.root),
        }
    }

    /// Check that `ids` and `entities` agree and that `active` only names
    /// stored entities.
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut seen = HashSet::with_capacity(self.ids.len());
        for id in self.ids.iter() {
            if !seen.insert(id) {
                return Err(format!("id {} appears twice in ids", id));
            }
            if !self.entities.contains_key(id) {
                return Err(format!("id {} is listed but not stored", id));
            }
        }
        if seen.len() != self.entities.len() {
            return Err(format!(
                "{} entities stored but {} ids listed",
                self.entities.len(),
                seen.len()
            ));
        }
        for id in self.active.ids() {
            if !self.entities.contains_key(&id) {
                return Err(format!("active id {} is not stored", id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state_with(ids: &[i64]) -> EntityState<Value> {
        let entities = ids
            .iter()
            .map(|id| (EntityId::from(*id), Arc::new(json!({"id": id}))))
            .collect();
        EntityState {
            entities: Arc::new(entities),
            ids: Arc::new(ids.iter().map(|id| EntityId::from(*id)).collect()),
            active: Active::None,
            root: Arc::new(Status::default()),
        }
    }

    #[test]
    fn active_conversions() {
        assert_eq!(Active::from(1), Active::One(EntityId::from(1)));
        assert_eq!(Active::from(Some("a")), Active::One(EntityId::from("a")));
        assert_eq!(Active::from(None::<i64>), Active::None);
        assert_eq!(
            Active::from(vec![1, 2]),
            Active::Many(vec![EntityId::from(1), EntityId::from(2)])
        );
    }

    #[test]
    fn retain_clears_single_and_filters_many() {
        let one = Active::from(1);
        assert_eq!(one.retain(|id| *id != EntityId::from(1)), Active::None);
        assert_eq!(one.retain(|_| true), one);

        let many = Active::from(vec![1, 2, 3]);
        assert_eq!(
            many.retain(|id| *id != EntityId::from(2)),
            Active::from(vec![1, 3])
        );
        assert!(many.retain(|_| false).is_empty());
    }

    #[test]
    fn rename_follows_entity() {
        let many = Active::from(vec![1, 2]);
        assert_eq!(
            many.rename(&EntityId::from(2), &EntityId::from(5)),
            Active::from(vec![1, 5])
        );
        assert_eq!(
            Active::from(1).rename(&EntityId::from(2), &EntityId::from(5)),
            Active::from(1)
        );
    }

    #[test]
    fn iter_follows_id_order() {
        let mut state = state_with(&[3, 1, 2]);
        state.ids = Arc::new(im::vector![EntityId::from(2), EntityId::from(3), EntityId::from(1)]);
        let order: Vec<_> = state.iter().map(|e| e["id"].clone()).collect();
        assert_eq!(order, vec![json!(2), json!(3), json!(1)]);
    }

    #[test]
    fn invariants_detect_drift() {
        let mut state = state_with(&[1, 2]);
        assert!(state.check_invariants().is_ok());

        state.active = Active::from(9);
        assert!(state.check_invariants().is_err());

        state.active = Active::None;
        state.ids = Arc::new(im::vector![EntityId::from(1)]);
        assert!(state.check_invariants().is_err());

        state.ids = Arc::new(im::vector![EntityId::from(1), EntityId::from(1)]);
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn serializes_flat() {
        let mut state = state_with(&[1]);
        state.active = Active::from(1);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            json!({
                "entities": {"1": {"id": 1}},
                "ids": [1],
                "active": 1,
                "loading": true,
                "error": null
            })
        );
    }

    #[test]
    fn clone_shares_everything() {
        let state = state_with(&[1]);
        let copy = state.clone();
        assert!(Arc::ptr_eq(&state.entities, &copy.entities));
        assert!(Arc::ptr_eq(&state.ids, &copy.ids));
        assert!(Arc::ptr_eq(&state.root, &copy.root));
    }
}
