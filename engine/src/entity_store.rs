//! EntityStore - a store specialized for a normalized entity collection.
//!
//! Every operation computes the next `entities`/`ids`/`active` triple from the
//! current snapshot and hands it to the root store in a single `set_state`
//! call. Operations that end up changing nothing (a predicate matching no
//! entity, an empty batch) skip `set_state` entirely, so subscribers are not
//! woken up for them. A failing operation returns its error before any state
//! is swapped.
//!
//! Stores are single-threaded. Mutators take `&mut self`, so an observer
//! cannot call back into the store that is notifying it unless the caller
//! shares the store through interior mutability; doing so is the caller's
//! responsibility.

use crate::{
    broadcast::Subscription,
    config::StoreConfig,
    entity::{hydrate, Entity},
    entity_state::{Active, EntityMap, EntityState, IdList, Status},
    error::Result,
    operation::{merge_deep_into, Change, Target},
    store::{Selection, Store},
    EntityId, Error, StoreRevision,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Construction hook turning a plain JSON record into an entity.
pub type EntityFactory<E> = Box<dyn Fn(Value) -> Result<E>>;

/// A store holding a normalized collection of entities.
pub struct EntityStore<E, R = Status> {
    store: Store<EntityState<E, R>>,
    id_key: String,
    factory: Option<EntityFactory<E>>,
}

impl<E: fmt::Debug, R: fmt::Debug> fmt::Debug for EntityStore<E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStore")
            .field("store", &self.store)
            .field("id_key", &self.id_key)
            .field("factory", &self.factory.as_ref().map(|_| ".."))
            .finish()
    }
}

impl<E: Entity, R: Default + 'static> EntityStore<E, R> {
    /// Create an empty store with default root fields.
    pub fn new(config: impl Into<StoreConfig>) -> Self {
        Self::with_root(config, R::default())
    }
}

impl<E: Entity, R: 'static> EntityStore<E, R> {
    /// Create an empty store with the given root fields.
    pub fn with_root(config: impl Into<StoreConfig>, root: R) -> Self {
        let config = config.into();
        let id_key = config.id_key.clone();
        Self {
            store: Store::new(EntityState::new(root), config),
            id_key,
            factory: None,
        }
    }

    /// Use `factory` to build entities from plain records in
    /// [`set_plain`](Self::set_plain) and [`add_plain`](Self::add_plain).
    pub fn with_factory(mut self, factory: impl Fn(Value) -> Result<E> + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// The store's name.
    pub fn name(&self) -> &str {
        self.store.name()
    }

    /// Field holding each entity's id.
    pub fn id_key(&self) -> &str {
        &self.id_key
    }

    /// The underlying root store.
    pub fn store(&self) -> &Store<EntityState<E, R>> {
        &self.store
    }

    /// The current state snapshot.
    pub fn value(&self) -> Arc<EntityState<E, R>> {
        self.store.value()
    }

    /// How many state changes have been accepted since construction.
    pub fn revision(&self) -> StoreRevision {
        self.store.revision()
    }

    /// Entities by id.
    pub fn entities(&self) -> Arc<EntityMap<E>> {
        Arc::clone(&self.value().entities)
    }

    /// Ids in display order.
    pub fn ids(&self) -> Arc<IdList> {
        Arc::clone(&self.value().ids)
    }

    /// The active entity or entities.
    pub fn active(&self) -> Active {
        self.value().active.clone()
    }

    /// Look up one entity.
    pub fn entity(&self, id: impl Into<EntityId>) -> Option<Arc<E>> {
        self.value().entity(&id.into()).cloned()
    }

    /// Whether an entity with `id` is stored.
    pub fn has(&self, id: impl Into<EntityId>) -> bool {
        self.value().contains(&id.into())
    }

    /// Number of stored entities.
    pub fn len(&self) -> usize {
        self.value().len()
    }

    /// Whether the store holds no entities.
    pub fn is_empty(&self) -> bool {
        self.value().is_empty()
    }

    /// All entities in `ids` order.
    pub fn all(&self) -> Vec<Arc<E>> {
        self.value().iter().cloned().collect()
    }

    /// Observe every state, starting with the current one.
    pub fn subscribe(
        &self,
        observer: impl FnMut(&Arc<EntityState<E, R>>) + 'static,
    ) -> Subscription {
        self.store.subscribe(observer)
    }

    /// Project a slice of the state, distinct by `PartialEq`.
    pub fn select<T, P>(&self, projector: P) -> Selection<EntityState<E, R>, T>
    where
        T: PartialEq + 'static,
        P: Fn(&EntityState<E, R>) -> T + 'static,
    {
        self.store.select(projector)
    }

    /// Project a shared slice of the state, distinct by pointer.
    pub fn select_ref<T, P>(&self, projector: P) -> Selection<EntityState<E, R>, Arc<T>>
    where
        T: 'static,
        P: Fn(&EntityState<E, R>) -> Arc<T> + 'static,
    {
        self.store.select_ref(projector)
    }

    // ------------------------------------------------------------------
    // Collection writes
    // ------------------------------------------------------------------

    /// Replace the whole collection.
    ///
    /// Input order becomes `ids` order; a repeated id keeps its first
    /// position and its last value. Active ids that are no longer stored are
    /// dropped. To replace from a keyed mapping use [`set_map`](Self::set_map).
    pub fn set(&mut self, entities: impl IntoIterator<Item = E>) -> Result<()> {
        let mut map = EntityMap::new();
        let mut ids = IdList::new();
        for entity in entities {
            let id = entity.id(&self.id_key)?;
            if map.insert(id.clone(), Arc::new(entity)).is_none() {
                ids.push_back(id);
            }
        }

        tracing::debug!(store = %self.name(), count = ids.len(), "set entities");
        self.store.set_state(|prev| {
            let active = prev.active.retain(|id| map.contains_key(id));
            Arc::new(prev.with_collection(Arc::new(map), Arc::new(ids), active))
        })
    }

    /// Replace the whole collection from `(id, entity)` pairs.
    ///
    /// Pairs are taken in iteration order, so pass an ordered mapping such as
    /// a `BTreeMap` or a `Vec` when `ids` order matters. Each key must equal
    /// the id the entity carries ([`Error::IdMismatch`]).
    pub fn set_map<K: Into<EntityId>>(
        &mut self,
        entities: impl IntoIterator<Item = (K, E)>,
    ) -> Result<()> {
        let entities = entities
            .into_iter()
            .map(|(key, entity)| {
                self.check_id(key.into(), &entity)?;
                Ok(entity)
            })
            .collect::<Result<Vec<_>>>()?;
        self.set(entities)
    }

    /// Replace the whole collection, building each entity with `factory`.
    pub fn set_with<T>(
        &mut self,
        records: impl IntoIterator<Item = T>,
        factory: impl FnMut(T) -> E,
    ) -> Result<()> {
        self.set(records.into_iter().map(factory))
    }

    /// Insert `entity` under `id`, or replace what is stored there.
    ///
    /// A replaced entity keeps its position. The entity must carry `id`
    /// in its id field ([`Error::IdMismatch`]).
    pub fn create_or_replace(&mut self, id: impl Into<EntityId>, entity: E) -> Result<()> {
        let id = id.into();
        self.check_id(id.clone(), &entity)?;
        tracing::debug!(store = %self.name(), id = %id, "create or replace entity");
        self.store.set_state(|prev| {
            let mut entities = (*prev.entities).clone();
            let ids = if entities.insert(id.clone(), Arc::new(entity)).is_some() {
                Arc::clone(&prev.ids)
            } else {
                let mut ids = (*prev.ids).clone();
                ids.push_back(id);
                Arc::new(ids)
            };
            Arc::new(prev.with_collection(Arc::new(entities), ids, prev.active.clone()))
        })
    }

    /// Add one entity.
    pub fn add(&mut self, entity: E) -> Result<()> {
        self.add_many(std::iter::once(entity))
    }

    /// Add entities at the end of the collection.
    ///
    /// An id that is already stored is overwritten in place; new ids are
    /// appended in input order.
    pub fn add_many(&mut self, entities: impl IntoIterator<Item = E>) -> Result<()> {
        let incoming = entities
            .into_iter()
            .map(|entity| Ok((entity.id(&self.id_key)?, entity)))
            .collect::<Result<Vec<_>>>()?;

        if incoming.is_empty() {
            tracing::trace!(store = %self.name(), "nothing to add");
            return Ok(());
        }

        tracing::debug!(store = %self.name(), added = incoming.len(), "add entities");
        self.store.set_state(|prev| {
            let mut entities = (*prev.entities).clone();
            let mut appended = Vec::new();
            for (id, entity) in incoming {
                if entities.insert(id.clone(), Arc::new(entity)).is_none() {
                    appended.push(id);
                }
            }
            let ids = if appended.is_empty() {
                Arc::clone(&prev.ids)
            } else {
                let mut ids = (*prev.ids).clone();
                ids.extend(appended);
                Arc::new(ids)
            };
            Arc::new(prev.with_collection(Arc::new(entities), ids, prev.active.clone()))
        })
    }

    /// Add entities built from `records` with `factory`.
    pub fn add_with<T>(
        &mut self,
        records: impl IntoIterator<Item = T>,
        factory: impl FnMut(T) -> E,
    ) -> Result<()> {
        self.add_many(records.into_iter().map(factory))
    }

    /// Merge a change into every targeted entity.
    ///
    /// Explicit ids must exist ([`Error::EntityNotExists`]). A change may
    /// rename an entity only when it is the sole target
    /// ([`Error::UpdateIdKey`]); the renamed entity keeps its position and
    /// active status. When no id changes, `ids` keeps its reference.
    pub fn update<'a>(
        &mut self,
        target: impl Into<Target<'a, E>>,
        change: impl Into<Change<'a, E>>,
    ) -> Result<()> {
        let target = target.into();
        let change = change.into();
        let state = self.value();

        let targets = match resolve_target(&*state, &target, true) {
            Ok(targets) => targets,
            Err(e) => {
                tracing::debug!(store = %self.name(), error = %e, "update rejected");
                return Err(e);
            }
        };
        if targets.is_empty() {
            tracing::trace!(store = %self.name(), ?target, "update matched nothing");
            return Ok(());
        }

        let mut updated = Vec::with_capacity(targets.len());
        for id in targets {
            let current: &E = state
                .entity(&id)
                .ok_or_else(|| Error::EntityNotExists(id.clone()))?;
            let patch = change.resolve(current)?;
            let next = current.merge(&patch)?;
            let next_id = next.id(&self.id_key)?;
            updated.push((id, next_id, next));
        }

        let renamed: Vec<&EntityId> = updated
            .iter()
            .filter(|(id, next_id, _)| id != next_id)
            .map(|(_, next_id, _)| next_id)
            .collect();
        if !renamed.is_empty() && updated.len() > 1 {
            tracing::debug!(store = %self.name(), targets = updated.len(), "update rejected: id change on many entities");
            return Err(Error::UpdateIdKey);
        }
        if let Some(next_id) = renamed.first() {
            if state.contains(next_id) {
                return Err(Error::IdConflict((*next_id).clone()));
            }
        }

        tracing::debug!(store = %self.name(), updated = updated.len(), renamed = renamed.len(), "update entities");
        self.store.set_state(|prev| {
            let mut entities = (*prev.entities).clone();
            let mut ids = Arc::clone(&prev.ids);
            let mut active = prev.active.clone();

            for (id, next_id, next) in updated {
                if id != next_id {
                    entities.remove(&id);
                    let mut renamed = (*ids).clone();
                    if let Some(at) = renamed.index_of(&id) {
                        let _ = renamed.set(at, next_id.clone());
                    }
                    ids = Arc::new(renamed);
                    active = active.rename(&id, &next_id);
                }
                entities.insert(next_id, Arc::new(next));
            }

            Arc::new(prev.with_collection(Arc::new(entities), ids, active))
        })
    }

    /// Remove the targeted entities.
    ///
    /// Ids that are not stored are ignored. Removed ids are pruned from
    /// `active`.
    pub fn remove<'a>(&mut self, target: impl Into<Target<'a, E>>) -> Result<()> {
        let target = target.into();
        let state = self.value();

        let doomed: HashSet<EntityId> = resolve_target(&*state, &target, false)?
            .into_iter()
            .collect();
        let active = match target {
            Target::All => Active::None,
            _ => state.active.retain(|id| !doomed.contains(id)),
        };

        if doomed.is_empty() && active == state.active {
            tracing::trace!(store = %self.name(), ?target, "remove matched nothing");
            return Ok(());
        }

        tracing::debug!(store = %self.name(), removed = doomed.len(), "remove entities");
        self.store.set_state(|prev| {
            let mut entities = (*prev.entities).clone();
            for id in &doomed {
                entities.remove(id);
            }
            let ids: IdList = prev
                .ids
                .iter()
                .filter(|id| !doomed.contains(*id))
                .cloned()
                .collect();
            Arc::new(prev.with_collection(Arc::new(entities), Arc::new(ids), active))
        })
    }

    /// Remove every entity and clear `active`.
    pub fn remove_all(&mut self) -> Result<()> {
        self.remove(Target::All)
    }

    // ------------------------------------------------------------------
    // Active
    // ------------------------------------------------------------------

    /// Mark the given id(s) active.
    ///
    /// Existence is not checked here; later `remove`/`set` calls prune ids
    /// that are not stored.
    pub fn set_active(&mut self, active: impl Into<Active>) -> Result<()> {
        let active = active.into();
        tracing::debug!(store = %self.name(), ?active, "set active");
        self.store.set_state(|prev| {
            Arc::new(prev.with_collection(
                Arc::clone(&prev.entities),
                Arc::clone(&prev.ids),
                active,
            ))
        })
    }

    fn check_id(&self, expected: EntityId, entity: &E) -> Result<()> {
        let found = entity.id(&self.id_key)?;
        if found != expected {
            tracing::debug!(store = %self.name(), %expected, %found, "entity id does not match its key");
            return Err(Error::IdMismatch { expected, found });
        }
        Ok(())
    }

    /// Merge a change into the active entity or entities.
    pub fn update_active<'a>(&mut self, change: impl Into<Change<'a, E>>) -> Result<()> {
        match self.active() {
            Active::One(id) => self.update(id, change),
            Active::Many(ids) if !ids.is_empty() => self.update(ids, change),
            _ => {
                tracing::debug!(store = %self.name(), "update rejected: nothing active");
                Err(Error::NoActive)
            }
        }
    }
}

impl<E, R> EntityStore<E, R>
where
    E: Entity + DeserializeOwned,
    R: 'static,
{
    /// Replace the whole collection from plain JSON records.
    pub fn set_plain(&mut self, records: impl IntoIterator<Item = Value>) -> Result<()> {
        let entities = self.build_all(records)?;
        self.set(entities)
    }

    /// Add entities from plain JSON records.
    pub fn add_plain(&mut self, records: impl IntoIterator<Item = Value>) -> Result<()> {
        let entities = self.build_all(records)?;
        self.add_many(entities)
    }

    fn build_all(&self, records: impl IntoIterator<Item = Value>) -> Result<Vec<E>> {
        records
            .into_iter()
            .map(|record| match &self.factory {
                Some(factory) => factory(record),
                None => hydrate(record),
            })
            .collect()
    }
}

impl<E, R> EntityStore<E, R>
where
    E: Entity,
    R: Serialize + DeserializeOwned + 'static,
{
    /// Deep-merge a change into the root fields. The collection and
    /// `active` are untouched.
    pub fn update_root<'a>(&mut self, change: impl Into<Change<'a, R>>) -> Result<()> {
        let change = change.into();
        let state = self.value();
        let patch = change.resolve(&*state.root)?;
        let root = merge_deep_into(&*state.root, patch)?;

        tracing::debug!(store = %self.name(), "update root");
        self.store.set_state(|prev| {
            Arc::new(EntityState {
                entities: Arc::clone(&prev.entities),
                ids: Arc::clone(&prev.ids),
                active: prev.active.clone(),
                root: Arc::new(root),
            })
        })
    }

    /// Set the root `loading` field.
    pub fn set_loading(&mut self, loading: bool) -> Result<()> {
        self.update_root(json!({ "loading": loading }))
    }

    /// Set the root `error` field.
    pub fn set_error(&mut self, error: impl Serialize) -> Result<()> {
        let error = serde_json::to_value(error).map_err(|e| Error::InvalidPatch(e.to_string()))?;
        self.update_root(json!({ "error": error }))
    }
}

/// Ids selected by `target`, in collection order for `All`/`Where` and in
/// the given order (deduplicated) for explicit ids.
///
/// With `strict`, an explicit id that is not stored is an error; otherwise
/// it is skipped.
fn resolve_target<E, R>(
    state: &EntityState<E, R>,
    target: &Target<'_, E>,
    strict: bool,
) -> Result<Vec<EntityId>> {
    let explicit = |ids: &[EntityId]| -> Result<Vec<EntityId>> {
        let mut seen = HashSet::new();
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if !state.contains(id) {
                if strict {
                    return Err(Error::EntityNotExists(id.clone()));
                }
                continue;
            }
            if seen.insert(id) {
                found.push(id.clone());
            }
        }
        Ok(found)
    };

    match target {
        Target::All => Ok(state.ids.iter().cloned().collect()),
        Target::Id(id) => explicit(std::slice::from_ref(id)),
        Target::Ids(ids) => explicit(ids),
        Target::Where(predicate) => Ok(state
            .ids
            .iter()
            .filter(|id| state.entity(id).is_some_and(|e| predicate(&**e)))
            .cloned()
            .collect()),
    }
}
