//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use corral_engine::{Entity, EntityState, EntityStore, StoreConfig};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test harness (`RUST_LOG=corral_engine=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

impl Todo {
    /// A todo whose title defaults to its id.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            title: id.to_string(),
            completed: false,
        }
    }

    pub fn titled(id: i64, title: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            completed: false,
        }
    }
}

/// A todo keyed by `todoId` instead of `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyedTodo {
    pub todo_id: i64,
    pub title: String,
}

/// Root fields carrying free-form metadata next to the usual status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TodosRoot {
    pub loading: bool,
    pub error: Option<serde_json::Value>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub tags: Vec<String>,
}

pub fn todos() -> EntityStore<Todo> {
    init_tracing();
    EntityStore::new("todos")
}

pub fn keyed_todos() -> EntityStore<KeyedTodo> {
    init_tracing();
    EntityStore::new(StoreConfig::new("todos").id_key("todoId"))
}

pub fn todos_with_metadata() -> EntityStore<Todo, TodosRoot> {
    init_tracing();
    EntityStore::new("todos")
}

/// Count every state a store broadcasts, including the one delivered on
/// subscription.
pub fn broadcasts<E: Entity, R: 'static>(store: &EntityStore<E, R>) -> Rc<Cell<usize>> {
    let count = Rc::new(Cell::new(0));
    let sink = Rc::clone(&count);
    let _sub = store.subscribe(move |_| sink.set(sink.get() + 1));
    count
}

/// Record every state a store broadcasts.
pub fn history<E, R>(store: &EntityStore<E, R>) -> Rc<RefCell<Vec<Arc<EntityState<E, R>>>>>
where
    E: Entity,
    R: 'static,
{
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _sub = store.subscribe(move |state| sink.borrow_mut().push(Arc::clone(state)));
    seen
}
