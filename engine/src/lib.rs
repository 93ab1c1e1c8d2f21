//! # Corral Engine
//!
//! An in-memory, reactive entity store.
//!
//! This crate holds a normalized collection of domain objects plus a little
//! root-level and "active selection" state, and notifies subscribers
//! synchronously whenever that state changes through one of its operations.
//!
//! ## Design Principles
//!
//! - **No IO**: The engine knows nothing about persistence, network or UI
//! - **Immutable snapshots**: Every accepted change produces a new state
//!   reference; unchanged parts are shared, never mutated in place
//! - **Synchronous**: Operations complete (or fail) inline, and subscribers
//!   are notified before the call returns
//! - **Single-threaded**: One writer, many readers, one logical thread
//!
//! ## Core Concepts
//!
//! ### Root Store
//!
//! A [`Store`] holds a caller-defined state value behind an `Arc`.
//! [`Store::set_state`] swaps in a new state and broadcasts it; returning the
//! same `Arc` is rejected with [`Error::Immutability`]. [`Store::select`]
//! projects a slice that only re-emits when it changes.
//!
//! ### Entity Store
//!
//! An [`EntityStore`] specializes the root store for an [`EntityState`]:
//! - `entities` - persistent map from [`EntityId`] to entity ([`EntityMap`])
//! - `ids` - the same ids, in display order ([`IdList`])
//! - `active` - the focused entity or entities ([`Active`])
//! - `root` - extra root fields such as `loading`/`error` ([`Status`])
//!
//! Operations:
//! - [`EntityStore::set`] - replace the collection
//! - [`EntityStore::add`] / [`EntityStore::create_or_replace`] - insert
//! - [`EntityStore::update`] - merge a [`Change`] into a [`Target`]
//! - [`EntityStore::remove`] - drop a [`Target`]
//! - [`EntityStore::set_active`] / [`EntityStore::update_active`]
//! - [`EntityStore::update_root`] - merge into the root fields
//!
//! ## Quick Start
//!
//! ```rust
//! use corral_engine::{Active, EntityStore, Target};
//! use serde::{Deserialize, Serialize};
//! use serde_json::json;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Todo {
//!     id: i64,
//!     title: String,
//! }
//!
//! let mut store: EntityStore<Todo> = EntityStore::new("todos");
//!
//! store.add(Todo { id: 1, title: "write".into() }).unwrap();
//! store.add(Todo { id: 2, title: "test".into() }).unwrap();
//!
//! store.update(1, json!({ "title": "write docs" })).unwrap();
//! store.set_active(2).unwrap();
//! store.remove(Target::filter(|t: &Todo| t.id == 2)).unwrap();
//!
//! assert_eq!(store.entity(1).unwrap().title, "write docs");
//! assert_eq!(store.active(), Active::None);
//! ```

pub mod broadcast;
pub mod config;
pub mod entity;
pub mod entity_state;
pub mod entity_store;
pub mod error;
pub mod id;
pub mod operation;
pub mod store;

// Re-export main types at crate root
pub use broadcast::{Subject, Subscription};
pub use config::{StoreConfig, StoreName, DEFAULT_ID_KEY};
pub use entity::{hydrate, Entity};
pub use entity_state::{Active, EntityMap, EntityState, IdList, Status};
pub use entity_store::{EntityFactory, EntityStore};
pub use error::Error;
pub use id::EntityId;
pub use operation::{Change, Patch, Target};
pub use store::{Selection, Store};

/// Type aliases for clarity
pub type StoreRevision = u64;
