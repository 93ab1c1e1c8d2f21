//! Store - the root state container.
//!
//! A `Store` owns one value of a caller-defined state type behind an `Arc`.
//! Every accepted change swaps in a *new* `Arc` and broadcasts it to
//! subscribers synchronously. Handing back the `Arc` the updater was given is
//! treated as a bug (usually a forgotten copy) and rejected.

use crate::{
    broadcast::{Subject, Subscription},
    config::StoreConfig,
    error::Result,
    operation::{merge_deep_into, Change},
    Error, StoreRevision,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// The root store holding a single state value.
pub struct Store<S> {
    /// Name resolved at construction
    name: String,
    /// Current state and its subscribers
    state: Subject<Arc<S>>,
    /// Number of accepted state changes
    revision: StoreRevision,
}

impl<S: fmt::Debug> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.name)
            .field("revision", &self.revision)
            .field("state", &self.state)
            .finish()
    }
}

impl<S: 'static> Store<S> {
    /// Create a store holding `initial`.
    pub fn new(initial: S, config: impl Into<StoreConfig>) -> Self {
        let config = config.into();
        let name = config.resolve_name();
        tracing::debug!(store = %name, "store created");
        Self {
            name,
            state: Subject::new(Arc::new(initial)),
            revision: 0,
        }
    }

    /// The store's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current state snapshot.
    pub fn value(&self) -> Arc<S> {
        self.state.value()
    }

    /// How many state changes have been accepted since construction.
    pub fn revision(&self) -> StoreRevision {
        self.revision
    }

    /// Replace the state with whatever `updater` returns.
    ///
    /// Fails with [`Error::Immutability`] if `updater` returns the very `Arc`
    /// it was handed; nothing is broadcast in that case.
    pub fn set_state(&mut self, updater: impl FnOnce(&Arc<S>) -> Arc<S>) -> Result<()> {
        let prev = self.state.value();
        let next = updater(&prev);

        if Arc::ptr_eq(&prev, &next) {
            tracing::debug!(store = %self.name, "rejected state update returning the same reference");
            return Err(Error::Immutability {
                store: self.name.clone(),
            });
        }
        drop(prev);

        self.revision += 1;
        tracing::debug!(store = %self.name, revision = self.revision, "state updated");
        self.state.next(next);
        Ok(())
    }

    /// Replace the state with a value computed from the current one.
    pub fn update(&mut self, f: impl FnOnce(&S) -> S) -> Result<()> {
        self.set_state(|prev| Arc::new(f(prev.as_ref())))
    }

    /// Observe every state the store holds, starting with the current one.
    pub fn subscribe(&self, observer: impl FnMut(&Arc<S>) + 'static) -> Subscription {
        self.state.subscribe(observer)
    }

    /// Project a slice of the state.
    ///
    /// Subscribers see the current slice immediately, then each new slice
    /// that differs (by `PartialEq`) from the last one they saw.
    pub fn select<T, P>(&self, projector: P) -> Selection<S, T>
    where
        T: PartialEq + 'static,
        P: Fn(&S) -> T + 'static,
    {
        Selection {
            state: self.state.clone(),
            projector: Rc::new(projector),
            same: |a, b| a == b,
        }
    }

    /// Project a shared slice of the state, comparing by pointer.
    pub fn select_ref<T, P>(&self, projector: P) -> Selection<S, Arc<T>>
    where
        T: 'static,
        P: Fn(&S) -> Arc<T> + 'static,
    {
        Selection {
            state: self.state.clone(),
            projector: Rc::new(projector),
            same: |a, b| Arc::ptr_eq(a, b),
        }
    }
}

impl<S> Store<S>
where
    S: Serialize + DeserializeOwned + 'static,
{
    /// Deep-merge a partial (or a partial computed from the current state)
    /// into the state.
    pub fn update_patch<'a>(&mut self, change: impl Into<Change<'a, S>>) -> Result<()> {
        let change = change.into();
        let current = self.value();
        let patch = change.resolve(current.as_ref())?;
        let next = merge_deep_into(&*current, patch)?;
        self.set_state(|_| Arc::new(next))
    }

    /// Set the `loading` field of the state.
    pub fn set_loading(&mut self, loading: bool) -> Result<()> {
        self.update_patch(json!({ "loading": loading }))
    }

    /// Set the `error` field of the state.
    pub fn set_error(&mut self, error: impl Serialize) -> Result<()> {
        let error = serde_json::to_value(error).map_err(|e| Error::InvalidPatch(e.to_string()))?;
        self.update_patch(json!({ "error": error }))
    }
}

/// A lazily evaluated projection of a store's state.
pub struct Selection<S, T> {
    state: Subject<Arc<S>>,
    projector: Rc<dyn Fn(&S) -> T>,
    same: fn(&T, &T) -> bool,
}

impl<S: 'static, T: 'static> Selection<S, T> {
    /// The projection of the current state.
    pub fn value(&self) -> T {
        let state = self.state.value();
        (self.projector)(state.as_ref())
    }

    /// Observe the projected slice.
    pub fn subscribe(&self, mut observer: impl FnMut(&T) + 'static) -> Subscription {
        let projector = Rc::clone(&self.projector);
        let same = self.same;
        let mut last: Option<T> = None;

        self.state.subscribe(move |state: &Arc<S>| {
            let slice = projector(state.as_ref());
            if let Some(prev) = &last {
                if same(prev, &slice) {
                    return;
                }
            }
            observer(&slice);
            last = Some(slice);
        })
    }
}

impl<S, T> fmt::Debug for Selection<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection").finish_non_exhaustive()
    }
}
