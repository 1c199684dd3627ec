//! The path-addressed shared state container.
//!
//! `State` is the sole communication medium between steps and workflows.
//! Reads never fail -- a missing path yields the caller's default. Mutation
//! goes through `set`/`delete`/`merge` and uniformly fails with
//! `StateError::Frozen` once the container has been frozen.
//!
//! Async step execution shares the container through `SharedState`
//! (`Arc<Mutex<State>>`). The engine is single-threaded and cooperative;
//! the mutex guards individual operations, not sequences of them -- `get` is
//! not atomic with a following `set` across an await point.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Map, Value};

use lockstep_types::error::StateError;

use crate::path;

/// Shared handle to a state container, threaded through every step
/// execution as the one explicit context argument.
pub type SharedState = Arc<Mutex<State>>;

/// Lock a shared state handle, recovering from poisoning.
///
/// Never hold the returned guard across an await point.
pub fn lock(state: &SharedState) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// A mutable key-value store addressed by path expressions.
///
/// `clone()` is a deep, structurally independent copy -- nothing is shared
/// across the clone boundary, including the frozen flag's current value.
#[derive(Debug, Clone)]
pub struct State {
    store: Value,
    frozen: bool,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    /// Create an empty state container.
    pub fn new() -> Self {
        Self {
            store: Value::Object(Map::new()),
            frozen: false,
        }
    }

    /// Create a state container from a seed snapshot. The seed must be a
    /// JSON object.
    pub fn from_value(seed: Value) -> Result<Self, StateError> {
        if !seed.is_object() {
            return Err(StateError::NotAnObject);
        }
        Ok(Self {
            store: seed,
            frozen: false,
        })
    }

    /// Wrap this container in a shared handle.
    pub fn into_shared(self) -> SharedState {
        Arc::new(Mutex::new(self))
    }

    /// Read the value at `path`, cloned out of the store.
    ///
    /// Never fails: a missing or unparsable path is `None`. The empty path
    /// reads the whole container.
    pub fn get(&self, path: &str) -> Option<Value> {
        let keys = match path::parse(path) {
            Ok(keys) => keys,
            Err(err) => {
                tracing::debug!(path, error = %err, "unreadable path in get");
                return None;
            }
        };
        path::get_in(&self.store, &keys).cloned()
    }

    /// Read the value at `path`, or `default` when absent.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).unwrap_or(default)
    }

    /// Write `value` at `path`, creating intermediate containers as needed.
    pub fn set(&mut self, path: &str, value: Value) -> Result<(), StateError> {
        if self.frozen {
            return Err(StateError::Frozen);
        }
        let keys = path::parse(path)?;
        path::set_in(&mut self.store, &keys, value)?;
        Ok(())
    }

    /// Remove the value at `path`. Succeeds silently when the target is
    /// absent; fails on an empty or malformed path.
    pub fn delete(&mut self, path: &str) -> Result<(), StateError> {
        if self.frozen {
            return Err(StateError::Frozen);
        }
        let keys = path::parse(path)?;
        path::delete_in(&mut self.store, &keys)?;
        Ok(())
    }

    /// Shallow merge: every top-level key of `partial` overwrites the
    /// corresponding key here. Not a deep merge.
    pub fn merge(&mut self, partial: Value) -> Result<(), StateError> {
        if self.frozen {
            return Err(StateError::Frozen);
        }
        let Value::Object(entries) = partial else {
            return Err(StateError::NotAnObject);
        };
        if let Value::Object(store) = &mut self.store {
            for (key, value) in entries {
                store.insert(key, value);
            }
        }
        Ok(())
    }

    /// Freeze the container. One-way: every subsequent `set`/`delete`/`merge`
    /// fails with `StateError::Frozen`.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Live reference to the backing store.
    pub fn all(&self) -> &Value {
        &self.store
    }

    /// Deep copy of the backing store.
    pub fn snapshot(&self) -> Value {
        self.store.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
