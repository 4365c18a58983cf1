//! The state object shared by every node of a run.
//!
//! An [`OrchestratorContext`] is created by the caller, lent to
//! [`Orchestrator::run`](crate::Orchestrator::run) and handed to every node
//! operation as a shared reference. Sibling nodes run concurrently and see
//! the same context, so the engine adds no locking of its own: fields that
//! more than one node writes need interior mutability chosen by the caller
//! (atomics, `std::sync::Mutex`, `tokio::sync::RwLock`, ...). The
//! [`Blackboard`] is a ready-made concurrent store for the common case of
//! passing small JSON values between nodes.

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::Result;

/// Context handed to every node operation of a run.
#[derive(Debug, Default)]
pub struct OrchestratorContext<S = (), D = ()> {
    /// Caller-defined run state.
    pub state: S,
    /// Caller-defined dependencies (clients, handles, settings).
    pub deps: D,
    blackboard: Blackboard,
}

impl<S, D> OrchestratorContext<S, D> {
    pub fn new(state: S, deps: D) -> Self {
        Self {
            state,
            deps,
            blackboard: Blackboard::new(),
        }
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn into_parts(self) -> (S, D, Blackboard) {
        (self.state, self.deps, self.blackboard)
    }
}

impl<S> OrchestratorContext<S, ()> {
    pub fn with_state(state: S) -> Self {
        Self::new(state, ())
    }
}

/// Concurrent key-value store of JSON values.
#[derive(Debug, Default)]
pub struct Blackboard {
    data: DashMap<String, Value>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `value` and store it under `key`, replacing any previous value.
    pub fn insert<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)?;
        self.data.insert(key.into(), json_value);
        Ok(())
    }

    /// Read `key` back as `T`. Missing keys and values of another shape both
    /// yield `None`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get_value(key)?;
        serde_json::from_value(value).ok()
    }

    pub fn get_value(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|entry| entry.value().clone())
    }

    /// Push `value` onto the array stored under `key`. A missing key starts a
    /// new array; a non-array value becomes the first element.
    pub fn append<T: Serialize>(&self, key: impl Into<String>, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)?;
        self.data
            .entry(key.into())
            .and_modify(|existing| {
                if let Some(items) = existing.as_array_mut() {
                    items.push(json_value.clone());
                } else {
                    *existing = Value::Array(vec![existing.take(), json_value.clone()]);
                }
            })
            .or_insert_with(|| Value::Array(vec![json_value.clone()]));
        Ok(())
    }

    /// Modify the value under `key` in place while holding its shard lock.
    /// A missing key is presented as `Value::Null`.
    pub fn update<F>(&self, key: impl Into<String>, f: F)
    where
        F: FnOnce(&mut Value),
    {
        let mut entry = self.data.entry(key.into()).or_insert(Value::Null);
        f(entry.value_mut());
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}
