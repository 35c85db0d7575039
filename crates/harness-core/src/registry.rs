use crate::error::{HarnessError, Result};
use crate::types::Action;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// ActionRegistry
// ---------------------------------------------------------------------------

/// The set of actions the game currently accepts, keyed by name.
///
/// Only the dispatcher mutates the registry. It never notifies anyone on its
/// own; callers report successful mutations to the presentation.
#[derive(Debug, Default, Clone)]
pub struct ActionRegistry {
    actions: BTreeMap<String, Action>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    /// Register `action`. An existing entry with the same name is kept and
    /// the new one is rejected.
    pub fn add(&mut self, action: Action) -> Result<()> {
        if self.has(&action.name) {
            return Err(HarnessError::Duplicate(action.name));
        }
        self.actions.insert(action.name.clone(), action);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Action> {
        self.actions
            .remove(name)
            .ok_or_else(|| HarnessError::NotFound(name.to_string()))
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    /// Snapshot of every registered action, sorted by name.
    pub fn all(&self) -> Vec<Action> {
        self.actions.values().cloned().collect()
    }

    /// Names from `names` that are not registered, in the order given.
    pub fn missing<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names
            .into_iter()
            .filter(|n| !self.has(n))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
