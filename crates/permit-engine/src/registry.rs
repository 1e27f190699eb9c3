//! The action registry.

use parking_lot::RwLock;
use permit_types::Action;
use std::collections::HashMap;
use tracing::debug;

/// In-memory map of registered actions.
///
/// Actions are loaded wholesale by whatever parses the policy files and
/// replaced en masse on reload; the registry never mutates individual
/// entries. Lookups clone the action, so a reload mid-decision cannot leave
/// a caller holding a half-replaced view.
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Action>>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the entire action set.
    pub fn replace_all(&self, actions: impl IntoIterator<Item = Action>) {
        let map: HashMap<String, Action> = actions
            .into_iter()
            .map(|action| (action.id.clone(), action))
            .collect();
        debug!(count = map.len(), "replaced action registry");
        *self.actions.write() = map;
    }

    /// Looks up an action by id.
    #[must_use]
    pub fn lookup(&self, action_id: &str) -> Option<Action> {
        self.actions.read().get(action_id).cloned()
    }

    /// All registered action ids, sorted.
    #[must_use]
    pub fn action_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.actions.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.read().len()
    }

    /// Returns `true` when no actions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.read().is_empty()
    }
}
