//! Local-only collapse/expand view state.
//!
//! # Invariants
//! - Never persisted and never derived from store data.
//! - Keyed by stable `TaskId`, so membership survives full list
//!   replacement on every feed emission.

use crate::model::task::TaskId;
use std::collections::HashSet;

/// Set of task ids whose subtasks are currently hidden.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapseSet {
    collapsed: HashSet<TaskId>,
}

impl CollapseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips membership of `id` and returns whether it is now collapsed.
    pub fn toggle(&mut self, id: TaskId) -> bool {
        if self.collapsed.remove(&id) {
            false
        } else {
            self.collapsed.insert(id);
            true
        }
    }

    pub fn is_collapsed(&self, id: TaskId) -> bool {
        self.collapsed.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.collapsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collapsed.is_empty()
    }

    /// Resets to the session-start state.
    pub fn clear(&mut self) {
        self.collapsed.clear();
    }
}
