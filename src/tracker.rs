//! UnitTracker: idempotency set for text units
//!
//! Keys are (node handle, revision) pairs, so a unit whose content changed is
//! a different key and gets re-evaluated. Membership is weak: `prune` drops
//! entries whose node left the document or moved on to a newer revision.

use std::collections::HashSet;

use crate::tree::{NodeId, TreeSource};

/// Stable identity of one text unit at one version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitKey {
    pub node: NodeId,
    pub revision: u64,
}

impl UnitKey {
    pub fn of<T: TreeSource + ?Sized>(tree: &T, node: NodeId) -> Self {
        Self {
            node,
            revision: tree.revision(node),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct UnitTracker {
    visited: HashSet<UnitKey>,
}

impl UnitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &UnitKey) -> bool {
        self.visited.contains(key)
    }

    /// Record a unit; returns false if it was already present
    pub fn mark(&mut self, key: UnitKey) -> bool {
        self.visited.insert(key)
    }

    /// Forget every unit under `root` (inclusive)
    pub fn forget_subtree<T: TreeSource + ?Sized>(&mut self, tree: &T, root: NodeId) {
        self.visited
            .retain(|key| !tree.is_ancestor_or_self(root, key.node));
    }

    /// Drop entries for detached nodes and stale revisions
    pub fn prune<T: TreeSource + ?Sized>(&mut self, tree: &T) -> usize {
        let before = self.visited.len();
        self.visited
            .retain(|key| tree.contains(key.node) && tree.revision(key.node) == key.revision);
        before - self.visited.len()
    }

    pub fn clear(&mut self) {
        self.visited.clear();
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}
