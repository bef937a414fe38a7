//! Deferred Resolution Worklist
//!
//! Validation only appends to the queue. Entries keep generation-checked
//! node handles, so entries whose node was discarded later in the same pass
//! are recognised as dead instead of pointing at a reused slot.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::tree::{DataTree, NodeId};

/// What the deferred resolver has to do for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestKind {
    Leafref,
    InstanceIdentifier,
    When,
    Must,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RequestKind::Leafref => "leafref",
            RequestKind::InstanceIdentifier => "instance-identifier",
            RequestKind::When => "when condition",
            RequestKind::Must => "must condition",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnresolvedEntry {
    pub node: NodeId,
    pub kind: RequestKind,
}

#[derive(Debug, Clone, Default)]
pub struct UnresolvedQueue {
    entries: Vec<UnresolvedEntry>,
}

impl UnresolvedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: NodeId, kind: RequestKind) {
        debug!("queued {} for node {}", kind, node);
        self.entries.push(UnresolvedEntry { node, kind });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnresolvedEntry> {
        self.entries.iter()
    }

    /// Entries whose node still exists in `tree`
    pub fn live<'a>(&'a self, tree: &'a DataTree) -> impl Iterator<Item = &'a UnresolvedEntry> {
        self.entries.iter().filter(|e| tree.contains(e.node))
    }

    pub fn count(&self, kind: RequestKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    /// Drop entries whose node no longer exists; returns how many were dropped
    pub fn prune(&mut self, tree: &DataTree) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| tree.contains(e.node));
        before - self.entries.len()
    }

    /// Hand the live entries to the resolver pass, emptying the queue
    pub fn drain_live(&mut self, tree: &DataTree) -> Vec<UnresolvedEntry> {
        self.entries
            .drain(..)
            .filter(|e| tree.contains(e.node))
            .collect()
    }
}
