use indexmap::IndexSet;

use crate::tree::NodeId;

/// Ordered, mutable set of nodes
///
/// Used while merging filters to hold the selection and containment
/// children of one side. Removal keeps the remaining order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiblingSet {
    items: IndexSet<NodeId>,
}

impl SiblingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when `id` was already present
    pub fn add(&mut self, id: NodeId) -> bool {
        self.items.insert(id)
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        self.items.shift_remove(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.items.contains(&id)
    }

    pub fn get(&self, index: usize) -> Option<NodeId> {
        self.items.get_index(index).copied()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.items.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<NodeId> {
        self.iter().collect()
    }
}

impl FromIterator<NodeId> for SiblingSet {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
