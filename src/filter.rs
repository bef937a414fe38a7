//! Filter Comparator and Merger
//!
//! Subtree filters may repeat the same target several times. Two instances
//! that select the same data are merged into one; the merge moves the useful
//! part of `from` into `to` and hands what is left of `from` back to the
//! caller as a [`Remainder`].

use std::collections::HashMap;

use log::debug;

use crate::error::{TreeError, TreeResult};
use crate::schema::{Schema, SchemaId, SchemaKind};
use crate::siblings::SiblingSet;
use crate::tree::{DataTree, NodeContent, NodeId};

/// Whether two instances of the same schema node select the same data
///
/// Leaves compare by value. Containers and lists compare by their
/// content-match leaf children taken as a multiset, ignoring selection
/// children; the relation is symmetric. Stale handles never compare equal.
pub fn compare(schema: &Schema, tree: &DataTree, first: NodeId, second: NodeId) -> bool {
    let (Ok(a), Ok(b)) = (tree.get(first), tree.get(second)) else {
        return false;
    };
    if a.schema() != b.schema() {
        return false;
    }

    match schema.kind(a.schema()) {
        SchemaKind::Leaf | SchemaKind::LeafList => a.value_str() == b.value_str(),
        SchemaKind::Container | SchemaKind::List => {
            content_matches(schema, tree, first) == content_matches(schema, tree, second)
        }
        _ => true,
    }
}

/// Content-match leaf children, counted per (schema, value)
fn content_matches<'t>(
    schema: &Schema,
    tree: &'t DataTree,
    parent: NodeId,
) -> HashMap<(SchemaId, &'t str), usize> {
    let mut counts = HashMap::new();
    let mut child = tree.first_child(parent);
    while let Some(id) = child {
        if let Ok(node) = tree.get(id) {
            if schema.kind(node.schema()).is_leafy() {
                if let Some(value) = node.value_str() {
                    *counts.entry((node.schema(), value)).or_insert(0) += 1;
                }
            }
        }
        child = tree.next_sibling(id);
    }
    counts
}

/// What is left of a merged `from` node
///
/// The node is still linked where it was, minus the children that were
/// moved into the merge target. It selects nothing `to` does not already
/// select and has to be freed.
#[derive(Debug)]
#[must_use = "the absorbed node stays in the tree until the remainder is freed"]
pub struct Remainder {
    node: NodeId,
}

impl Remainder {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn free(self, tree: &mut DataTree) -> TreeResult<()> {
        tree.free(self.node)
    }
}

/// Absorb `from` into `to`, leaving `to` as the union of both selections
///
/// Both nodes must be instances of the same schema node. Only containers
/// and lists change; for other kinds `to` already covers `from`.
pub fn merge(schema: &Schema, tree: &mut DataTree, to: NodeId, from: NodeId) -> TreeResult<Remainder> {
    let to_schema = tree.get(to)?.schema();
    let from_schema = tree.get(from)?.schema();
    if to_schema != from_schema || to == from {
        return Err(TreeError::SchemaMismatch {
            to: schema.name(to_schema).to_string(),
            from: schema.name(from_schema).to_string(),
        });
    }

    if schema.kind(to_schema).is_inner() {
        merge_inner(schema, tree, to, from)?;
    }
    Ok(Remainder { node: from })
}

fn merge_inner(schema: &Schema, tree: &mut DataTree, to: NodeId, from: NodeId) -> TreeResult<()> {
    if !tree.has_children(from) {
        debug!("merge: \"{}\" becomes a selection node", schema.name(tree.get(to)?.schema()));
        return tree.free_children(to);
    }
    if !tree.has_children(to) {
        // to already selects everything below it
        return Ok(());
    }

    let mut to_set = limiting_set(schema, tree, to)?;
    let from_set = limiting_set(schema, tree, from)?;

    if to_set.is_empty() {
        return Ok(());
    }
    if from_set.is_empty() {
        for id in to_set.iter() {
            tree.free(id)?;
        }
        return Ok(());
    }

    for element in from_set.iter() {
        if !tree.contains(element) {
            continue;
        }
        if !absorb(schema, tree, &mut to_set, element)? {
            tree.append_child(to, element)?;
            to_set.add(element);
        }
    }
    Ok(())
}

/// Try to absorb one limiting element of `from` into the limiting set of
/// `to`; returns false when the element has to be moved over
fn absorb(schema: &Schema, tree: &mut DataTree, to_set: &mut SiblingSet, element: NodeId) -> TreeResult<bool> {
    let element_schema = tree.get(element)?.schema();
    let mut superseded_sibling = false;

    for candidate in to_set.to_vec() {
        if tree.get(candidate)?.schema() != element_schema {
            continue;
        }
        if !schema.kind(element_schema).is_inner() {
            // a same-schema selection node is already there
            tree.free(element)?;
            return Ok(true);
        }

        if compare(schema, tree, candidate, element) {
            merge(schema, tree, candidate, element)?.free(tree)?;
            return Ok(true);
        } else if !tree.has_children(element) {
            // element selects a superset of candidate
            to_set.remove(candidate);
            tree.free(candidate)?;
            superseded_sibling = true;
        } else if !tree.has_children(candidate) {
            tree.free(element)?;
            return Ok(true);
        }
    }

    if superseded_sibling {
        debug!("merge: selection \"{}\" replaces narrower instances", schema.name(element_schema));
    }
    Ok(false)
}

/// Selection and containment children of `parent`
///
/// Content-match leaves are left out: they only take part in comparison.
fn limiting_set(schema: &Schema, tree: &DataTree, parent: NodeId) -> TreeResult<SiblingSet> {
    let mut set = SiblingSet::new();
    for id in tree.children(parent) {
        let node = tree.get(id)?;
        let limiting = match (schema.kind(node.schema()), node.content()) {
            (SchemaKind::Container | SchemaKind::List, _) => true,
            (SchemaKind::Leaf | SchemaKind::LeafList, NodeContent::Leaf(value)) => {
                value.value_str.is_none()
            }
            (SchemaKind::AnyXml, NodeContent::AnyXml(payload)) => payload.is_none(),
            _ => false,
        };
        if limiting {
            set.add(id);
        }
    }
    Ok(set)
}
