//! Content Validator
//!
//! Checks a node against its own content and its siblings: keys, mandatory
//! children, choice exclusivity, instance counts and definition status.
//!
//! Filter trees are normalised on the way. Redundant instances are merged
//! or dropped instead of being reported, so a call may free the node under
//! validation ([`Verdict::Discarded`]) or one of its siblings.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};
use crate::filter;
use crate::keys::check_keys;
use crate::options::ValidationOptions;
use crate::schema::{Schema, SchemaId, SchemaKind, Status};
use crate::tree::{DataTree, NodeId};
use crate::unres::{RequestKind, UnresolvedQueue};

/// Outcome of a node check that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// The node stays in the tree
    Valid,
    /// The node was redundant and has been freed
    Discarded,
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, Verdict::Discarded)
    }
}

/// Run the content checks on `node`, stopping at the first violation
///
/// Siblings are expected in document order, with every sibling before
/// `node` already checked.
pub fn check_content(
    schema: &Schema,
    options: ValidationOptions,
    tree: &mut DataTree,
    node: NodeId,
    queue: &mut UnresolvedQueue,
) -> Result<Verdict> {
    let (sid, validity) = {
        let data = tree.get(node)?;
        (data.schema(), data.validity)
    };
    let sn = schema.node(sid);
    trace!("content check of \"{}\"", sn.name);

    if validity {
        if sn.kind == SchemaKind::List
            && !options.intersects(ValidationOptions::FILTER | ValidationOptions::GET | ValidationOptions::GET_CONFIG)
        {
            check_keys(schema, tree, node)?;
        }

        if sn.kind.is_inner() && !options.intersects(ValidationOptions::FILTER | ValidationOptions::RETRIEVAL_OR_EDIT) {
            check_mandatory(schema, tree, node)?;
        }

        if !options.is_filter() {
            check_choice(schema, tree, node)?;
        }

        // may change the tree in filter mode, so it runs last but one
        if check_instances(schema, options, tree, node)?.is_discarded() {
            return Ok(Verdict::Discarded);
        }

        if options.contains(ValidationOptions::OBSOLETE) {
            check_status(schema, tree, node)?;
        }
    }

    if !sn.musts.is_empty() {
        queue.push(node, RequestKind::Must);
    }
    Ok(Verdict::Valid)
}

fn discard(schema: &Schema, tree: &mut DataTree, node: NodeId, reason: &str) -> Result<Verdict> {
    debug!(
        "filter: dropping {} ({})",
        tree.path(schema, node),
        reason
    );
    tree.free(node)?;
    Ok(Verdict::Discarded)
}

fn check_mandatory(schema: &Schema, tree: &DataTree, node: NodeId) -> Result<()> {
    let sid = tree.get(node)?.schema();
    let Some(missing) = first_unmet(schema, tree, Some(node), sid) else {
        return Ok(());
    };

    let element = schema.name(missing).to_string();
    let parent = schema.parent_name(missing).to_string();
    match schema.kind(missing) {
        SchemaKind::List | SchemaKind::LeafList => Err(ValidationError::TooFew { element, parent }),
        _ => Err(ValidationError::MissingElement { element, parent }),
    }
}

/// First schema child of `scope` whose instance requirement is not met
/// under the data node `parent`; `None` for `parent` stands for an absent
/// non-presence container
fn first_unmet(schema: &Schema, tree: &DataTree, parent: Option<NodeId>, scope: SchemaId) -> Option<SchemaId> {
    for &child in schema.node(scope).children() {
        if !schema.is_enabled(child) {
            continue;
        }
        let sn = schema.node(child);
        let unmet = match sn.kind {
            SchemaKind::Leaf | SchemaKind::AnyXml => {
                sn.mandatory && count_instances(tree, parent, child) == 0
            }
            SchemaKind::List | SchemaKind::LeafList => {
                count_instances(tree, parent, child) < sn.min_elements as usize
            }
            SchemaKind::Container if !sn.presence && count_instances(tree, parent, child) == 0 => {
                if let Some(found) = first_unmet(schema, tree, None, child) {
                    return Some(found);
                }
                false
            }
            SchemaKind::Choice => match instantiated_case(schema, tree, parent, child) {
                None => sn.mandatory,
                Some(case) if schema.kind(case) == SchemaKind::Case => {
                    if let Some(found) = first_unmet(schema, tree, parent, case) {
                        return Some(found);
                    }
                    false
                }
                // shorthand case, the instance is there
                Some(_) => false,
            },
            _ => false,
        };
        if unmet {
            return Some(child);
        }
    }
    None
}

fn count_instances(tree: &DataTree, parent: Option<NodeId>, sid: SchemaId) -> usize {
    let Some(parent) = parent else {
        return 0;
    };
    tree.children(parent)
        .into_iter()
        .filter(|c| tree.get(*c).is_ok_and(|n| n.schema() == sid))
        .count()
}

/// The child of `choice` (a case, or a shorthand data node) some child of
/// `parent` is an instance of
fn instantiated_case(schema: &Schema, tree: &DataTree, parent: Option<NodeId>, choice: SchemaId) -> Option<SchemaId> {
    let parent = parent?;
    tree.children(parent).into_iter().find_map(|c| {
        let sid = tree.get(c).ok()?.schema();
        std::iter::once(sid)
            .chain(schema.ancestors(sid))
            .find(|s| schema.parent(*s) == Some(choice))
    })
}

/// Only one case of a choice may be instantiated among siblings
fn check_choice(schema: &Schema, tree: &DataTree, node: NodeId) -> Result<()> {
    let sid = tree.get(node)?.schema();
    let siblings = tree.siblings(node);
    let mut level = sid;

    while let Some(parent) = schema.parent(level) {
        let (choice, case) = match schema.kind(parent) {
            SchemaKind::Choice => (parent, None),
            SchemaKind::Case => match schema.parent(parent) {
                Some(choice) => (choice, Some(parent)),
                None => break,
            },
            _ => break,
        };
        level = choice;

        for &other in &siblings {
            let other_sid = tree.get(other)?.schema();
            if other == node || other_sid == sid {
                continue;
            }
            if conflicts(schema, other_sid, choice, case) {
                return Err(ValidationError::ConflictingCase {
                    element: schema.name(sid).to_string(),
                    choice: schema.name(choice).to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Whether `other` belongs to `choice` through a branch other than `case`
fn conflicts(schema: &Schema, other: SchemaId, choice: SchemaId, case: Option<SchemaId>) -> bool {
    for ancestor in schema.ancestors(other) {
        match schema.kind(ancestor) {
            SchemaKind::Choice if ancestor == choice => return true,
            SchemaKind::Choice => continue,
            SchemaKind::Case if schema.parent(ancestor) != Some(choice) => continue,
            SchemaKind::Case => return case != Some(ancestor),
            _ => return false,
        }
    }
    false
}

/// Sibling instances of the same schema node
fn check_instances(
    schema: &Schema,
    options: ValidationOptions,
    tree: &mut DataTree,
    node: NodeId,
) -> Result<Verdict> {
    let sid = tree.get(node)?.schema();
    match schema.kind(sid) {
        SchemaKind::Container | SchemaKind::Leaf | SchemaKind::AnyXml => {
            check_single_instance(schema, options, tree, node, sid)
        }
        SchemaKind::List | SchemaKind::LeafList if !options.is_retrieval() => {
            check_distinct_instances(schema, options, tree, node, sid)
        }
        _ => Ok(Verdict::Valid),
    }
}

fn check_single_instance(
    schema: &Schema,
    options: ValidationOptions,
    tree: &mut DataTree,
    node: NodeId,
    sid: SchemaId,
) -> Result<Verdict> {
    // filters keep the first instance in document order, so only
    // siblings that already went through this check count there
    let filter = options.is_filter();
    let existing = tree.siblings(node).into_iter().find(|s| {
        *s != node
            && tree
                .get(*s)
                .is_ok_and(|n| n.schema() == sid && !(filter && n.validity))
    });
    let Some(existing) = existing else {
        return Ok(Verdict::Valid);
    };

    if !filter {
        return Err(ValidationError::TooMany {
            element: schema.name(sid).to_string(),
            parent: schema.parent_name(sid).to_string(),
        });
    }

    match schema.kind(sid) {
        SchemaKind::Container => {
            if filter::compare(schema, tree, existing, node) {
                filter::merge(schema, tree, existing, node)?.free(tree)?;
                debug!("filter: merged \"{}\" into an equal sibling", schema.name(sid));
                return Ok(Verdict::Discarded);
            }
            if !tree.has_children(existing) {
                return discard(schema, tree, node, "covered by a selection sibling");
            }
            if !tree.has_children(node) {
                debug!("filter: selection \"{}\" replaces its sibling", schema.name(sid));
                tree.free(existing)?;
            }
            Ok(Verdict::Valid)
        }
        SchemaKind::Leaf => {
            let existing_is_selection = tree.get(existing)?.is_selection();
            let node_is_selection = tree.get(node)?.is_selection();
            if existing_is_selection && !node_is_selection {
                debug!("filter: content match \"{}\" replaces a selection", schema.name(sid));
                tree.free(existing)?;
                return Ok(Verdict::Valid);
            }
            // equal values collapse; a differing value keeps the first one
            discard(schema, tree, node, "leaf already present")
        }
        _ => discard(schema, tree, node, "anyxml already present"),
    }
}

fn check_distinct_instances(
    schema: &Schema,
    options: ValidationOptions,
    tree: &mut DataTree,
    node: NodeId,
    sid: SchemaId,
) -> Result<Verdict> {
    let siblings = tree.siblings(node);
    let Some(start) = siblings
        .iter()
        .position(|s| *s != node && tree.get(*s).is_ok_and(|n| n.schema() == sid))
    else {
        return Ok(Verdict::Valid);
    };

    for &other in &siblings[start..] {
        let Ok(data) = tree.get(other) else {
            continue;
        };
        // pending siblings compare against this node when their turn comes
        if other == node || data.schema() != sid || data.validity {
            continue;
        }

        if options.is_filter() {
            if filter::compare(schema, tree, other, node) {
                filter::merge(schema, tree, other, node)?.free(tree)?;
                debug!("filter: merged \"{}\" into an equal sibling", schema.name(sid));
                return Ok(Verdict::Discarded);
            }
            if schema.kind(sid) == SchemaKind::LeafList {
                if tree.get(other)?.is_selection() {
                    debug!("filter: content match \"{}\" replaces a selection", schema.name(sid));
                    tree.free(other)?;
                    break;
                }
                if tree.get(node)?.is_selection() {
                    return discard(schema, tree, node, "narrower instance present");
                }
            }
        } else {
            check_not_duplicate(schema, tree, other, node, sid)?;
        }
    }
    Ok(Verdict::Valid)
}

fn check_not_duplicate(schema: &Schema, tree: &DataTree, other: NodeId, node: NodeId, sid: SchemaId) -> Result<()> {
    let sn = schema.node(sid);
    let duplicate = match sn.kind {
        SchemaKind::LeafList => tree.get(other)?.value_str() == tree.get(node)?.value_str(),
        // keyless lists have no identity to collide on
        _ => !sn.keys().is_empty() && same_values(tree, other, node, sn.keys()),
    };
    if duplicate {
        return Err(ValidationError::DuplicateInstance {
            element: sn.name.clone(),
            parent: schema.parent_name(sid).to_string(),
        });
    }

    for leaves in sn.unique() {
        if same_values(tree, other, node, leaves) {
            return Err(ValidationError::NotUnique {
                element: sn.name.clone(),
                parent: schema.parent_name(sid).to_string(),
                leaves: leaves
                    .iter()
                    .map(|l| schema.name(*l))
                    .collect::<Vec<_>>()
                    .join(", "),
            });
        }
    }
    Ok(())
}

/// Both instances carry every leaf of `leaves` with equal values
fn same_values(tree: &DataTree, a: NodeId, b: NodeId, leaves: &[SchemaId]) -> bool {
    leaves.iter().all(|&leaf| {
        match (child_value(tree, a, leaf), child_value(tree, b, leaf)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    })
}

fn child_value(tree: &DataTree, parent: NodeId, leaf: SchemaId) -> Option<&str> {
    let mut child = tree.first_child(parent);
    while let Some(id) = child {
        let node = tree.get(id).ok()?;
        if node.schema() == leaf {
            return node.value_str();
        }
        child = tree.next_sibling(id);
    }
    None
}

/// Obsolete definitions, their derived types and identities
fn check_status(schema: &Schema, tree: &DataTree, node: NodeId) -> Result<()> {
    let data = tree.get(node)?;
    let sid = data.schema();
    let sn = schema.node(sid);

    // the node and the schema-only nodes (choice, case) around it
    let obsolete = std::iter::once(sid)
        .chain(
            schema
                .ancestors(sid)
                .take_while(|s| !schema.kind(*s).is_instantiable()),
        )
        .any(|s| schema.node(s).status == Status::Obsolete);
    if obsolete {
        return Err(ValidationError::ObsoleteData {
            element: sn.name.clone(),
            parent: schema.parent_name(sid).to_string(),
        });
    }

    if !sn.kind.is_leafy() {
        return Ok(());
    }
    let mut derived = sn.leaf_type.and_then(|t| t.derived);
    while let Some(typedef) = derived.and_then(|id| schema.typedef(id)) {
        if typedef.status == Status::Obsolete {
            return Err(ValidationError::ObsoleteType {
                element: sn.name.clone(),
                parent: schema.parent_name(sid).to_string(),
                type_name: typedef.name.clone(),
            });
        }
        derived = typedef.base;
    }

    if let Some(identity) = data
        .leaf()
        .and_then(|v| v.identity)
        .and_then(|id| schema.identity(id))
    {
        if identity.status == Status::Obsolete {
            return Err(ValidationError::ObsoleteType {
                element: sn.name.clone(),
                parent: schema.parent_name(sid).to_string(),
                type_name: format!("{}:{}", identity.module, identity.name),
            });
        }
    }
    Ok(())
}
