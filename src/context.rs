//! Context Validator
//!
//! Checks a node against where it appears: enabled features, the kind of
//! data being validated and, for RPC arguments, the order of its siblings.
//! References and conditions found on the way are only registered for the
//! deferred resolver.

use log::trace;

use crate::error::{Result, ValidationError};
use crate::options::ValidationOptions;
use crate::schema::{BaseType, Schema};
use crate::tree::{DataTree, NodeId};
use crate::unres::{RequestKind, UnresolvedQueue};

/// Run the context checks on `node`, stopping at the first violation
pub fn check_context(
    schema: &Schema,
    options: ValidationOptions,
    tree: &mut DataTree,
    node: NodeId,
    queue: &mut UnresolvedQueue,
) -> Result<()> {
    let sid = tree.get(node)?.schema();
    let sn = schema.node(sid);
    trace!("context check of \"{}\"", sn.name);

    if !schema.is_enabled(sid) {
        return Err(ValidationError::FeatureDisabled {
            element: sn.name.clone(),
            parent: schema.parent_name(sid).to_string(),
        });
    }

    let data = tree.get_mut(node)?;
    if sn.kind.is_leafy() && !options.defers_references() {
        if let Some(value) = data.leaf_mut() {
            value.unresolved = false;
            match value.value_type {
                BaseType::Leafref => queue.push(node, RequestKind::Leafref),
                BaseType::InstanceIdentifier => queue.push(node, RequestKind::InstanceIdentifier),
                _ => {}
            }
        }
    }

    let data_type = options.data_type();
    if data.when_status && (data_type.is_empty() || data_type == ValidationOptions::CONFIG) {
        queue.push(node, RequestKind::When);
    }

    if options.intersects(ValidationOptions::EDIT | ValidationOptions::GET_CONFIG | ValidationOptions::CONFIG)
        && !sn.config
    {
        return Err(ValidationError::StateData {
            element: sn.name.clone(),
            parent: schema.parent_name(sid).to_string(),
        });
    }

    if data.validity && schema.in_operation(sid) {
        check_argument_order(schema, tree, node)?;
    }

    Ok(())
}

/// RPC arguments must follow the schema declaration order
fn check_argument_order(schema: &Schema, tree: &DataTree, node: NodeId) -> Result<()> {
    let Some(prev) = tree.prev_sibling(node) else {
        return Ok(());
    };
    let sid = tree.get(node)?.schema();
    let prev_sid = tree.get(prev)?.schema();

    if schema.next_data_siblings(sid).contains(&prev_sid) {
        return Err(ValidationError::OutOfOrder {
            element: schema.name(sid).to_string(),
            preceding: schema.name(prev_sid).to_string(),
        });
    }
    Ok(())
}
