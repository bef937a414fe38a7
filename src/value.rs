//! Value Validator
//!
//! Leafref and instance-identifier values either get resolved right away
//! through the [`DeferredResolver`] or stay unresolved for data types that
//! never carry complete references (filters, edits, retrieval replies).

use log::trace;

use crate::error::{ResolveError, Result, ValidationError};
use crate::options::ValidationOptions;
use crate::schema::{BaseType, Schema};
use crate::tree::{DataTree, NodeId};
use crate::unres::RequestKind;

/// Engine that resolves references and evaluates conditions
///
/// This crate only produces work for it. The single synchronous entry point
/// is used when a value has to be checked immediately.
#[cfg_attr(test, mockall::automock)]
pub trait DeferredResolver {
    fn resolve_now(&mut self, tree: &mut DataTree, node: NodeId, kind: RequestKind) -> std::result::Result<(), ResolveError>;
}

/// Check the value of a leaf or leaf-list instance
pub fn check_value<R>(
    schema: &Schema,
    options: ValidationOptions,
    tree: &mut DataTree,
    node: NodeId,
    resolver: &mut R,
) -> Result<()>
where
    R: DeferredResolver + ?Sized,
{
    let data = tree.get(node)?;
    let sn = schema.node(data.schema());
    let (Some(leaf_type), Some(value)) = (sn.leaf_type, data.leaf()) else {
        return Ok(());
    };
    if options.defers_references() {
        return Ok(());
    }

    let request = match leaf_type.base {
        BaseType::Leafref if value.target.is_none() => RequestKind::Leafref,
        BaseType::InstanceIdentifier if leaf_type.require_instance => {
            RequestKind::InstanceIdentifier
        }
        _ => return Ok(()),
    };

    trace!("resolving {} of \"{}\" now", request, sn.name);
    resolver
        .resolve_now(tree, node, request)
        .map_err(|source| ValidationError::DeferredResolutionFailed {
            element: sn.name.clone(),
            request,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{LeafType, SchemaKind, SchemaNode};

    fn setup(leaf_type: LeafType) -> (Schema, DataTree, NodeId) {
        let mut schema = Schema::new();
        let leaf = schema
            .add(None, SchemaNode::new(SchemaKind::Leaf, "ref").with_type(leaf_type))
            .unwrap();
        let mut tree = DataTree::new();
        let node = tree.add_leaf(&schema, None, leaf, "eth0").unwrap();
        (schema, tree, node)
    }

    #[test]
    fn test_unresolved_leafref_is_resolved_now() {
        let (schema, mut tree, node) = setup(LeafType::new(BaseType::Leafref));
        let mut resolver = MockDeferredResolver::new();
        resolver
            .expect_resolve_now()
            .withf(move |_, n, k| *n == node && *k == RequestKind::Leafref)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let result = check_value(&schema, ValidationOptions::CONFIG, &mut tree, node, &mut resolver);
        assert!(result.is_ok());
    }

    #[test]
    fn test_resolution_failure_is_reported() {
        let (schema, mut tree, node) = setup(LeafType::new(BaseType::Leafref));
        let mut resolver = MockDeferredResolver::new();
        resolver.expect_resolve_now().returning(|_, _, _| {
            Err(ResolveError::TargetNotFound {
                path: "/interfaces/interface".to_string(),
            })
        });

        let err = check_value(&schema, ValidationOptions::empty(), &mut tree, node, &mut resolver)
            .unwrap_err();
        match err {
            ValidationError::DeferredResolutionFailed { element, request, .. } => {
                assert_eq!(element, "ref");
                assert_eq!(request, RequestKind::Leafref);
            }
            _ => panic!("Expected DeferredResolutionFailed"),
        }
    }

    #[test]
    fn test_partial_data_skips_resolution() {
        let (schema, mut tree, node) = setup(LeafType::new(BaseType::Leafref));
        let mut resolver = MockDeferredResolver::new();
        resolver.expect_resolve_now().times(0);

        for options in [
            ValidationOptions::FILTER,
            ValidationOptions::EDIT,
            ValidationOptions::GET,
            ValidationOptions::GET_CONFIG,
        ] {
            assert!(check_value(&schema, options, &mut tree, node, &mut resolver).is_ok());
        }
    }

    #[test]
    fn test_instance_identifier_without_requirement() {
        let (schema, mut tree, node) =
            setup(LeafType::new(BaseType::InstanceIdentifier).require_instance(false));
        let mut resolver = MockDeferredResolver::new();
        resolver.expect_resolve_now().times(0);

        assert!(check_value(&schema, ValidationOptions::CONFIG, &mut tree, node, &mut resolver).is_ok());
    }

    #[test]
    fn test_instance_identifier_required() {
        let (schema, mut tree, node) = setup(LeafType::new(BaseType::InstanceIdentifier));
        let mut resolver = MockDeferredResolver::new();
        resolver
            .expect_resolve_now()
            .withf(|_, _, k| *k == RequestKind::InstanceIdentifier)
            .times(1)
            .returning(|_, _, _| Ok(()));

        assert!(check_value(&schema, ValidationOptions::CONFIG, &mut tree, node, &mut resolver).is_ok());
    }
}
