//! Validation Engine
//!
//! Runs the context and content validators over single nodes or whole
//! trees and aggregates the per-node outcomes:
//! - **Context checks** run pre-order, before a node's children
//! - **Content checks** run post-order, once the children are settled
//! - **Filters** are normalised in place; dropped nodes are reported as discarded,
//!   also when a later sibling or an ancestor's merge frees them after they passed
//!
//! Siblings are visited in document order. Duplicate and choice checks rely
//! on every earlier sibling having been checked already.

use std::time::{Duration, Instant};

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::content::{Verdict, check_content};
use crate::context::check_context;
use crate::error::{ErrorKind, Result, ValidationError};
use crate::options::ValidationOptions;
use crate::schema::Schema;
use crate::tree::{DataTree, NodeId};
use crate::unres::UnresolvedQueue;
use crate::value::{DeferredResolver, check_value};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Stop a tree pass at the first failing node
    pub fail_fast: bool,
    /// Drop queue entries of discarded nodes after a tree pass
    pub prune_stale_requests: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            prune_stale_requests: true,
        }
    }
}

/// Outcome recorded for one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum NodeStatus {
    /// Node passed validation
    Valid,
    /// Redundant filter node, removed from the tree
    Discarded,
    /// Node failed validation
    Failed { kind: ErrorKind, message: String },
}

impl NodeStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, NodeStatus::Valid)
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, NodeStatus::Discarded)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, NodeStatus::Failed { .. })
    }
}

/// Result of validating a single node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeValidationResult {
    /// Data path of the node at the time it was checked
    pub path: String,
    /// Schema name of the node
    pub element: String,
    #[serde(flatten)]
    pub status: NodeStatus,
    /// The failure itself, for diagnostics
    #[serde(skip)]
    pub error: Option<ValidationError>,
}

impl NodeValidationResult {
    pub fn valid(path: String, element: String) -> Self {
        Self {
            path,
            element,
            status: NodeStatus::Valid,
            error: None,
        }
    }

    pub fn discarded(path: String, element: String) -> Self {
        Self {
            path,
            element,
            status: NodeStatus::Discarded,
            error: None,
        }
    }

    pub fn failed(path: String, element: String, error: ValidationError) -> Self {
        Self {
            path,
            element,
            status: NodeStatus::Failed {
                kind: error.kind(),
                message: error.to_string(),
            },
            error: Some(error),
        }
    }
}

/// Aggregated results of a tree pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationResults {
    /// Number of nodes checked
    pub total_nodes: usize,
    pub valid_nodes: usize,
    pub discarded_nodes: usize,
    pub failed_nodes: usize,
    /// Wall time of the pass
    pub duration: Duration,
    /// Individual node results in visiting order
    pub node_results: Vec<NodeValidationResult>,
    /// Deferred requests left for the resolver
    pub pending_requests: usize,
    /// Requests dropped because their node was discarded
    pub pruned_requests: usize,
}

impl ValidationResults {
    /// Aggregate individual node results into a summary
    pub fn aggregate(node_results: Vec<NodeValidationResult>, duration: Duration) -> Self {
        let mut results = Self {
            total_nodes: node_results.len(),
            duration,
            ..Self::default()
        };
        for result in &node_results {
            match result.status {
                NodeStatus::Valid => results.valid_nodes += 1,
                NodeStatus::Discarded => results.discarded_nodes += 1,
                NodeStatus::Failed { .. } => results.failed_nodes += 1,
            }
        }
        results.node_results = node_results;
        results
    }

    /// Record the state of the deferred queue after the pass
    pub fn with_queue(mut self, pending: usize, pruned: usize) -> Self {
        self.pending_requests = pending;
        self.pruned_requests = pruned;
        self
    }

    /// Check if every checked node passed or was discarded
    pub fn all_valid(&self) -> bool {
        self.failed_nodes == 0 && self.total_nodes > 0
    }

    pub fn has_errors(&self) -> bool {
        self.failed_nodes > 0
    }

    /// Share of checked nodes that did not fail, as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_nodes == 0 {
            0.0
        } else {
            ((self.total_nodes - self.failed_nodes) as f64 / self.total_nodes as f64) * 100.0
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &NodeValidationResult> {
        self.node_results.iter().filter(|r| r.status.is_failed())
    }
}

/// Validator for data trees of one schema and one kind of data
///
/// The engine only borrows the schema, so one engine can serve several
/// trees, also from several threads.
#[derive(Debug, Clone)]
pub struct ValidationEngine<'s> {
    schema: &'s Schema,
    options: ValidationOptions,
    config: ValidationConfig,
}

impl<'s> ValidationEngine<'s> {
    /// Create an engine; `options` may name at most one data type
    pub fn new(schema: &'s Schema, options: ValidationOptions) -> Result<Self> {
        Ok(Self {
            schema,
            options: options.ensure_single_mode()?,
            config: ValidationConfig::default(),
        })
    }

    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    pub fn options(&self) -> ValidationOptions {
        self.options
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate one node whose children are already validated
    ///
    /// On [`Verdict::Valid`] the node's `validity` flag is cleared; on
    /// [`Verdict::Discarded`] the node no longer exists.
    pub fn validate_node(&self, tree: &mut DataTree, node: NodeId, queue: &mut UnresolvedQueue) -> Result<Verdict> {
        check_context(self.schema, self.options, tree, node, queue)?;
        let verdict = check_content(self.schema, self.options, tree, node, queue)?;
        if verdict.is_valid() {
            tree.get_mut(node)?.validity = false;
        }
        Ok(verdict)
    }

    /// Check a freshly stored leaf value, resolving references right away
    pub fn check_value<R>(&self, tree: &mut DataTree, node: NodeId, resolver: &mut R) -> Result<()>
    where
        R: DeferredResolver + ?Sized,
    {
        check_value(self.schema, self.options, tree, node, resolver)
    }

    /// Validate every node of `tree` that awaits validation
    pub fn validate_tree(&self, tree: &mut DataTree, queue: &mut UnresolvedQueue) -> ValidationResults {
        let start = Instant::now();
        debug!("validating {} nodes with {:?}", tree.len(), self.options);

        let mut pass = Pass {
            engine: self,
            queue,
            results: Vec::new(),
            checked: Vec::new(),
            stopped: false,
        };
        pass.run(tree);
        let Pass {
            queue,
            mut results,
            checked,
            ..
        } = pass;

        // a later sibling or an ancestor's merge may free nodes that passed
        for (result, node) in results.iter_mut().zip(checked) {
            if result.status.is_valid() && !tree.contains(node) {
                trace!("{} dropped after passing", result.path);
                result.status = NodeStatus::Discarded;
            }
        }

        let pruned = if self.config.prune_stale_requests {
            queue.prune(tree)
        } else {
            0
        };
        let results = ValidationResults::aggregate(results, start.elapsed()).with_queue(queue.len(), pruned);
        debug!(
            "validation finished: {} valid, {} discarded, {} failed",
            results.valid_nodes, results.discarded_nodes, results.failed_nodes
        );
        results
    }
}

/// Pending work of a tree pass
enum Step {
    Enter(NodeId),
    Leave {
        node: NodeId,
        pending: bool,
        path: String,
        element: String,
    },
}

/// State of one tree pass
struct Pass<'e, 's, 'q> {
    engine: &'e ValidationEngine<'s>,
    queue: &'q mut UnresolvedQueue,
    results: Vec<NodeValidationResult>,
    /// Node behind each entry of `results`
    checked: Vec<NodeId>,
    stopped: bool,
}

impl Pass<'_, '_, '_> {
    fn run(&mut self, tree: &mut DataTree) {
        let mut stack: Vec<Step> = tree.roots().into_iter().rev().map(Step::Enter).collect();
        while let Some(step) = stack.pop() {
            if self.stopped {
                break;
            }
            match step {
                Step::Enter(node) => self.enter(tree, node, &mut stack),
                Step::Leave {
                    node,
                    pending,
                    path,
                    element,
                } => self.leave(tree, node, pending, path, element),
            }
        }
    }

    fn enter(&mut self, tree: &mut DataTree, node: NodeId, stack: &mut Vec<Step>) {
        // a sibling's check may have freed it
        let Ok(data) = tree.get(node) else {
            return;
        };
        let schema = self.engine.schema;
        let pending = data.validity;
        let element = schema.name(data.schema()).to_string();
        let path = tree.path(schema, node);
        trace!("visiting {}", path);

        if pending {
            if let Err(error) = check_context(schema, self.engine.options, tree, node, self.queue) {
                self.fail(node, path, element, error);
                return;
            }
        }

        stack.push(Step::Leave {
            node,
            pending,
            path,
            element,
        });
        stack.extend(tree.children(node).into_iter().rev().map(Step::Enter));
    }

    fn leave(&mut self, tree: &mut DataTree, node: NodeId, pending: bool, path: String, element: String) {
        let schema = self.engine.schema;
        match check_content(schema, self.engine.options, tree, node, self.queue) {
            Ok(Verdict::Valid) if pending => {
                if let Ok(data) = tree.get_mut(node) {
                    data.validity = false;
                }
                self.record(node, NodeValidationResult::valid(path, element));
            }
            Ok(Verdict::Valid) => {}
            Ok(Verdict::Discarded) => {
                self.record(node, NodeValidationResult::discarded(path, element));
            }
            Err(error) => self.fail(node, path, element, error),
        }
    }

    fn record(&mut self, node: NodeId, result: NodeValidationResult) {
        self.results.push(result);
        self.checked.push(node);
    }

    fn fail(&mut self, node: NodeId, path: String, element: String, error: ValidationError) {
        debug!("{} failed: {}", path, error);
        self.record(node, NodeValidationResult::failed(path, element, error));
        if self.engine.config.fail_fast {
            self.stopped = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BaseType, SchemaId, SchemaKind, SchemaNode};
    use crate::unres::RequestKind;

    struct Fixture {
        schema: Schema,
        top: SchemaId,
        list: SchemaId,
        id: SchemaId,
        state: SchemaId,
        peer: SchemaId,
    }

    fn fixture() -> Fixture {
        let mut schema = Schema::new();
        let top = schema
            .add(None, SchemaNode::new(SchemaKind::Container, "routing").in_module("rt"))
            .unwrap();
        let list = schema.list(Some(top), "route").unwrap();
        let id = schema.leaf(Some(list), "id", BaseType::Uint).unwrap();
        schema.set_keys(list, &[id]).unwrap();
        let state = schema
            .add(Some(list), SchemaNode::new(SchemaKind::Container, "state").read_only())
            .unwrap();
        let peer = schema.leaf(Some(top), "peer", BaseType::Leafref).unwrap();
        Fixture {
            schema,
            top,
            list,
            id,
            state,
            peer,
        }
    }

    fn route(f: &Fixture, tree: &mut DataTree, parent: NodeId, id: &str) -> NodeId {
        let entry = tree.add_inner(&f.schema, Some(parent), f.list).unwrap();
        tree.add_leaf(&f.schema, Some(entry), f.id, id).unwrap();
        entry
    }

    #[test]
    fn test_engine_rejects_conflicting_modes() {
        let f = fixture();
        let err = ValidationEngine::new(&f.schema, ValidationOptions::GET | ValidationOptions::FILTER).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOptions);

        let engine = ValidationEngine::new(&f.schema, ValidationOptions::FILTER | ValidationOptions::OBSOLETE).unwrap();
        assert!(engine.options().is_filter());
        assert_eq!(engine.config(), &ValidationConfig::default());
    }

    #[test]
    fn test_validate_tree_clears_validity() {
        let f = fixture();
        let mut tree = DataTree::new();
        let top = tree.add_inner(&f.schema, None, f.top).unwrap();
        route(&f, &mut tree, top, "1");
        route(&f, &mut tree, top, "2");
        tree.add_leaf(&f.schema, Some(top), f.peer, "r2").unwrap();

        let engine = ValidationEngine::new(&f.schema, ValidationOptions::CONFIG).unwrap();
        let mut queue = UnresolvedQueue::new();
        let results = engine.validate_tree(&mut tree, &mut queue);

        assert_eq!(results.total_nodes, 6);
        assert!(results.all_valid());
        assert_eq!(results.success_rate(), 100.0);
        assert_eq!(results.pending_requests, 1);
        assert_eq!(queue.count(RequestKind::Leafref), 1);
        assert!(tree.roots().iter().all(|r| !tree.get(*r).unwrap().validity));

        // nothing left to check on a second pass
        let again = engine.validate_tree(&mut tree, &mut queue);
        assert_eq!(again.total_nodes, 0);
        assert!(!again.all_valid());
    }

    #[test]
    fn test_failures_are_collected() {
        let f = fixture();
        let mut tree = DataTree::new();
        let top = tree.add_inner(&f.schema, None, f.top).unwrap();
        route(&f, &mut tree, top, "1");
        route(&f, &mut tree, top, "1");
        let third = route(&f, &mut tree, top, "3");
        tree.add_inner(&f.schema, Some(third), f.state).unwrap();

        let engine = ValidationEngine::new(&f.schema, ValidationOptions::CONFIG).unwrap();
        let results = engine.validate_tree(&mut tree, &mut UnresolvedQueue::new());

        let failures: Vec<_> = results.failures().collect();
        assert_eq!(failures.len(), 2);
        assert!(matches!(
            failures[0].status,
            NodeStatus::Failed { kind: ErrorKind::DuplicateInstance, .. }
        ));
        assert_eq!(failures[1].element, "state");
        assert_eq!(failures[1].path, "/rt:routing/route/state");
        assert!(results.has_errors());
    }

    #[test]
    fn test_fail_fast_stops_the_pass() {
        let f = fixture();
        let mut tree = DataTree::new();
        let top = tree.add_inner(&f.schema, None, f.top).unwrap();
        let first = route(&f, &mut tree, top, "1");
        tree.add_inner(&f.schema, Some(first), f.state).unwrap();
        route(&f, &mut tree, top, "2");

        let engine = ValidationEngine::new(&f.schema, ValidationOptions::CONFIG)
            .unwrap()
            .with_config(ValidationConfig {
                fail_fast: true,
                prune_stale_requests: true,
            });
        let results = engine.validate_tree(&mut tree, &mut UnresolvedQueue::new());

        assert_eq!(results.failed_nodes, 1);
        // "routing" and the second route were never reached
        assert!(results.node_results.iter().all(|r| r.element != "routing"));
        assert_eq!(results.total_nodes, 2);
    }

    #[test]
    fn test_context_failure_skips_subtree() {
        let mut schema = Schema::new();
        let feature = schema.add_feature("bfd", false);
        let bfd = schema
            .add(None, SchemaNode::new(SchemaKind::Container, "bfd").if_feature(feature))
            .unwrap();
        let interval = schema.leaf(Some(bfd), "interval", BaseType::Uint).unwrap();
        let mut tree = DataTree::new();
        let node = tree.add_inner(&schema, None, bfd).unwrap();
        let child = tree.add_leaf(&schema, Some(node), interval, "50").unwrap();

        let engine = ValidationEngine::new(&schema, ValidationOptions::empty()).unwrap();
        let results = engine.validate_tree(&mut tree, &mut UnresolvedQueue::new());

        assert_eq!(results.total_nodes, 1);
        assert_eq!(results.node_results[0].element, "bfd");
        assert!(tree.get(child).unwrap().validity);
    }

    #[test]
    fn test_discarded_filter_nodes_are_pruned_from_queue() {
        let mut schema = Schema::new();
        let top = schema.container(None, "system").unwrap();
        let name = schema
            .add(Some(top), SchemaNode::new(SchemaKind::Leaf, "name").with_must("string-length(.) > 0"))
            .unwrap();
        let mut tree = DataTree::new();
        let sel = tree.add_inner(&schema, None, top).unwrap();
        let narrow = tree.add_inner(&schema, None, top).unwrap();
        tree.add_leaf(&schema, Some(narrow), name, "r1").unwrap();

        let engine = ValidationEngine::new(&schema, ValidationOptions::FILTER).unwrap();
        let mut queue = UnresolvedQueue::new();
        let results = engine.validate_tree(&mut tree, &mut queue);

        // the narrow container and its "name" both left the tree
        assert_eq!(results.discarded_nodes, 2);
        assert_eq!(results.pruned_requests, 1);
        assert_eq!(results.pending_requests, 0);
        assert_eq!(tree.roots(), vec![sel]);
    }

    #[test]
    fn test_sibling_freed_by_later_selection_is_reported() {
        let mut schema = Schema::new();
        let top = schema.container(None, "system").unwrap();
        let hostname = schema.leaf(Some(top), "hostname", BaseType::String).unwrap();
        let mut tree = DataTree::new();
        let narrow = tree.add_inner(&schema, None, top).unwrap();
        tree.add_leaf(&schema, Some(narrow), hostname, "r1").unwrap();
        let sel = tree.add_inner(&schema, None, top).unwrap();

        let engine = ValidationEngine::new(&schema, ValidationOptions::FILTER).unwrap();
        let results = engine.validate_tree(&mut tree, &mut UnresolvedQueue::new());

        assert!(!tree.contains(narrow));
        assert_eq!(tree.roots(), vec![sel]);
        assert_eq!(tree.len(), 1);
        assert_eq!(results.total_nodes, 3);
        assert_eq!(results.discarded_nodes, 2);
        assert_eq!(results.valid_nodes, 1);
        let statuses: Vec<_> = results
            .node_results
            .iter()
            .map(|r| (r.path.as_str(), r.status.clone()))
            .collect();
        assert_eq!(
            statuses,
            [
                ("/system/hostname", NodeStatus::Discarded),
                ("/system", NodeStatus::Discarded),
                ("/system", NodeStatus::Valid),
            ]
        );
    }

    #[test]
    fn test_deep_tree_is_walked_without_recursion() {
        const DEPTH: usize = 6_000;
        let mut schema = Schema::new();
        let mut parent = None;
        let mut levels = Vec::with_capacity(DEPTH);
        for _ in 0..DEPTH {
            let level = schema.container(parent, "n").unwrap();
            levels.push(level);
            parent = Some(level);
        }
        let mut tree = DataTree::new();
        let mut node = None;
        for level in levels {
            node = Some(tree.add_inner(&schema, node, level).unwrap());
        }

        let engine = ValidationEngine::new(&schema, ValidationOptions::CONFIG).unwrap();
        let results = engine.validate_tree(&mut tree, &mut UnresolvedQueue::new());

        assert_eq!(results.total_nodes, DEPTH);
        assert!(results.all_valid());
        // post-order: the innermost container is checked first
        assert_eq!(results.node_results[0].path.len(), 2 * DEPTH);
        assert_eq!(results.node_results[DEPTH - 1].path, "/n");
    }

    #[test]
    fn test_validate_node() {
        let f = fixture();
        let mut tree = DataTree::new();
        let top = tree.add_inner(&f.schema, None, f.top).unwrap();
        let peer = tree.add_leaf(&f.schema, Some(top), f.peer, "r1").unwrap();

        let engine = ValidationEngine::new(&f.schema, ValidationOptions::CONFIG).unwrap();
        let mut queue = UnresolvedQueue::new();
        assert_eq!(engine.validate_node(&mut tree, peer, &mut queue), Ok(Verdict::Valid));
        assert!(!tree.get(peer).unwrap().validity);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_results_serialization() {
        let results = ValidationResults::aggregate(
            vec![
                NodeValidationResult::valid("/a".to_string(), "a".to_string()),
                NodeValidationResult::discarded("/b".to_string(), "b".to_string()),
                NodeValidationResult::failed(
                    "/c".to_string(),
                    "c".to_string(),
                    ValidationError::DuplicateInstance {
                        element: "c".to_string(),
                        parent: "data tree".to_string(),
                    },
                ),
            ],
            Duration::from_millis(5),
        );
        assert_eq!(results.valid_nodes, 1);
        assert_eq!(results.discarded_nodes, 1);
        assert_eq!(results.failed_nodes, 1);

        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["node_results"][0]["status"], "valid");
        assert_eq!(json["node_results"][2]["kind"], "duplicate-instance");
        assert!(json["node_results"][2].get("error").is_none());
    }
}
