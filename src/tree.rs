//! Data Tree Arena
//!
//! Instance nodes live in generation-checked slots. A [`NodeId`] keeps
//! working until the node is freed; afterwards every lookup through it fails
//! with [`TreeError::StaleNode`], even if the slot has been reused.
//!
//! Siblings form a ring: `next` is `None` at the tail and the head's `prev`
//! points at the tail, so appending is O(1). A node without siblings is its
//! own `prev`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TreeError, TreeResult};
use crate::schema::{BaseType, IdentityId, Schema, SchemaId, SchemaKind};

/// Handle to a node of a [`DataTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

/// Value of a leaf or leaf-list instance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LeafValue {
    /// Raw text; `None` marks a selection node in filters
    pub value_str: Option<String>,
    /// Type the value was resolved to (differs from the schema type for unions)
    pub value_type: BaseType,
    /// Marker left when resolution of the value was postponed
    pub unresolved: bool,
    /// Resolved leafref or instance-identifier target
    pub target: Option<NodeId>,
    /// Resolved identityref value
    pub identity: Option<IdentityId>,
}

impl LeafValue {
    pub fn new(value_str: impl Into<String>, value_type: BaseType) -> Self {
        Self {
            value_str: Some(value_str.into()),
            value_type,
            ..Self::default()
        }
    }

    /// A leaf without value: matches any value in a filter
    pub fn selection(value_type: BaseType) -> Self {
        Self {
            value_type,
            ..Self::default()
        }
    }

    pub fn with_identity(mut self, identity: IdentityId) -> Self {
        self.identity = Some(identity);
        self
    }
}

/// Kind-specific payload of a data node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeContent {
    /// Container, list or rpc
    Inner,
    Leaf(LeafValue),
    /// Opaque anyxml payload; `None` marks a selection node in filters
    AnyXml(Option<String>),
}

impl NodeContent {
    fn fits(&self, kind: SchemaKind) -> bool {
        match self {
            NodeContent::Inner => kind.is_inner() || kind == SchemaKind::Rpc,
            NodeContent::Leaf(_) => kind.is_leafy(),
            NodeContent::AnyXml(_) => kind == SchemaKind::AnyXml,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNode {
    schema: SchemaId,
    parent: Option<NodeId>,
    child: Option<NodeId>,
    next: Option<NodeId>,
    prev: NodeId,
    content: NodeContent,
    /// Set while the node awaits (re)validation
    pub validity: bool,
    /// Set while an unevaluated "when" condition is attached
    pub when_status: bool,
}

impl DataNode {
    pub fn schema(&self) -> SchemaId {
        self.schema
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    pub fn leaf(&self) -> Option<&LeafValue> {
        match &self.content {
            NodeContent::Leaf(value) => Some(value),
            _ => None,
        }
    }

    pub fn leaf_mut(&mut self) -> Option<&mut LeafValue> {
        match &mut self.content {
            NodeContent::Leaf(value) => Some(value),
            _ => None,
        }
    }

    pub fn value_str(&self) -> Option<&str> {
        self.leaf().and_then(|v| v.value_str.as_deref())
    }

    pub fn has_children(&self) -> bool {
        self.child.is_some()
    }

    /// Filter selection node: a leaf without value, an anyxml without
    /// payload, or an inner node without children
    pub fn is_selection(&self) -> bool {
        match &self.content {
            NodeContent::Inner => self.child.is_none(),
            NodeContent::Leaf(value) => value.value_str.is_none(),
            NodeContent::AnyXml(payload) => payload.is_none(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u32,
    node: Option<DataNode>,
}

/// Arena owning a forest of data nodes
#[derive(Debug, Clone, Default)]
pub struct DataTree {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    first_root: Option<NodeId>,
    live: usize,
}

impl DataTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_ok()
    }

    pub fn get(&self, id: NodeId) -> TreeResult<&DataNode> {
        self.slots
            .get(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(TreeError::StaleNode(id))
    }

    pub fn get_mut(&mut self, id: NodeId) -> TreeResult<&mut DataNode> {
        self.slots
            .get_mut(id.index())
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(TreeError::StaleNode(id))
    }

    /// Create a node and append it to `parent`'s children (or to the
    /// top-level siblings); the node starts out needing validation
    pub fn insert(
        &mut self,
        schema: &Schema,
        parent: Option<NodeId>,
        sid: SchemaId,
        content: NodeContent,
    ) -> TreeResult<NodeId> {
        let node = schema.node(sid);
        if !content.fits(node.kind) {
            return Err(TreeError::ContentMismatch {
                element: node.name.clone(),
                kind: node.kind,
            });
        }
        let parent_schema = match parent {
            Some(p) => Some(self.get(p)?.schema),
            None => None,
        };
        if schema.data_parent(sid) != parent_schema {
            return Err(TreeError::WrongParent {
                element: node.name.clone(),
                parent: parent_schema
                    .map(|p| schema.name(p).to_string())
                    .unwrap_or_else(|| "data tree".to_string()),
            });
        }

        let id = self.alloc(DataNode {
            schema: sid,
            parent: None,
            child: None,
            next: None,
            prev: NodeId {
                index: 0,
                generation: 0,
            },
            content,
            validity: true,
            when_status: node.when.is_some(),
        });
        self.link_tail(parent, id)?;
        Ok(id)
    }

    pub fn add_inner(&mut self, schema: &Schema, parent: Option<NodeId>, sid: SchemaId) -> TreeResult<NodeId> {
        self.insert(schema, parent, sid, NodeContent::Inner)
    }

    /// Add a leaf or leaf-list instance with a value typed after its schema
    pub fn add_leaf(
        &mut self,
        schema: &Schema,
        parent: Option<NodeId>,
        sid: SchemaId,
        value: &str,
    ) -> TreeResult<NodeId> {
        let value_type = Self::schema_base(schema, sid);
        self.insert(
            schema,
            parent,
            sid,
            NodeContent::Leaf(LeafValue::new(value, value_type)),
        )
    }

    /// Add a leaf or leaf-list instance without value
    pub fn add_selection(&mut self, schema: &Schema, parent: Option<NodeId>, sid: SchemaId) -> TreeResult<NodeId> {
        let value_type = Self::schema_base(schema, sid);
        self.insert(
            schema,
            parent,
            sid,
            NodeContent::Leaf(LeafValue::selection(value_type)),
        )
    }

    pub fn add_anyxml(
        &mut self,
        schema: &Schema,
        parent: Option<NodeId>,
        sid: SchemaId,
        payload: Option<&str>,
    ) -> TreeResult<NodeId> {
        self.insert(
            schema,
            parent,
            sid,
            NodeContent::AnyXml(payload.map(str::to_string)),
        )
    }

    fn schema_base(schema: &Schema, sid: SchemaId) -> BaseType {
        schema
            .node(sid)
            .leaf_type
            .map(|t| t.base)
            .unwrap_or_default()
    }

    fn alloc(&mut self, mut node: DataNode) -> NodeId {
        self.live += 1;
        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = NodeId {
            index,
            generation: slot.generation,
        };
        node.prev = id;
        slot.node = Some(node);
        id
    }

    fn head_of(&self, parent: Option<NodeId>) -> TreeResult<Option<NodeId>> {
        match parent {
            Some(p) => Ok(self.get(p)?.child),
            None => Ok(self.first_root),
        }
    }

    fn set_head(&mut self, parent: Option<NodeId>, head: Option<NodeId>) -> TreeResult<()> {
        match parent {
            Some(p) => self.get_mut(p)?.child = head,
            None => self.first_root = head,
        }
        Ok(())
    }

    /// Append an unlinked node at the tail of `parent`'s children
    fn link_tail(&mut self, parent: Option<NodeId>, id: NodeId) -> TreeResult<()> {
        match self.head_of(parent)? {
            Some(head) => {
                let tail = self.get(head)?.prev;
                self.get_mut(tail)?.next = Some(id);
                self.get_mut(head)?.prev = id;
                let node = self.get_mut(id)?;
                node.prev = tail;
                node.next = None;
            }
            None => {
                self.set_head(parent, Some(id))?;
                let node = self.get_mut(id)?;
                node.prev = id;
                node.next = None;
            }
        }
        self.get_mut(id)?.parent = parent;
        Ok(())
    }

    /// Detach `id` from its siblings and parent, keeping its subtree
    pub fn unlink(&mut self, id: NodeId) -> TreeResult<()> {
        let (parent, prev, next) = {
            let node = self.get(id)?;
            (node.parent, node.prev, node.next)
        };
        let is_head = prev == id || self.get(prev)?.next != Some(id);

        if is_head {
            if self.head_of(parent)? == Some(id) {
                self.set_head(parent, next)?;
            }
            if let Some(next) = next {
                self.get_mut(next)?.prev = prev;
            }
        } else {
            self.get_mut(prev)?.next = next;
            match next {
                Some(next) => self.get_mut(next)?.prev = prev,
                None => {
                    if let Some(head) = self.head_of(parent)? {
                        self.get_mut(head)?.prev = prev;
                    }
                }
            }
        }

        let node = self.get_mut(id)?;
        node.parent = None;
        node.next = None;
        node.prev = id;
        Ok(())
    }

    /// Move `id` (with its subtree) to the tail of `parent`'s children
    pub fn append_child(&mut self, parent: NodeId, id: NodeId) -> TreeResult<()> {
        self.get(parent)?;
        self.unlink(id)?;
        self.link_tail(Some(parent), id)
    }

    /// Unlink `id` and release it together with its whole subtree
    pub fn free(&mut self, id: NodeId) -> TreeResult<()> {
        self.unlink(id)?;
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            pending.extend(self.children(current));
            let slot = &mut self.slots[current.index()];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free_slots.push(current.index);
            self.live -= 1;
        }
        Ok(())
    }

    /// Release every child of `id`, leaving `id` childless
    pub fn free_children(&mut self, id: NodeId) -> TreeResult<()> {
        for child in self.children(id) {
            self.free(child)?;
        }
        Ok(())
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).ok().and_then(|n| n.child)
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        self.first_child(id).is_some()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).ok().and_then(|n| n.next)
    }

    /// Previous sibling, `None` for the first one
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        let prev = self.get(id).ok()?.prev;
        if prev == id {
            return None;
        }
        match self.get(prev) {
            Ok(p) if p.next == Some(id) => Some(prev),
            _ => None,
        }
    }

    /// First node of `id`'s sibling ring
    pub fn first_sibling(&self, id: NodeId) -> Option<NodeId> {
        let node = self.get(id).ok()?;
        if let Some(parent) = node.parent {
            return self.first_child(parent);
        }
        let mut start = id;
        while let Some(prev) = self.prev_sibling(start) {
            start = prev;
        }
        Some(start)
    }

    /// Snapshot of the children of `id` in document order
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.collect_from(self.first_child(id))
    }

    /// Snapshot of `id` and its siblings in document order
    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        self.collect_from(self.first_sibling(id))
    }

    /// Snapshot of the top-level nodes in document order
    pub fn roots(&self) -> Vec<NodeId> {
        self.collect_from(self.first_root)
    }

    fn collect_from(&self, start: Option<NodeId>) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = start;
        while let Some(id) = current {
            out.push(id);
            current = self.next_sibling(id);
        }
        out
    }

    /// Data path of `id`, prefixed with the module where it changes
    pub fn path(&self, schema: &Schema, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let Ok(node) = self.get(node_id) else {
                break;
            };
            segments.push(node.schema);
            current = node.parent;
        }

        let mut path = String::new();
        let mut module: Option<&str> = None;
        for sid in segments.iter().rev() {
            let sn = schema.node(*sid);
            path.push('/');
            if module != Some(sn.module.as_str()) && !sn.module.is_empty() {
                path.push_str(&sn.module);
                path.push(':');
            }
            module = Some(sn.module.as_str());
            path.push_str(&sn.name);
        }
        path
    }
}
