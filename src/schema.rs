//! Schema Tree
//!
//! An immutable-during-validation arena of schema nodes. Data nodes refer to
//! schema nodes through [`SchemaId`]; the ids are only meaningful for the
//! [`Schema`] that issued them.
//!
//! The builder methods exist so that callers can assemble a schema
//! programmatically. They check structure (a key must be a leaf child of its
//! list, a leaf cannot have children) but they are not a schema compiler.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};

/// Handle to a node of a [`Schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId(usize);

/// Handle to a feature declared in a [`Schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureId(usize);

/// Handle to a derived type declared in a [`Schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypedefId(usize);

/// Handle to an identity declared in a [`Schema`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityId(usize);

/// Kind of a schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
    Container,
    List,
    Leaf,
    LeafList,
    AnyXml,
    Choice,
    Case,
    /// RPC or action; instantiated like a container
    Rpc,
    /// Input section of an RPC, never instantiated
    Input,
    /// Output section of an RPC, never instantiated
    Output,
}

impl SchemaKind {
    /// Whether data nodes of this kind can exist
    pub fn is_instantiable(self) -> bool {
        !matches!(
            self,
            SchemaKind::Choice | SchemaKind::Case | SchemaKind::Input | SchemaKind::Output
        )
    }

    /// Leaf or leaf-list
    pub fn is_leafy(self) -> bool {
        matches!(self, SchemaKind::Leaf | SchemaKind::LeafList)
    }

    /// Container or list
    pub fn is_inner(self) -> bool {
        matches!(self, SchemaKind::Container | SchemaKind::List)
    }

    /// Whether schema children are allowed under this kind
    pub fn has_children(self) -> bool {
        !matches!(
            self,
            SchemaKind::Leaf | SchemaKind::LeafList | SchemaKind::AnyXml
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaKind::Container => "container",
            SchemaKind::List => "list",
            SchemaKind::Leaf => "leaf",
            SchemaKind::LeafList => "leaf-list",
            SchemaKind::AnyXml => "anyxml",
            SchemaKind::Choice => "choice",
            SchemaKind::Case => "case",
            SchemaKind::Rpc => "rpc",
            SchemaKind::Input => "input",
            SchemaKind::Output => "output",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Current,
    Deprecated,
    Obsolete,
}

/// Built-in base type of a leaf value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaseType {
    #[default]
    String,
    Int,
    Uint,
    Decimal64,
    Boolean,
    Empty,
    Enumeration,
    Bits,
    Binary,
    Union,
    Leafref,
    InstanceIdentifier,
    Identityref,
}

/// Type of a leaf or leaf-list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafType {
    pub base: BaseType,
    /// Innermost derived type, if the leaf uses a typedef
    pub derived: Option<TypedefId>,
    /// For instance-identifiers: whether the target must exist
    pub require_instance: bool,
}

impl LeafType {
    pub fn new(base: BaseType) -> Self {
        Self {
            base,
            derived: None,
            require_instance: true,
        }
    }

    pub fn derived_from(mut self, typedef: TypedefId) -> Self {
        self.derived = Some(typedef);
        self
    }

    pub fn require_instance(mut self, required: bool) -> Self {
        self.require_instance = required;
        self
    }
}

impl Default for LeafType {
    fn default() -> Self {
        Self::new(BaseType::String)
    }
}

/// A derived type; `base` links to the typedef it is derived from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typedef {
    pub name: String,
    pub status: Status,
    pub base: Option<TypedefId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub module: String,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feature {
    pub name: String,
    pub enabled: bool,
}

/// A single schema definition
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub name: String,
    pub module: String,
    pub kind: SchemaKind,
    /// Configuration (writable) data when true, operational state otherwise
    pub config: bool,
    pub status: Status,
    /// Leaf, anyxml and choice: an instance is required
    pub mandatory: bool,
    /// Container: the container carries meaning by existing
    pub presence: bool,
    /// List and leaf-list: minimal number of instances
    pub min_elements: u32,
    pub if_features: Vec<FeatureId>,
    pub musts: Vec<String>,
    pub when: Option<String>,
    pub leaf_type: Option<LeafType>,
    parent: Option<SchemaId>,
    children: Vec<SchemaId>,
    keys: Vec<SchemaId>,
    unique: Vec<Vec<SchemaId>>,
}

impl SchemaNode {
    pub fn new(kind: SchemaKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: String::new(),
            kind,
            config: true,
            status: Status::Current,
            mandatory: false,
            presence: false,
            min_elements: 0,
            if_features: Vec::new(),
            musts: Vec::new(),
            when: None,
            leaf_type: kind.is_leafy().then(LeafType::default),
            parent: None,
            children: Vec::new(),
            keys: Vec::new(),
            unique: Vec::new(),
        }
    }

    pub fn in_module(mut self, module: impl Into<String>) -> Self {
        self.module = module.into();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.config = false;
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn presence(mut self) -> Self {
        self.presence = true;
        self
    }

    pub fn min_elements(mut self, min: u32) -> Self {
        self.min_elements = min;
        self
    }

    pub fn with_type(mut self, leaf_type: LeafType) -> Self {
        self.leaf_type = Some(leaf_type);
        self
    }

    pub fn with_must(mut self, expr: impl Into<String>) -> Self {
        self.musts.push(expr.into());
        self
    }

    pub fn with_when(mut self, expr: impl Into<String>) -> Self {
        self.when = Some(expr.into());
        self
    }

    pub fn if_feature(mut self, feature: FeatureId) -> Self {
        self.if_features.push(feature);
        self
    }

    pub fn parent(&self) -> Option<SchemaId> {
        self.parent
    }

    pub fn children(&self) -> &[SchemaId] {
        &self.children
    }

    /// List keys in declaration order
    pub fn keys(&self) -> &[SchemaId] {
        &self.keys
    }

    pub fn unique(&self) -> &[Vec<SchemaId>] {
        &self.unique
    }
}

/// Arena holding a whole schema tree
#[derive(Debug, Clone, Default)]
pub struct Schema {
    nodes: Vec<SchemaNode>,
    roots: Vec<SchemaId>,
    features: Vec<Feature>,
    typedefs: Vec<Typedef>,
    identities: Vec<Identity>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `node` under `parent` (or as a top-level node)
    ///
    /// The node inherits the parent's module, and becomes state data when the
    /// parent is state data.
    pub fn add(&mut self, parent: Option<SchemaId>, mut node: SchemaNode) -> SchemaResult<SchemaId> {
        let id = SchemaId(self.nodes.len());
        match parent {
            Some(p) => {
                let parent_node = self.nodes.get(p.0).ok_or(SchemaError::UnknownNode(p))?;
                if !parent_node.kind.has_children() {
                    return Err(SchemaError::InvalidParent {
                        element: node.name,
                        parent: parent_node.name.clone(),
                        kind: parent_node.kind,
                    });
                }
                node.module = parent_node.module.clone();
                node.config &= parent_node.config;
                node.parent = Some(p);
                self.nodes[p.0].children.push(id);
            }
            None => self.roots.push(id),
        }
        self.nodes.push(node);
        Ok(id)
    }

    pub fn container(&mut self, parent: Option<SchemaId>, name: &str) -> SchemaResult<SchemaId> {
        self.add(parent, SchemaNode::new(SchemaKind::Container, name))
    }

    pub fn list(&mut self, parent: Option<SchemaId>, name: &str) -> SchemaResult<SchemaId> {
        self.add(parent, SchemaNode::new(SchemaKind::List, name))
    }

    pub fn leaf(&mut self, parent: Option<SchemaId>, name: &str, base: BaseType) -> SchemaResult<SchemaId> {
        self.add(
            parent,
            SchemaNode::new(SchemaKind::Leaf, name).with_type(LeafType::new(base)),
        )
    }

    pub fn leaf_list(&mut self, parent: Option<SchemaId>, name: &str, base: BaseType) -> SchemaResult<SchemaId> {
        self.add(
            parent,
            SchemaNode::new(SchemaKind::LeafList, name).with_type(LeafType::new(base)),
        )
    }

    pub fn anyxml(&mut self, parent: Option<SchemaId>, name: &str) -> SchemaResult<SchemaId> {
        self.add(parent, SchemaNode::new(SchemaKind::AnyXml, name))
    }

    pub fn choice(&mut self, parent: Option<SchemaId>, name: &str) -> SchemaResult<SchemaId> {
        self.add(parent, SchemaNode::new(SchemaKind::Choice, name))
    }

    pub fn case(&mut self, choice: SchemaId, name: &str) -> SchemaResult<SchemaId> {
        self.add(Some(choice), SchemaNode::new(SchemaKind::Case, name))
    }

    /// Declare the keys of `list`; each key must be a leaf child of the list
    pub fn set_keys(&mut self, list: SchemaId, keys: &[SchemaId]) -> SchemaResult<()> {
        self.check_list_leaves(list, keys)?;
        self.nodes[list.0].keys = keys.to_vec();
        Ok(())
    }

    /// Declare a unique constraint over leaf children of `list`
    pub fn add_unique(&mut self, list: SchemaId, leaves: &[SchemaId]) -> SchemaResult<()> {
        self.check_list_leaves(list, leaves)?;
        self.nodes[list.0].unique.push(leaves.to_vec());
        Ok(())
    }

    fn check_list_leaves(&self, list: SchemaId, leaves: &[SchemaId]) -> SchemaResult<()> {
        let list_node = self.nodes.get(list.0).ok_or(SchemaError::UnknownNode(list))?;
        if list_node.kind != SchemaKind::List {
            return Err(SchemaError::NotAList {
                element: list_node.name.clone(),
            });
        }
        for &leaf in leaves {
            let leaf_node = self.nodes.get(leaf.0).ok_or(SchemaError::UnknownNode(leaf))?;
            if leaf_node.kind != SchemaKind::Leaf || leaf_node.parent != Some(list) {
                return Err(SchemaError::InvalidKey {
                    key: leaf_node.name.clone(),
                    list: list_node.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn add_feature(&mut self, name: &str, enabled: bool) -> FeatureId {
        self.features.push(Feature {
            name: name.to_string(),
            enabled,
        });
        FeatureId(self.features.len() - 1)
    }

    pub fn set_feature(&mut self, feature: FeatureId, enabled: bool) {
        if let Some(f) = self.features.get_mut(feature.0) {
            f.enabled = enabled;
        }
    }

    pub fn add_typedef(&mut self, name: &str, status: Status, base: Option<TypedefId>) -> TypedefId {
        self.typedefs.push(Typedef {
            name: name.to_string(),
            status,
            base,
        });
        TypedefId(self.typedefs.len() - 1)
    }

    pub fn add_identity(&mut self, name: &str, module: &str, status: Status) -> IdentityId {
        self.identities.push(Identity {
            name: name.to_string(),
            module: module.to_string(),
            status,
        });
        IdentityId(self.identities.len() - 1)
    }

    /// Panics when `id` was issued by another schema.
    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: SchemaId) -> Option<&SchemaNode> {
        self.nodes.get(id.0)
    }

    pub fn kind(&self, id: SchemaId) -> SchemaKind {
        self.node(id).kind
    }

    pub fn name(&self, id: SchemaId) -> &str {
        &self.node(id).name
    }

    pub fn parent(&self, id: SchemaId) -> Option<SchemaId> {
        self.node(id).parent
    }

    pub fn roots(&self) -> &[SchemaId] {
        &self.roots
    }

    pub fn typedef(&self, id: TypedefId) -> Option<&Typedef> {
        self.typedefs.get(id.0)
    }

    pub fn identity(&self, id: IdentityId) -> Option<&Identity> {
        self.identities.get(id.0)
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id.0)
    }

    /// Schema ancestors of `id`, nearest first
    pub fn ancestors(&self, id: SchemaId) -> Ancestors<'_> {
        Ancestors {
            schema: self,
            next: self.parent(id),
        }
    }

    /// Whether `id` and all its ancestors have their if-features enabled
    pub fn is_enabled(&self, id: SchemaId) -> bool {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .all(|s| {
                self.node(s)
                    .if_features
                    .iter()
                    .all(|f| self.feature(*f).is_some_and(|f| f.enabled))
            })
    }

    /// Whether `id` lives in the input or output section of an RPC
    pub fn in_operation(&self, id: SchemaId) -> bool {
        self.ancestors(id)
            .any(|s| matches!(self.kind(s), SchemaKind::Input | SchemaKind::Output))
    }

    /// Nearest ancestor whose instances are the data parent of `id`'s instances
    pub fn data_parent(&self, id: SchemaId) -> Option<SchemaId> {
        self.ancestors(id).find(|s| self.kind(*s).is_instantiable())
    }

    /// Nearest ancestor that is neither a choice nor a case
    ///
    /// Schema siblings in declaration order are the flattened children of
    /// this scope.
    pub fn sibling_scope(&self, id: SchemaId) -> Option<SchemaId> {
        self.ancestors(id)
            .find(|s| !matches!(self.kind(*s), SchemaKind::Choice | SchemaKind::Case))
    }

    /// Name used in messages for the data parent of `id`
    pub fn parent_name(&self, id: SchemaId) -> &str {
        self.sibling_scope(id)
            .map(|p| self.name(p))
            .unwrap_or("data tree")
    }

    /// Data-level siblings of `id` in declaration order, looking through
    /// choices and cases; top-level nodes are limited to `id`'s module
    pub fn data_siblings(&self, id: SchemaId) -> Vec<SchemaId> {
        let mut out = Vec::new();
        match self.sibling_scope(id) {
            Some(scope) => self.flatten_into(self.node(scope).children(), &mut out),
            None => {
                let module = &self.node(id).module;
                let roots: Vec<SchemaId> = self
                    .roots
                    .iter()
                    .copied()
                    .filter(|r| &self.node(*r).module == module)
                    .collect();
                self.flatten_into(&roots, &mut out);
            }
        }
        out
    }

    /// Data-level siblings declared after `id`
    pub fn next_data_siblings(&self, id: SchemaId) -> Vec<SchemaId> {
        let siblings = self.data_siblings(id);
        match siblings.iter().position(|s| *s == id) {
            Some(pos) => siblings[pos + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    fn flatten_into(&self, ids: &[SchemaId], out: &mut Vec<SchemaId>) {
        for &id in ids {
            match self.kind(id) {
                SchemaKind::Choice | SchemaKind::Case => {
                    self.flatten_into(self.node(id).children(), out)
                }
                _ => out.push(id),
            }
        }
    }
}

/// Iterator over schema ancestors
pub struct Ancestors<'a> {
    schema: &'a Schema,
    next: Option<SchemaId>,
}

impl Iterator for Ancestors<'_> {
    type Item = SchemaId;

    fn next(&mut self) -> Option<SchemaId> {
        let current = self.next?;
        self.next = self.schema.parent(current);
        Some(current)
    }
}
