#![allow(dead_code)]

use validate_datatree::{
    BaseType, DataTree, DeferredResolver, NodeId, RequestKind, ResolveError, Schema, SchemaId,
    SchemaKind, SchemaNode,
};

mockall::mock! {
    pub Resolver {}

    impl DeferredResolver for Resolver {
        fn resolve_now(
            &mut self,
            tree: &mut DataTree,
            node: NodeId,
            kind: RequestKind,
        ) -> Result<(), ResolveError>;
    }
}

/// Schema of a small interface-management module
///
/// ```text
/// container interfaces
///   list interface (key name, unique mtu+description)
///     leaf name
///     leaf type (mandatory)
///     leaf mtu
///     leaf description
///     leaf lower-layer (leafref)
///     choice addressing
///       case dhcp:   leaf dhcp-client
///       case static: leaf-list address
///     container statistics (state)
///       leaf in-octets
/// ```
pub struct InterfacesSchema {
    pub schema: Schema,
    pub interfaces: SchemaId,
    pub interface: SchemaId,
    pub name: SchemaId,
    pub kind: SchemaId,
    pub mtu: SchemaId,
    pub description: SchemaId,
    pub lower_layer: SchemaId,
    pub dhcp_client: SchemaId,
    pub address: SchemaId,
    pub statistics: SchemaId,
    pub in_octets: SchemaId,
}

impl InterfacesSchema {
    pub fn new() -> Self {
        let mut schema = Schema::new();
        let interfaces = schema
            .add(None, SchemaNode::new(SchemaKind::Container, "interfaces").in_module("if"))
            .unwrap();
        let interface = schema.list(Some(interfaces), "interface").unwrap();
        let name = schema.leaf(Some(interface), "name", BaseType::String).unwrap();
        let kind = schema
            .add(Some(interface), SchemaNode::new(SchemaKind::Leaf, "type").mandatory())
            .unwrap();
        let mtu = schema.leaf(Some(interface), "mtu", BaseType::Uint).unwrap();
        let description = schema.leaf(Some(interface), "description", BaseType::String).unwrap();
        let lower_layer = schema.leaf(Some(interface), "lower-layer", BaseType::Leafref).unwrap();
        let addressing = schema.choice(Some(interface), "addressing").unwrap();
        let dhcp = schema.case(addressing, "dhcp").unwrap();
        let dhcp_client = schema.leaf(Some(dhcp), "dhcp-client", BaseType::Boolean).unwrap();
        let static_case = schema.case(addressing, "static").unwrap();
        let address = schema.leaf_list(Some(static_case), "address", BaseType::String).unwrap();
        let statistics = schema
            .add(Some(interface), SchemaNode::new(SchemaKind::Container, "statistics").read_only())
            .unwrap();
        let in_octets = schema.leaf(Some(statistics), "in-octets", BaseType::Uint).unwrap();

        schema.set_keys(interface, &[name]).unwrap();
        schema.add_unique(interface, &[mtu, description]).unwrap();

        Self {
            schema,
            interfaces,
            interface,
            name,
            kind,
            mtu,
            description,
            lower_layer,
            dhcp_client,
            address,
            statistics,
            in_octets,
        }
    }

    /// Append `interface` entry with its key and type
    pub fn add_interface(&self, tree: &mut DataTree, parent: NodeId, name: &str) -> NodeId {
        let entry = tree.add_inner(&self.schema, Some(parent), self.interface).unwrap();
        tree.add_leaf(&self.schema, Some(entry), self.name, name).unwrap();
        tree.add_leaf(&self.schema, Some(entry), self.kind, "ethernetCsmacd").unwrap();
        entry
    }

    /// A valid configuration with `count` interfaces named eth0, eth1, ...
    pub fn config_tree(&self, count: usize) -> (DataTree, NodeId) {
        let mut tree = DataTree::new();
        let root = tree.add_inner(&self.schema, None, self.interfaces).unwrap();
        for i in 0..count {
            let entry = self.add_interface(&mut tree, root, &format!("eth{}", i));
            tree.add_leaf(&self.schema, Some(entry), self.mtu, &(1500 + i).to_string())
                .unwrap();
        }
        (tree, root)
    }
}
