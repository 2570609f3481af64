// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The in-memory address space: the pluggable [`NodeStore`] interface, the
//! default hash-map store, the [`NodeStoreSwitch`] routing operations by
//! namespace index, and the [`AddressSpace`] facade tying stores, references,
//! the type tree and node lifecycle together.

mod utils;

pub use utils::*;

use hashbrown::HashMap;
use log::{error, info, warn};

use uastack_nodes::{
    DefaultTypeTree, HasNodeId, NodeBase, NodeType, ReferenceDirection, ReferenceRef, References,
    TypeTree,
};
use uastack_types::{
    BrowseDirection, NodeClass, NodeId, QualifiedName, ReferenceTypeId, StatusCode,
};

/// Callback run after a node is created and type-checked, before any service
/// can see it. May mutate the node, including its context cell.
pub type NodeConstructor = Box<dyn FnMut(&mut NodeType) -> Result<(), StatusCode> + Send>;
/// Callback run before a node is freed.
pub type NodeDestructor = Box<dyn FnMut(&mut NodeType) + Send>;

/// Global and per-type node lifecycle callbacks. Constructors run children
/// first, then the parent; destructors run the parent before its children.
#[derive(Default)]
pub struct NodeLifecycle {
    /// Constructor applied to every added node.
    pub constructor: Option<NodeConstructor>,
    /// Destructor applied to every removed node.
    pub destructor: Option<NodeDestructor>,
    /// Lifecycle pairs keyed by type definition node id.
    type_constructors: HashMap<NodeId, NodeConstructor>,
    type_destructors: HashMap<NodeId, NodeDestructor>,
}

impl NodeLifecycle {
    /// Register a lifecycle pair for instances of the given type.
    pub fn set_type_lifecycle(
        &mut self,
        type_definition: NodeId,
        constructor: Option<NodeConstructor>,
        destructor: Option<NodeDestructor>,
    ) {
        if let Some(constructor) = constructor {
            self.type_constructors
                .insert(type_definition.clone(), constructor);
        }
        if let Some(destructor) = destructor {
            self.type_destructors.insert(type_definition, destructor);
        }
    }
}

/// The abstract node store interface. Every namespace may plug in its own
/// implementation; read-only stores return `BadNotImplemented` from the
/// mutators.
pub trait NodeStore: Send {
    /// Allocate a fresh numeric node id in the given namespace.
    fn next_node_id(&mut self, namespace: u16) -> NodeId;

    /// Insert a node, taking ownership. A null node id gets a fresh numeric
    /// id assigned; an existing id fails with `BadNodeIdExists`.
    fn insert(&mut self, node: NodeType) -> Result<NodeId, StatusCode>;

    /// Borrow a node.
    fn get(&self, node_id: &NodeId) -> Option<&NodeType>;

    /// Borrow a node mutably. `None` for unknown nodes and on read-only
    /// stores.
    fn get_mut(&mut self, node_id: &NodeId) -> Option<&mut NodeType>;

    /// Remove a node and return it. Reference cleanup is the caller's
    /// responsibility since references live outside the store.
    fn remove(&mut self, node_id: &NodeId) -> Option<NodeType>;

    /// Visit every node. The visitor must not assume any order.
    fn iterate(&self, visitor: &mut dyn FnMut(&NodeType));

    /// `true` if the node exists.
    fn contains(&self, node_id: &NodeId) -> bool {
        self.get(node_id).is_some()
    }
}

/// The standard node store: a hash map from node id to node.
#[derive(Default)]
pub struct DefaultNodeStore {
    node_map: HashMap<NodeId, NodeType>,
    next_numeric_id: u32,
}

impl DefaultNodeStore {
    /// Create an empty store.
    pub fn new() -> DefaultNodeStore {
        DefaultNodeStore {
            node_map: HashMap::new(),
            next_numeric_id: 1000,
        }
    }
}

impl NodeStore for DefaultNodeStore {
    fn next_node_id(&mut self, namespace: u16) -> NodeId {
        loop {
            let id = NodeId::new(namespace, self.next_numeric_id);
            self.next_numeric_id = self.next_numeric_id.wrapping_add(1);
            if !self.node_map.contains_key(&id) {
                return id;
            }
        }
    }

    fn insert(&mut self, node: NodeType) -> Result<NodeId, StatusCode> {
        let node_id = node.node_id().clone();
        if self.node_map.contains_key(&node_id) {
            error!("Node {node_id} already exists");
            return Err(StatusCode::BadNodeIdExists);
        }
        self.node_map.insert(node_id.clone(), node);
        Ok(node_id)
    }

    fn get(&self, node_id: &NodeId) -> Option<&NodeType> {
        self.node_map.get(node_id)
    }

    fn get_mut(&mut self, node_id: &NodeId) -> Option<&mut NodeType> {
        self.node_map.get_mut(node_id)
    }

    fn remove(&mut self, node_id: &NodeId) -> Option<NodeType> {
        self.node_map.remove(node_id)
    }

    fn iterate(&self, visitor: &mut dyn FnMut(&NodeType)) {
        for node in self.node_map.values() {
            visitor(node);
        }
    }
}

struct Namespace {
    uri: String,
    store: Box<dyn NodeStore>,
}

/// Routes node store operations to the store of the namespace in the node
/// id. Namespace 0 exists from the start.
pub struct NodeStoreSwitch {
    namespaces: Vec<Namespace>,
}

impl Default for NodeStoreSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStoreSwitch {
    /// Create a switch with the core namespace backed by the default store.
    pub fn new() -> NodeStoreSwitch {
        NodeStoreSwitch {
            namespaces: vec![Namespace {
                uri: uastack_types::OPC_UA_NAMESPACE.to_string(),
                store: Box::new(DefaultNodeStore::new()),
            }],
        }
    }

    /// Add a namespace backed by the default store, returning its index.
    /// Adding an existing uri returns the existing index.
    pub fn add_namespace(&mut self, uri: &str) -> u16 {
        self.add_namespace_with_store(uri, Box::new(DefaultNodeStore::new()))
    }

    /// Add a namespace with a custom store implementation.
    pub fn add_namespace_with_store(&mut self, uri: &str, store: Box<dyn NodeStore>) -> u16 {
        if let Some(index) = self.namespace_index(uri) {
            return index;
        }
        self.namespaces.push(Namespace {
            uri: uri.to_string(),
            store,
        });
        (self.namespaces.len() - 1) as u16
    }

    /// The index of a namespace uri.
    pub fn namespace_index(&self, uri: &str) -> Option<u16> {
        self.namespaces
            .iter()
            .position(|ns| ns.uri == uri)
            .map(|i| i as u16)
    }

    /// The namespace array, in index order.
    pub fn namespace_array(&self) -> Vec<String> {
        self.namespaces.iter().map(|ns| ns.uri.clone()).collect()
    }

    fn store_for(&self, node_id: &NodeId) -> Option<&dyn NodeStore> {
        self.namespaces
            .get(node_id.namespace as usize)
            .map(|ns| ns.store.as_ref())
    }

    fn store_for_mut(&mut self, node_id: &NodeId) -> Option<&mut Box<dyn NodeStore>> {
        self.namespaces
            .get_mut(node_id.namespace as usize)
            .map(|ns| &mut ns.store)
    }

    /// Borrow a node from whichever namespace owns it.
    pub fn get(&self, node_id: &NodeId) -> Option<&NodeType> {
        self.store_for(node_id)?.get(node_id)
    }

    /// Borrow a node mutably from whichever namespace owns it.
    pub fn get_mut(&mut self, node_id: &NodeId) -> Option<&mut NodeType> {
        self.store_for_mut(node_id)?.get_mut(node_id)
    }

    /// Insert a node into the namespace of its id. Null node ids are
    /// rejected here; the AddNodes pipeline assigns fresh ids before
    /// inserting.
    pub fn insert(&mut self, node: NodeType) -> Result<NodeId, StatusCode> {
        let node_id = node.node_id().clone();
        if node_id.is_null() {
            return Err(StatusCode::BadNodeIdInvalid);
        }
        let Some(store) = self.store_for_mut(&node_id) else {
            return Err(StatusCode::BadNodeIdUnknown);
        };
        store.insert(node)
    }

    /// Remove a node from the namespace of its id.
    pub fn remove(&mut self, node_id: &NodeId) -> Option<NodeType> {
        self.store_for_mut(node_id)?.remove(node_id)
    }

    /// `true` if the node exists in any namespace.
    pub fn contains(&self, node_id: &NodeId) -> bool {
        self.store_for(node_id)
            .map(|s| s.contains(node_id))
            .unwrap_or(false)
    }

    /// Allocate a fresh node id in the given namespace.
    pub fn next_node_id(&mut self, namespace: u16) -> Result<NodeId, StatusCode> {
        self.namespaces
            .get_mut(namespace as usize)
            .map(|ns| ns.store.next_node_id(namespace))
            .ok_or(StatusCode::BadNodeIdUnknown)
    }

    /// Visit every node in every namespace.
    pub fn iterate(&self, visitor: &mut dyn FnMut(&NodeType)) {
        for ns in &self.namespaces {
            ns.store.iterate(visitor);
        }
    }

    /// Number of namespaces.
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    /// Always false; namespace 0 always exists.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// The server address space: namespaced node stores plus the references
/// between nodes, the type tree and the lifecycle callbacks.
#[derive(Default)]
pub struct AddressSpace {
    switch: NodeStoreSwitch,
    references: References,
    type_tree: DefaultTypeTree,
    /// Node lifecycle callbacks.
    pub lifecycle: NodeLifecycle,
}

impl AddressSpace {
    /// Create an empty address space with the core namespace.
    pub fn new() -> AddressSpace {
        AddressSpace {
            switch: NodeStoreSwitch::new(),
            references: References::new(),
            type_tree: DefaultTypeTree::new(),
            lifecycle: NodeLifecycle::default(),
        }
    }

    /// The type tree of the address space.
    pub fn type_tree(&self) -> &DefaultTypeTree {
        &self.type_tree
    }

    /// The node store switch.
    pub fn switch(&self) -> &NodeStoreSwitch {
        &self.switch
    }

    /// Mutable access to the node store switch.
    pub fn switch_mut(&mut self) -> &mut NodeStoreSwitch {
        &mut self.switch
    }

    /// Mutable access to the type tree.
    pub fn type_tree_mut(&mut self) -> &mut DefaultTypeTree {
        &mut self.type_tree
    }

    /// The namespace array.
    pub fn namespace_array(&self) -> Vec<String> {
        self.switch.namespace_array()
    }

    /// Add a namespace, returning its index.
    pub fn add_namespace(&mut self, uri: &str) -> u16 {
        self.switch.add_namespace(uri)
    }

    /// Add a namespace with a custom node store.
    pub fn add_namespace_with_store(&mut self, uri: &str, store: Box<dyn NodeStore>) -> u16 {
        self.switch.add_namespace_with_store(uri, store)
    }

    /// The index of a namespace uri.
    pub fn namespace_index(&self, uri: &str) -> Option<u16> {
        self.switch.namespace_index(uri)
    }

    /// Delete a namespace by uri, deleting its nodes, compacting the
    /// namespace array and rewriting namespace indices in all node ids and
    /// references above the removed index. The core namespace cannot be
    /// deleted.
    pub fn delete_namespace(&mut self, uri: &str) -> Result<(), StatusCode> {
        let Some(index) = self.switch.namespace_index(uri) else {
            return Err(StatusCode::BadNotFound);
        };
        if index == 0 {
            return Err(StatusCode::BadInvalidArgument);
        }

        // Drop the nodes of the namespace and their references.
        let mut doomed = Vec::new();
        self.switch.namespaces[index as usize]
            .store
            .iterate(&mut |node| doomed.push(node.node_id().clone()));
        for id in &doomed {
            let _ = self.delete_node(id, true);
        }
        self.switch.namespaces.remove(index as usize);

        // Rewrite namespace indices above the removed index, in both the
        // stores and the reference store.
        let remap = |id: &NodeId| -> Option<NodeId> {
            if id.namespace > index {
                Some(NodeId {
                    namespace: id.namespace - 1,
                    identifier: id.identifier.clone(),
                })
            } else {
                None
            }
        };

        for ns in self.switch.namespaces.iter_mut().skip(index as usize) {
            let mut ids = Vec::new();
            ns.store.iterate(&mut |node| ids.push(node.node_id().clone()));
            for id in ids {
                if let Some(new_id) = remap(&id) {
                    if let Some(mut node) = ns.store.remove(&id) {
                        set_node_id(&mut node, new_id);
                        if ns.store.insert(node).is_err() {
                            error!("Node id collision while compacting namespaces");
                        }
                    }
                }
            }
        }

        let all = self.references.all_forward();
        let mut rebuilt = References::new();
        for (source, ty, target) in all {
            let source = remap(&source).unwrap_or(source);
            let target = remap(&target).unwrap_or(target);
            let ty = remap(&ty).unwrap_or(ty);
            rebuilt.insert_reference(&source, &target, ty);
        }
        self.references = rebuilt;
        info!("Deleted namespace {uri}, {} nodes", doomed.len());
        Ok(())
    }

    /// Insert a node and optional references without running constructors.
    /// Used by bootstrap code; the AddNodes pipeline is [`Self::add_node`].
    pub fn insert<'a, T, S>(
        &mut self,
        node: T,
        references: Option<&'a [(&'a NodeId, &S, ReferenceDirection)]>,
    ) -> bool
    where
        T: Into<NodeType>,
        S: Into<NodeId> + Clone,
    {
        let node_type = node.into();
        let node_id = node_type.node_id().clone();

        match self.switch.insert(node_type) {
            Ok(_) => {
                if let Some(references) = references {
                    self.references.insert::<S>(&node_id, references);
                }
                true
            }
            Err(e) => {
                error!("Cannot insert node {node_id}: {e}");
                false
            }
        }
    }

    /// Allocate an empty, editable node of the given class. The caller
    /// fills in attributes and hands it to [`Self::insert`] or the node
    /// management pipeline.
    pub fn new_node(
        node_class: NodeClass,
        node_id: &NodeId,
        browse_name: impl Into<QualifiedName>,
    ) -> Option<NodeType> {
        use uastack_nodes::{
            DataType, Method, Object, ObjectType, ReferenceType, Variable, VariableType, View,
        };
        let browse_name = browse_name.into();
        let display_name: uastack_types::LocalizedText = browse_name.name.as_ref().into();
        Some(match node_class {
            NodeClass::Object => {
                Object::new(node_id, browse_name, display_name, Default::default()).into()
            }
            NodeClass::Variable => Variable::new(
                node_id,
                browse_name,
                display_name,
                uastack_types::DataTypeId::BaseDataType,
                uastack_types::Variant::Empty,
            )
            .into(),
            NodeClass::Method => Method::new(node_id, browse_name, display_name, false, false).into(),
            NodeClass::ObjectType => {
                ObjectType::new(node_id, browse_name, display_name, false).into()
            }
            NodeClass::VariableType => {
                VariableType::new(node_id, browse_name, display_name, false).into()
            }
            NodeClass::ReferenceType => {
                ReferenceType::new(node_id, browse_name, display_name, false, false).into()
            }
            NodeClass::DataType => DataType::new(node_id, browse_name, display_name, false).into(),
            NodeClass::View => View::new(
                node_id,
                browse_name,
                display_name,
                Default::default(),
                true,
            )
            .into(),
            NodeClass::Unspecified => return None,
        })
    }

    /// Find a node.
    pub fn find_node(&self, node_id: &NodeId) -> Option<&NodeType> {
        self.switch.get(node_id)
    }

    /// Find a node mutably.
    pub fn find_node_mut(&mut self, node_id: &NodeId) -> Option<&mut NodeType> {
        self.switch.get_mut(node_id)
    }

    /// `true` if the node exists.
    pub fn node_exists(&self, node_id: &NodeId) -> bool {
        self.switch.contains(node_id)
    }

    /// Visit every node in the address space.
    pub fn iterate(&self, visitor: &mut dyn FnMut(&NodeType)) {
        self.switch.iterate(visitor)
    }

    /// Insert a reference between two nodes; both directions become
    /// browsable.
    pub fn insert_reference(
        &mut self,
        source_node: &NodeId,
        target_node: &NodeId,
        reference_type: impl Into<NodeId>,
    ) {
        self.references
            .insert_reference(source_node, target_node, reference_type)
    }

    /// Delete a reference, both directions.
    pub fn delete_reference(
        &mut self,
        source_node: &NodeId,
        target_node: &NodeId,
        reference_type: impl Into<NodeId>,
    ) -> bool {
        self.references
            .delete_reference(source_node, target_node, reference_type)
    }

    /// Test if a reference exists.
    pub fn has_reference(
        &self,
        source_node: &NodeId,
        target_node: &NodeId,
        reference_type: impl Into<NodeId>,
    ) -> bool {
        self.references
            .has_reference(source_node, target_node, reference_type)
    }

    /// Find references from a node matching the filter.
    pub fn find_references<'a: 'b, 'b>(
        &'a self,
        source_node: &'b NodeId,
        filter: Option<(impl Into<NodeId>, bool)>,
        direction: BrowseDirection,
    ) -> impl Iterator<Item = ReferenceRef<'a>> + 'b {
        self.references
            .find_references(source_node, filter, &self.type_tree, direction)
    }

    /// Find the type definition of an instance node.
    pub fn type_definition_of(&self, node_id: &NodeId) -> Option<NodeId> {
        self.find_references(
            node_id,
            Some((ReferenceTypeId::HasTypeDefinition, false)),
            BrowseDirection::Forward,
        )
        .next()
        .map(|r| r.target_node.clone())
    }

    /// Find a child of the node with the given browse name, following
    /// hierarchical references.
    pub fn find_child_by_browse_name(
        &self,
        source_node: &NodeId,
        browse_name: &QualifiedName,
    ) -> Option<&NodeType> {
        for rf in self.find_references(
            source_node,
            Some((ReferenceTypeId::HierarchicalReferences, true)),
            BrowseDirection::Forward,
        ) {
            if let Some(node) = self.find_node(rf.target_node) {
                if node.as_node().browse_name() == browse_name {
                    return Some(node);
                }
            }
        }
        None
    }

    /// Whether the node has at least one incoming hierarchical reference.
    pub fn has_hierarchical_parent(&self, node_id: &NodeId) -> bool {
        self.find_references(
            node_id,
            Some((ReferenceTypeId::HierarchicalReferences, true)),
            BrowseDirection::Inverse,
        )
        .next()
        .is_some()
    }

    /// Delete a node: run destructors on the node and then on the children
    /// that lose their last hierarchical parent, remove all references of
    /// every deleted node, and free them.
    pub fn delete_node(
        &mut self,
        node_id: &NodeId,
        delete_target_references: bool,
    ) -> Result<(), StatusCode> {
        if !self.node_exists(node_id) {
            return Err(StatusCode::BadNodeIdUnknown);
        }

        // Collect this node plus the children that will become unreachable,
        // parent before children so destruction order is right.
        let mut doomed = Vec::new();
        self.collect_cascade(node_id, &mut doomed);

        for id in &doomed {
            self.run_destructors(id);
        }

        for id in &doomed {
            self.references
                .delete_node_references(id, delete_target_references);
            if self.switch.remove(id).is_none() {
                warn!("Node {id} vanished during delete");
            }
            self.type_tree.remove_type_node(id);
        }
        Ok(())
    }

    // Collect the node and, transitively, every hierarchical child that has
    // no other hierarchical parent. The node comes before its children.
    fn collect_cascade(&self, node_id: &NodeId, doomed: &mut Vec<NodeId>) {
        if doomed.contains(node_id) {
            return;
        }
        doomed.push(node_id.clone());
        let children: Vec<NodeId> = self
            .find_references(
                node_id,
                Some((ReferenceTypeId::HierarchicalReferences, true)),
                BrowseDirection::Forward,
            )
            .map(|r| r.target_node.clone())
            .collect();
        for child in children {
            // Does the child have another hierarchical parent outside the
            // doomed set?
            let keeps_parent = self
                .find_references(
                    &child,
                    Some((ReferenceTypeId::HierarchicalReferences, true)),
                    BrowseDirection::Inverse,
                )
                .any(|r| !doomed.contains(r.target_node));
            if !keeps_parent {
                self.collect_cascade(&child, doomed);
            }
        }
    }

    pub(crate) fn run_constructors(&mut self, node_id: &NodeId) -> Result<(), StatusCode> {
        let type_definition = self.type_definition_of(node_id);
        let Some(node) = self.switch.get_mut(node_id) else {
            return Err(StatusCode::BadNodeIdUnknown);
        };
        if node.as_node().constructed() {
            return Ok(());
        }
        if let Some(constructor) = self.lifecycle.constructor.as_mut() {
            constructor(node)?;
        }
        if let Some(type_definition) = type_definition {
            if let Some(constructor) = self.lifecycle.type_constructors.get_mut(&type_definition)
            {
                constructor(node)?;
            }
        }
        node.as_mut_node().set_constructed(true);
        Ok(())
    }

    pub(crate) fn run_destructors(&mut self, node_id: &NodeId) {
        let type_definition = self.type_definition_of(node_id);
        let Some(node) = self.switch.get_mut(node_id) else {
            return;
        };
        if !node.as_node().constructed() {
            return;
        }
        if let Some(type_definition) = type_definition {
            if let Some(destructor) = self.lifecycle.type_destructors.get_mut(&type_definition) {
                destructor(node);
            }
        }
        if let Some(destructor) = self.lifecycle.destructor.as_mut() {
            destructor(node);
        }
        node.as_mut_node().set_constructed(false);
    }
}

fn set_node_id(node: &mut NodeType, new_id: NodeId) {
    node.set_node_id(new_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use uastack_nodes::{Object, Variable};
    use uastack_types::{DataTypeId, ObjectId, ObjectTypeId, ReferenceTypeId, VariableTypeId};

    fn space_with_ns1() -> AddressSpace {
        let mut space = AddressSpace::new();
        utils::load_core_namespace(&mut space);
        space.add_namespace("urn:test");
        space
    }

    // A parent object under the objects folder with one variable component.
    fn insert_parent_and_child(space: &mut AddressSpace, parent: &NodeId, child: &NodeId) {
        let objects: NodeId = ObjectId::ObjectsFolder.into();
        space.insert::<Object, NodeId>(
            Object::new(parent, "parent", "parent", Default::default()),
            None,
        );
        space.insert_reference(&objects, parent, ReferenceTypeId::Organizes);
        space.insert::<Variable, NodeId>(
            Variable::new(child, "child", "child", DataTypeId::Int32, 1i32),
            None,
        );
        space.insert_reference(parent, child, ReferenceTypeId::HasComponent);
    }

    #[test]
    fn cascade_delete_removes_orphaned_children() {
        let mut space = space_with_ns1();
        let parent = NodeId::new(1, "parent");
        let child = NodeId::new(1, "child");
        insert_parent_and_child(&mut space, &parent, &child);

        space.delete_node(&parent, true).unwrap();
        assert!(!space.node_exists(&parent));
        assert!(!space.node_exists(&child));
        // Objects folder no longer references the parent
        assert!(!space.has_reference(
            &ObjectId::ObjectsFolder.into(),
            &parent,
            ReferenceTypeId::Organizes
        ));
    }

    #[test]
    fn destructors_run_parent_first() {
        use std::sync::{Arc, Mutex};
        let mut space = space_with_ns1();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o = order.clone();
        space.lifecycle.destructor = Some(Box::new(move |node| {
            o.lock().unwrap().push(node.node_id().clone());
        }));

        let parent = NodeId::new(1, "parent");
        let child = NodeId::new(1, "child");
        insert_parent_and_child(&mut space, &parent, &child);
        // Mark both as constructed so the destructors fire
        space.run_constructors(&parent).unwrap();
        space.run_constructors(&child).unwrap();

        space.delete_node(&parent, true).unwrap();
        let order = order.lock().unwrap();
        assert_eq!(order.as_slice(), &[parent, child]);
    }

    #[test]
    fn delete_namespace_rewrites_indices() {
        let mut space = space_with_ns1();
        let ns2 = space.add_namespace("urn:test2");
        assert_eq!(ns2, 2);

        let node_ns2 = NodeId::new(2, "thing");
        let objects: NodeId = ObjectId::ObjectsFolder.into();
        space.insert::<Object, NodeId>(
            Object::new(&node_ns2, "thing", "thing", Default::default()),
            None,
        );
        space.insert_reference(&objects, &node_ns2, ReferenceTypeId::Organizes);

        space.delete_namespace("urn:test").unwrap();
        // The ns2 node is now in namespace 1
        let moved = NodeId::new(1, "thing");
        assert!(space.node_exists(&moved));
        assert!(!space.node_exists(&node_ns2));
        assert!(space.has_reference(
            &ObjectId::ObjectsFolder.into(),
            &moved,
            ReferenceTypeId::Organizes
        ));
        assert_eq!(space.namespace_array().len(), 2);
    }

    #[test]
    fn insert_rejects_duplicate_id() {
        let mut space = space_with_ns1();
        let id = NodeId::new(1, "dup");
        assert!(space.insert::<Object, NodeId>(
            Object::new(&id, "a", "a", Default::default()),
            None
        ));
        assert!(!space.insert::<Object, NodeId>(
            Object::new(&id, "b", "b", Default::default()),
            None
        ));
    }

    #[test]
    fn core_namespace_has_server_nodes() {
        let mut space = AddressSpace::new();
        utils::load_core_namespace(&mut space);
        assert!(space.node_exists(&ObjectId::ObjectsFolder.into()));
        assert!(space.node_exists(&uastack_types::VariableId::Server_ServerStatus_CurrentTime.into()));
        assert!(space
            .type_tree()
            .is_subtype_of(
                &VariableTypeId::BaseDataVariableType.into(),
                &VariableTypeId::BaseVariableType.into()
            ));
        assert!(space.type_tree().is_subtype_of(
            &ObjectTypeId::FolderType.into(),
            &ObjectTypeId::BaseObjectType.into()
        ));
    }
}
