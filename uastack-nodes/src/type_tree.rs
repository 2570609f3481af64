// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The type tree tracks subtype relations between type nodes, and assigns
//! each reference type a small index so sets of reference types can be
//! represented as a fixed-width bitmask.

use hashbrown::HashMap;
use uastack_types::{NodeClass, NodeId, ReferenceTypeId};

/// A set of reference types, as a bitmask over the indices assigned by the
/// type tree. Union and membership tests are O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReferenceTypeSet {
    bits: u128,
}

impl ReferenceTypeSet {
    /// The empty set.
    pub const fn empty() -> ReferenceTypeSet {
        ReferenceTypeSet { bits: 0 }
    }

    /// A set holding a single reference type index.
    pub const fn of(index: u8) -> ReferenceTypeSet {
        ReferenceTypeSet {
            bits: 1u128 << (index as u32),
        }
    }

    /// Insert an index into the set.
    pub fn insert(&mut self, index: u8) {
        self.bits |= 1u128 << (index as u32);
    }

    /// Test if the set contains the given index.
    pub const fn contains(&self, index: u8) -> bool {
        self.bits & (1u128 << (index as u32)) != 0
    }

    /// The union of two sets.
    pub const fn union(&self, other: &ReferenceTypeSet) -> ReferenceTypeSet {
        ReferenceTypeSet {
            bits: self.bits | other.bits,
        }
    }

    /// Test if the sets share any member.
    pub const fn intersects(&self, other: &ReferenceTypeSet) -> bool {
        self.bits & other.bits != 0
    }

    /// Test if the set is empty.
    pub const fn is_empty(&self) -> bool {
        self.bits == 0
    }
}

/// One node in the type tree.
#[derive(Debug, Clone)]
pub struct TypeTreeNode {
    /// The super type, `None` only for the root types.
    pub parent: Option<NodeId>,
    /// The node class of the type node.
    pub node_class: NodeClass,
}

/// Trait for resolving subtype relations, implemented by [`DefaultTypeTree`].
pub trait TypeTree {
    /// Whether `child` equals `ancestor` or is a transitive subtype of it.
    fn is_subtype_of(&self, child: &NodeId, ancestor: &NodeId) -> bool;

    /// The node class of a type node, if it is known.
    fn get_node_class(&self, node: &NodeId) -> Option<NodeClass>;
}

/// Type tree over the type nodes of a server: data types, object types,
/// variable types and reference types, with reference type indexing.
#[derive(Debug, Default)]
pub struct DefaultTypeTree {
    nodes: HashMap<NodeId, TypeTreeNode>,
    /// Index per known reference type, in registration order.
    reference_type_indices: HashMap<NodeId, u8>,
    /// For each reference type, the set of it and all of its subtypes.
    subtype_sets: HashMap<NodeId, ReferenceTypeSet>,
    next_reference_index: u8,
}

impl TypeTree for DefaultTypeTree {
    fn is_subtype_of(&self, child: &NodeId, ancestor: &NodeId) -> bool {
        let mut current = child;
        loop {
            if current == ancestor {
                return true;
            }
            match self.nodes.get(current).and_then(|n| n.parent.as_ref()) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn get_node_class(&self, node: &NodeId) -> Option<NodeClass> {
        self.nodes.get(node).map(|n| n.node_class)
    }
}

impl DefaultTypeTree {
    /// Create a type tree seeded with the base reference type hierarchy
    /// every server needs for browsing and validation.
    pub fn new() -> DefaultTypeTree {
        let mut tree = DefaultTypeTree {
            nodes: HashMap::new(),
            reference_type_indices: HashMap::new(),
            subtype_sets: HashMap::new(),
            next_reference_index: 0,
        };
        // The standard reference type hierarchy of part 3, References at
        // the root.
        let r = |tree: &mut DefaultTypeTree, ty: ReferenceTypeId, parent: Option<ReferenceTypeId>| {
            tree.add_type_node(
                &ty.into(),
                parent.map(|p| p.into()).as_ref(),
                NodeClass::ReferenceType,
            );
        };
        r(&mut tree, ReferenceTypeId::References, None);
        r(
            &mut tree,
            ReferenceTypeId::HierarchicalReferences,
            Some(ReferenceTypeId::References),
        );
        r(
            &mut tree,
            ReferenceTypeId::NonHierarchicalReferences,
            Some(ReferenceTypeId::References),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasChild,
            Some(ReferenceTypeId::HierarchicalReferences),
        );
        r(
            &mut tree,
            ReferenceTypeId::Organizes,
            Some(ReferenceTypeId::HierarchicalReferences),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasEventSource,
            Some(ReferenceTypeId::HierarchicalReferences),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasNotifier,
            Some(ReferenceTypeId::HasEventSource),
        );
        r(
            &mut tree,
            ReferenceTypeId::Aggregates,
            Some(ReferenceTypeId::HasChild),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasSubtype,
            Some(ReferenceTypeId::HasChild),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasComponent,
            Some(ReferenceTypeId::Aggregates),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasProperty,
            Some(ReferenceTypeId::Aggregates),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasOrderedComponent,
            Some(ReferenceTypeId::HasComponent),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasModellingRule,
            Some(ReferenceTypeId::NonHierarchicalReferences),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasTypeDefinition,
            Some(ReferenceTypeId::NonHierarchicalReferences),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasEncoding,
            Some(ReferenceTypeId::NonHierarchicalReferences),
        );
        r(
            &mut tree,
            ReferenceTypeId::HasDescription,
            Some(ReferenceTypeId::NonHierarchicalReferences),
        );
        r(
            &mut tree,
            ReferenceTypeId::GeneratesEvent,
            Some(ReferenceTypeId::NonHierarchicalReferences),
        );
        tree
    }

    /// Add a type node with its super type. Reference types are assigned
    /// the next free index and added to the subtype set of every ancestor.
    pub fn add_type_node(&mut self, id: &NodeId, parent: Option<&NodeId>, node_class: NodeClass) {
        self.nodes.insert(
            id.clone(),
            TypeTreeNode {
                parent: parent.cloned(),
                node_class,
            },
        );
        if node_class == NodeClass::ReferenceType {
            let index = self.next_reference_index;
            self.next_reference_index = self.next_reference_index.wrapping_add(1);
            self.reference_type_indices.insert(id.clone(), index);
            self.subtype_sets
                .insert(id.clone(), ReferenceTypeSet::of(index));

            // Add the new index to the set of every ancestor.
            let mut current = parent.cloned();
            while let Some(ancestor) = current {
                if let Some(set) = self.subtype_sets.get_mut(&ancestor) {
                    set.insert(index);
                }
                current = self
                    .nodes
                    .get(&ancestor)
                    .and_then(|n| n.parent.clone());
            }
        }
    }

    /// Remove a type node. Children keep their parent link; removing an
    /// interior type is a caller error and only makes its descendants
    /// unreachable for subtype checks.
    pub fn remove_type_node(&mut self, id: &NodeId) {
        self.nodes.remove(id);
        self.reference_type_indices.remove(id);
        self.subtype_sets.remove(id);
    }

    /// The index assigned to a reference type.
    pub fn reference_type_index(&self, id: &NodeId) -> Option<u8> {
        self.reference_type_indices.get(id).copied()
    }

    /// The set of a reference type and all of its subtypes.
    pub fn subtypes_of(&self, id: &NodeId) -> ReferenceTypeSet {
        self.subtype_sets.get(id).copied().unwrap_or_default()
    }

    /// Whether the given reference type is hierarchical.
    pub fn is_hierarchical(&self, reference_type: &NodeId) -> bool {
        self.is_subtype_of(
            reference_type,
            &ReferenceTypeId::HierarchicalReferences.into(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtype_relations() {
        let tree = DefaultTypeTree::new();
        let has_component: NodeId = ReferenceTypeId::HasComponent.into();
        let aggregates: NodeId = ReferenceTypeId::Aggregates.into();
        let references: NodeId = ReferenceTypeId::References.into();
        let has_type_definition: NodeId = ReferenceTypeId::HasTypeDefinition.into();

        assert!(tree.is_subtype_of(&has_component, &aggregates));
        assert!(tree.is_subtype_of(&has_component, &references));
        assert!(tree.is_subtype_of(&aggregates, &aggregates));
        assert!(!tree.is_subtype_of(&aggregates, &has_component));
        assert!(!tree.is_subtype_of(&has_type_definition, &aggregates));
    }

    #[test]
    fn hierarchical_check() {
        let tree = DefaultTypeTree::new();
        assert!(tree.is_hierarchical(&ReferenceTypeId::Organizes.into()));
        assert!(tree.is_hierarchical(&ReferenceTypeId::HasComponent.into()));
        assert!(!tree.is_hierarchical(&ReferenceTypeId::HasTypeDefinition.into()));
    }

    #[test]
    fn reference_type_sets() {
        let tree = DefaultTypeTree::new();
        let aggregates = tree.subtypes_of(&ReferenceTypeId::Aggregates.into());
        let has_component_idx = tree
            .reference_type_index(&ReferenceTypeId::HasComponent.into())
            .unwrap();
        let organizes_idx = tree
            .reference_type_index(&ReferenceTypeId::Organizes.into())
            .unwrap();
        assert!(aggregates.contains(has_component_idx));
        assert!(!aggregates.contains(organizes_idx));

        let union = aggregates.union(&ReferenceTypeSet::of(organizes_idx));
        assert!(union.contains(organizes_idx));
        assert!(union.intersects(&aggregates));
        assert!(ReferenceTypeSet::empty().is_empty());
    }
}
