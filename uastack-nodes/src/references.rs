// Part of uastack, an OPC UA stack in Rust
// SPDX-License-Identifier: MPL-2.0

//! The reference store.
//!
//! References are kept twice, once under each endpoint, so a node's edges
//! can be walked in either direction without scanning. Inserting an edge
//! records both halves and deleting either removes both, which keeps the
//! store symmetric by construction.

use hashbrown::{HashMap, HashSet};
use log::warn;
use uastack_types::{BrowseDirection, NodeId};

use crate::{ReferenceDirection, TypeTree};

/// A borrowed view of one reference as seen from some node.
#[derive(PartialEq, Eq, Clone, Debug, Hash)]
pub struct ReferenceRef<'a> {
    /// The reference type.
    pub reference_type: &'a NodeId,
    /// The node on the other end.
    pub target_node: &'a NodeId,
    /// Which way the reference points, seen from the queried node.
    pub direction: ReferenceDirection,
}

// The edges adjacent to one node: for each peer, the set of reference types
// connecting them.
type EdgeMap = HashMap<NodeId, HashSet<NodeId>>;

/// All references of an address space.
#[derive(Debug, Default)]
pub struct References {
    /// Forward edges, keyed by source.
    forward: HashMap<NodeId, EdgeMap>,
    /// The mirror image, keyed by target.
    inverse: HashMap<NodeId, EdgeMap>,
}

fn add_edge(table: &mut HashMap<NodeId, EdgeMap>, from: &NodeId, to: &NodeId, ty: &NodeId) {
    table
        .entry(from.clone())
        .or_default()
        .entry(to.clone())
        .or_default()
        .insert(ty.clone());
}

fn remove_edge(table: &mut HashMap<NodeId, EdgeMap>, from: &NodeId, to: &NodeId, ty: &NodeId) -> bool {
    let Some(edges) = table.get_mut(from) else {
        return false;
    };
    let Some(types) = edges.get_mut(to) else {
        return false;
    };
    let removed = types.remove(ty);
    if types.is_empty() {
        edges.remove(to);
    }
    removed
}

impl References {
    /// An empty store.
    pub fn new() -> References {
        References::default()
    }

    /// Record a reference. Both directions become walkable. Self references
    /// are ignored, they cannot be represented meaningfully.
    pub fn insert_reference(
        &mut self,
        source_node: &NodeId,
        target_node: &NodeId,
        reference_type: impl Into<NodeId>,
    ) {
        if source_node == target_node {
            warn!("Ignoring self reference on {source_node}");
            return;
        }
        let ty = reference_type.into();
        add_edge(&mut self.forward, source_node, target_node, &ty);
        add_edge(&mut self.inverse, target_node, source_node, &ty);
    }

    /// Record a batch of references relative to one node.
    pub fn insert<'a, S>(
        &mut self,
        node: &NodeId,
        references: &'a [(&'a NodeId, &S, ReferenceDirection)],
    ) where
        S: Into<NodeId> + Clone,
    {
        for (peer, ty, direction) in references {
            let ty: NodeId = (*ty).clone().into();
            let (source, target) = match direction {
                ReferenceDirection::Forward => (node, *peer),
                ReferenceDirection::Inverse => (*peer, node),
            };
            self.insert_reference(source, target, ty);
        }
    }

    /// Record a batch of (source, target, type) references.
    pub fn insert_references<'a>(
        &mut self,
        references: impl Iterator<Item = (&'a NodeId, &'a NodeId, impl Into<NodeId>)>,
    ) {
        for (source, target, ty) in references {
            self.insert_reference(source, target, ty);
        }
    }

    /// Remove a reference, both halves. Returns whether anything existed.
    pub fn delete_reference(
        &mut self,
        source_node: &NodeId,
        target_node: &NodeId,
        reference_type: impl Into<NodeId>,
    ) -> bool {
        let ty = reference_type.into();
        let fwd = remove_edge(&mut self.forward, source_node, target_node, &ty);
        let inv = remove_edge(&mut self.inverse, target_node, source_node, &ty);
        fwd || inv
    }

    /// Remove every reference the node participates in. With
    /// `delete_mirrored` the halves stored under the peers go too;
    /// without it only the node's own tables are cleared.
    pub fn delete_node_references(&mut self, node: &NodeId, delete_mirrored: bool) -> bool {
        let outgoing = self.forward.remove(node);
        let incoming = self.inverse.remove(node);
        let found = outgoing.is_some() || incoming.is_some();
        if !delete_mirrored {
            return found;
        }
        for (target, types) in outgoing.into_iter().flatten() {
            for ty in types {
                remove_edge(&mut self.inverse, &target, node, &ty);
            }
        }
        for (source, types) in incoming.into_iter().flatten() {
            for ty in types {
                remove_edge(&mut self.forward, &source, node, &ty);
            }
        }
        found
    }

    /// Whether the given forward reference exists.
    pub fn has_reference(
        &self,
        source_node: &NodeId,
        target_node: &NodeId,
        reference_type: impl Into<NodeId>,
    ) -> bool {
        let ty = reference_type.into();
        self.forward
            .get(source_node)
            .and_then(|edges| edges.get(target_node))
            .is_some_and(|types| types.contains(&ty))
    }

    /// Every forward reference as (source, type, target), for bulk rewrites
    /// such as namespace compaction.
    pub fn all_forward(&self) -> Vec<(NodeId, NodeId, NodeId)> {
        let mut out = Vec::new();
        for (source, edges) in &self.forward {
            for (target, types) in edges {
                for ty in types {
                    out.push((source.clone(), ty.clone(), target.clone()));
                }
            }
        }
        out
    }

    /// Walk the references of a node in the given direction, optionally
    /// restricted to a reference type, with or without its subtypes.
    pub fn find_references<'a: 'b, 'b>(
        &'a self,
        node: &'b NodeId,
        filter: Option<(impl Into<NodeId>, bool)>,
        type_tree: &'b dyn TypeTree,
        direction: BrowseDirection,
    ) -> impl Iterator<Item = ReferenceRef<'a>> + 'b {
        let filter: Option<(NodeId, bool)> = filter.map(|(ty, subtypes)| (ty.into(), subtypes));

        let side = |table: &'a HashMap<NodeId, EdgeMap>,
                    wanted: bool,
                    direction: ReferenceDirection| {
            wanted
                .then(|| table.get(node))
                .flatten()
                .into_iter()
                .flat_map(move |edges| {
                    edges.iter().flat_map(move |(peer, types)| {
                        types.iter().map(move |ty| ReferenceRef {
                            reference_type: ty,
                            target_node: peer,
                            direction,
                        })
                    })
                })
        };

        let want_fwd = matches!(direction, BrowseDirection::Forward | BrowseDirection::Both);
        let want_inv = matches!(direction, BrowseDirection::Inverse | BrowseDirection::Both);
        side(&self.forward, want_fwd, ReferenceDirection::Forward)
            .chain(side(&self.inverse, want_inv, ReferenceDirection::Inverse))
            .filter(move |r| match &filter {
                None => true,
                Some((ty, true)) => type_tree.is_subtype_of(r.reference_type, ty),
                Some((ty, false)) => r.reference_type == ty,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DefaultTypeTree;
    use uastack_types::ReferenceTypeId;

    fn count(
        refs: &References,
        node: &NodeId,
        tree: &DefaultTypeTree,
        direction: BrowseDirection,
    ) -> usize {
        refs.find_references(node, Option::<(NodeId, bool)>::None, tree, direction)
            .count()
    }

    #[test]
    fn both_directions_visible_and_symmetric_delete() {
        let tree = DefaultTypeTree::new();
        let mut refs = References::new();
        let tank = NodeId::new(2, "tank");
        let level = NodeId::new(2, "tank.level");
        refs.insert_reference(&tank, &level, ReferenceTypeId::HasComponent);

        assert!(refs.has_reference(&tank, &level, ReferenceTypeId::HasComponent));
        assert_eq!(count(&refs, &tank, &tree, BrowseDirection::Forward), 1);
        assert_eq!(count(&refs, &level, &tree, BrowseDirection::Inverse), 1);

        // Removing the edge clears both halves
        assert!(refs.delete_reference(&tank, &level, ReferenceTypeId::HasComponent));
        assert_eq!(count(&refs, &tank, &tree, BrowseDirection::Both), 0);
        assert_eq!(count(&refs, &level, &tree, BrowseDirection::Both), 0);
        assert!(!refs.delete_reference(&tank, &level, ReferenceTypeId::HasComponent));
    }

    #[test]
    fn subtype_filters() {
        let tree = DefaultTypeTree::new();
        let mut refs = References::new();
        let a = NodeId::new(2, 1u32);
        let b = NodeId::new(2, 2u32);
        let c = NodeId::new(2, 3u32);
        refs.insert_reference(&a, &b, ReferenceTypeId::HasComponent);
        refs.insert_reference(&a, &c, ReferenceTypeId::HasTypeDefinition);

        // Aggregates with subtypes catches HasComponent but not the
        // non-hierarchical type definition reference
        let hits: Vec<_> = refs
            .find_references(
                &a,
                Some((ReferenceTypeId::Aggregates, true)),
                &tree,
                BrowseDirection::Forward,
            )
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target_node, &b);

        // Exact matching does not follow subtypes
        assert_eq!(
            refs.find_references(
                &a,
                Some((ReferenceTypeId::Aggregates, false)),
                &tree,
                BrowseDirection::Forward,
            )
            .count(),
            0
        );
    }

    #[test]
    fn node_removal_clears_peers() {
        let tree = DefaultTypeTree::new();
        let mut refs = References::new();
        let hub = NodeId::new(2, "hub");
        let up = NodeId::new(2, "up");
        let down = NodeId::new(2, "down");
        refs.insert_reference(&up, &hub, ReferenceTypeId::Organizes);
        refs.insert_reference(&hub, &down, ReferenceTypeId::Organizes);

        assert!(refs.delete_node_references(&hub, true));
        assert_eq!(count(&refs, &up, &tree, BrowseDirection::Both), 0);
        assert_eq!(count(&refs, &down, &tree, BrowseDirection::Both), 0);
    }
}
