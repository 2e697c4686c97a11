//! Graph nodes: one per submap, plus a small number of fixed reference
//! frame nodes that anchor the whole graph to the world frame.

use std::collections::BTreeMap;

use crate::pose::Pose4Dof;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

#[derive(Clone, Copy, Debug)]
pub struct Node {
    pub id: NodeId,
    pub pose: Pose4Dof,
    /// A constant node's pose never enters the solver's parameter vector.
    /// Reference frame nodes are constant by construction; submap nodes
    /// may be pinned constant too (e.g. the very first submap).
    pub constant: bool,
}

/// All graph nodes, kept in a `BTreeMap` so parameter-vector ordering
/// (which nodes get which slice of the solver's state vector) is
/// deterministic across runs.
#[derive(Default)]
pub struct NodeCollection {
    nodes: BTreeMap<NodeId, Node>,
}

impl NodeCollection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_submap_node(&mut self, id: NodeId, initial_pose: Pose4Dof) {
        self.nodes.insert(
            id,
            Node {
                id,
                pose: initial_pose,
                constant: false,
            },
        );
    }

    /// Reference frame nodes anchor the graph; they are always constant.
    pub fn add_reference_frame_node(&mut self, id: NodeId, pose: Pose4Dof) {
        self.nodes.insert(
            id,
            Node {
                id,
                pose,
                constant: true,
            },
        );
    }

    #[must_use]
    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn set_constant(&mut self, id: NodeId, constant: bool) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.constant = constant;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Non-constant node ids, in deterministic (ascending) order — this is
    /// the parameter-vector ordering the solver uses.
    #[must_use]
    pub fn free_ids(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| !n.constant)
            .map(|n| n.id)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_frame_nodes_are_constant_by_default() {
        let mut nodes = NodeCollection::new();
        nodes.add_reference_frame_node(NodeId(0), Pose4Dof::identity());
        assert!(nodes.get(NodeId(0)).unwrap().constant);
        assert!(nodes.free_ids().is_empty());
    }

    #[test]
    fn submap_nodes_start_free() {
        let mut nodes = NodeCollection::new();
        nodes.add_submap_node(NodeId(1), Pose4Dof::identity());
        assert!(!nodes.get(NodeId(1)).unwrap().constant);
        assert_eq!(nodes.free_ids(), vec![NodeId(1)]);
    }

    #[test]
    fn set_constant_excludes_from_free_ids() {
        let mut nodes = NodeCollection::new();
        nodes.add_submap_node(NodeId(1), Pose4Dof::identity());
        nodes.set_constant(NodeId(1), true);
        assert!(nodes.free_ids().is_empty());
    }
}
