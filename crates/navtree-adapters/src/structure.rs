//! Raw child storage for a node
//!
//! A StructureProvider owns the unsorted child list of one node. The tree keeps
//! its own ordered view in sync with it; adapters may supply custom providers
//! (for example one that refuses certain children).

use navtree_core::NodeId;

pub trait StructureProvider: Send {
    /// Append a child. Returns false if the provider refuses it.
    fn add_node(&mut self, node: NodeId) -> bool;

    /// Remove a child. Returns false if it was not present.
    fn remove_node(&mut self, node: NodeId) -> bool;

    /// Children in provider order.
    fn nodes(&self) -> &[NodeId];

    fn contains(&self, node: NodeId) -> bool { self.nodes().contains(&node) }

    fn len(&self) -> usize { self.nodes().len() }

    fn is_empty(&self) -> bool { self.nodes().is_empty() }
}

/// Default provider: ordered list, duplicates rejected.
#[derive(Debug, Default, Clone)]
pub struct ListStructureProvider {
    nodes: Vec<NodeId>,
}

impl ListStructureProvider {
    pub fn new() -> Self { Self::default() }
}

impl StructureProvider for ListStructureProvider {
    fn add_node(&mut self, node: NodeId) -> bool {
        if self.nodes.contains(&node) {
            return false;
        }
        self.nodes.push(node);
        true
    }

    fn remove_node(&mut self, node: NodeId) -> bool {
        match self.nodes.iter().position(|n| *n == node) {
            Some(idx) => {
                self.nodes.remove(idx);
                true
            }
            None => false,
        }
    }

    fn nodes(&self) -> &[NodeId] { &self.nodes }
}
