//! Selected nodes of a tree, in selection order.

use navtree_core::NodeId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionTracker {
    selected: Vec<NodeId>,
}

impl SelectionTracker {
    pub fn new() -> Self { Self::default() }

    /// Add or remove one node. Returns true if the selection changed.
    pub fn selection_change(&mut self, node: NodeId, selected: bool) -> bool {
        let present = self.contains(node);
        match (selected, present) {
            (true, false) => {
                self.selected.push(node);
                true
            }
            (false, true) => self.remove(node),
            _ => false,
        }
    }

    /// Replace the whole selection. Duplicates keep their first position.
    pub fn set(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.selected.clear();
        for node in nodes {
            if !self.selected.contains(&node) {
                self.selected.push(node);
            }
        }
    }

    pub fn clear(&mut self) { self.selected.clear(); }

    pub fn remove(&mut self, node: NodeId) -> bool {
        let before = self.selected.len();
        self.selected.retain(|n| *n != node);
        before != self.selected.len()
    }

    pub fn contains(&self, node: NodeId) -> bool { self.selected.contains(&node) }

    pub fn nodes(&self) -> &[NodeId] { &self.selected }

    /// Most recently selected node.
    pub fn lead(&self) -> Option<NodeId> { self.selected.last().copied() }

    pub fn len(&self) -> usize { self.selected.len() }

    pub fn is_empty(&self) -> bool { self.selected.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_reports_effect() {
        let mut sel = SelectionTracker::new();
        assert!(sel.selection_change(NodeId::new(1), true));
        assert!(!sel.selection_change(NodeId::new(1), true));
        assert!(sel.selection_change(NodeId::new(2), true));
        assert_eq!(sel.lead(), Some(NodeId::new(2)));
        assert!(sel.selection_change(NodeId::new(1), false));
        assert!(!sel.selection_change(NodeId::new(1), false));
        assert_eq!(sel.nodes(), &[NodeId::new(2)]);
    }

    #[test]
    fn set_dedupes() {
        let mut sel = SelectionTracker::new();
        sel.set([NodeId::new(3), NodeId::new(1), NodeId::new(3)]);
        assert_eq!(sel.nodes(), &[NodeId::new(3), NodeId::new(1)]);
    }
}
