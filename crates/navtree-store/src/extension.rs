//! Per-node side-table: cached display values and structure providers
//!
//! Entries are grouped per node and keyed by [`Tag`] within a node. They live
//! outside the node records so that read-only queries can fill the cache
//! through a shared reference.

use navtree_adapters::{Icon, StructureProvider};
use navtree_core::NodeId;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    DisplayText,
    Icon { selected: bool, expanded: bool },
    Tooltip,
    Editable,
    AllowsChildren,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cached {
    Text(Option<String>),
    Icon(Icon),
    Flag(bool),
}

#[derive(Default)]
pub struct SideTable {
    values: HashMap<NodeId, HashMap<Tag, Cached>>,
    providers: HashMap<NodeId, Box<dyn StructureProvider>>,
}

impl SideTable {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, node: NodeId, tag: Tag) -> Option<&Cached> {
        self.values.get(&node).and_then(|tags| tags.get(&tag))
    }

    pub fn insert(&mut self, node: NodeId, tag: Tag, value: Cached) {
        self.values.entry(node).or_default().insert(tag, value);
    }

    pub fn remove(&mut self, node: NodeId, tag: Tag) -> Option<Cached> {
        let tags = self.values.get_mut(&node)?;
        let removed = tags.remove(&tag);
        if tags.is_empty() {
            self.values.remove(&node);
        }
        removed
    }

    pub fn text(&self, node: NodeId, tag: Tag) -> Option<Option<String>> {
        match self.get(node, tag) {
            Some(Cached::Text(t)) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn flag(&self, node: NodeId, tag: Tag) -> Option<bool> {
        match self.get(node, tag) {
            Some(Cached::Flag(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn icon(&self, node: NodeId, tag: Tag) -> Option<Icon> {
        match self.get(node, tag) {
            Some(Cached::Icon(i)) => Some(i.clone()),
            _ => None,
        }
    }

    /// Drop every cached value of `node`. The structure provider stays.
    pub fn invalidate(&mut self, node: NodeId) {
        self.values.remove(&node);
    }

    /// Drop everything held for `node`, provider included.
    pub fn forget(&mut self, node: NodeId) {
        self.invalidate(node);
        self.providers.remove(&node);
    }

    pub fn has_provider(&self, node: NodeId) -> bool { self.providers.contains_key(&node) }

    pub fn set_provider(&mut self, node: NodeId, provider: Box<dyn StructureProvider>) {
        self.providers.insert(node, provider);
    }

    pub fn provider(&self, node: NodeId) -> Option<&dyn StructureProvider> {
        self.providers.get(&node).map(|p| p.as_ref())
    }

    pub fn provider_mut(&mut self, node: NodeId) -> Option<&mut (dyn StructureProvider + 'static)> {
        self.providers.get_mut(&node).map(|p| p.as_mut())
    }

    pub fn cached_values(&self) -> usize { self.values.values().map(HashMap::len).sum() }

    /// Nodes with at least one cached value.
    pub fn cached_nodes(&self) -> usize { self.values.len() }
}
