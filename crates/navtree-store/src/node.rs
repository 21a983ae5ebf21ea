//! Node records stored in a tree's arena

use navtree_core::{NodeEvent, NodeId, NodeType, Payload};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Where a node stands in its one-time child discovery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PopulationState {
    Unchecked,
    Checking,
    Checked,
}

/// External observer of node events.
///
/// Events fired on a node reach its own listeners and then every ancestor's,
/// up to the root.
pub trait NodeListener: Send + Sync {
    fn node_changed(&self, event: &NodeEvent);
}

pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) node_type: NodeType,
    pub(crate) payload: Option<Payload>,
    pub(crate) parent: Option<NodeId>,
    /// Sorted view of the structure provider's content.
    pub(crate) children: Vec<NodeId>,
    pub(crate) population: PopulationState,
    pub(crate) sorting: String,
    pub(crate) sorting_recursive: bool,
    pub(crate) listeners: Vec<Arc<dyn NodeListener>>,
    pub(crate) values: HashMap<String, Value>,
    pub(crate) creation_seq: u64,
}

impl Node {
    pub(crate) fn new(
        id: NodeId,
        name: impl Into<String>,
        node_type: NodeType,
        payload: Option<Payload>,
        parent: Option<NodeId>,
        creation_seq: u64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            node_type,
            payload,
            parent,
            children: Vec::new(),
            population: PopulationState::Unchecked,
            sorting: crate::sort::DEFAULT_ORDER.to_string(),
            sorting_recursive: false,
            listeners: Vec::new(),
            values: HashMap::new(),
            creation_seq,
        }
    }

    pub fn id(&self) -> NodeId { self.id }

    pub fn name(&self) -> &str { &self.name }

    pub fn node_type(&self) -> &NodeType { &self.node_type }

    pub fn payload(&self) -> Option<&Payload> { self.payload.as_ref() }

    pub fn parent(&self) -> Option<NodeId> { self.parent }

    /// Children known so far, in display order. Never triggers discovery.
    pub fn children(&self) -> &[NodeId] { &self.children }

    pub fn population(&self) -> PopulationState { self.population }

    pub fn sorting(&self) -> (&str, bool) { (&self.sorting, self.sorting_recursive) }

    pub fn creation_seq(&self) -> u64 { self.creation_seq }

    pub fn value(&self, key: &str) -> Option<&Value> { self.values.get(key) }

    pub(crate) fn child_position(&self, child: NodeId) -> Option<usize> {
        self.children.iter().position(|c| *c == child)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("node_type", &self.node_type.name())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("population", &self.population)
            .field("sorting", &self.sorting)
            .finish()
    }
}
