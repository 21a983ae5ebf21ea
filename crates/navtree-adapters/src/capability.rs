//! Value types exchanged between the tree and its adapters.

use navtree_core::{NodeId, NodeInfo, NodePath, NodeType, Payload, TreeObject};
use std::any::TypeId;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Icon
// ---------------------------------------------------------------------------

/// A named icon. Rendering is the view's business; the tree only carries keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Icon(Arc<str>);

impl Icon {
    pub fn named(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Placeholder used when no adapter supplies an icon.
    pub fn broken() -> Self {
        Self::named("broken")
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Popup menu and drag payload
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MenuEntry {
    Item { label: String, command: String },
    Separator,
}

/// Logical popup menu; adapters append or rewrite entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PopupMenu {
    pub entries: Vec<MenuEntry>,
}

impl PopupMenu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, label: impl Into<String>, command: impl Into<String>) {
        self.entries.push(MenuEntry::Item {
            label: label.into(),
            command: command.into(),
        });
    }

    pub fn add_separator(&mut self) {
        self.entries.push(MenuEntry::Separator);
    }

    pub fn ends_with_separator(&self) -> bool {
        matches!(self.entries.last(), Some(MenuEntry::Separator))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Labels of the items, separators skipped.
    pub fn labels(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| match e {
                MenuEntry::Item { label, .. } => Some(label.as_str()),
                MenuEntry::Separator => None,
            })
            .collect()
    }
}

pub const NODE_FLAVOR: &str = "application/x-navtree-node";

/// What a drag of the given nodes carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transferable {
    pub nodes: Vec<NodePath>,
    pub flavors: Vec<String>,
}

impl Transferable {
    pub fn new(nodes: Vec<NodePath>) -> Self {
        Self {
            nodes,
            flavors: vec![NODE_FLAVOR.to_string()],
        }
    }

    pub fn add_flavor(&mut self, flavor: impl Into<String>) {
        let flavor = flavor.into();
        if !self.flavors.contains(&flavor) {
            self.flavors.push(flavor);
        }
    }

    pub fn supports(&self, flavor: &str) -> bool {
        self.flavors.iter().any(|f| f == flavor)
    }
}

// ---------------------------------------------------------------------------
// View-originated events
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Secondary,
    Middle,
}

/// A click inside a node's cell; coordinates are relative to the cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MouseEvent {
    pub x: i32,
    pub y: i32,
    pub button: MouseButton,
    pub click_count: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

/// Selection change reported by the view.
#[derive(Clone, Debug)]
pub struct SelectionEvent {
    pub tree: Arc<str>,
    /// The node whose selection state changed.
    pub lead: NodeInfo,
    /// True if `lead` was added to the selection.
    pub added: bool,
    /// Full selection after the change, in selection order.
    pub selection: Vec<NodeId>,
}

/// Rename request travelling through the rename-permission adapters.
#[derive(Clone, Debug)]
pub struct TextChangeEvent {
    pub node: NodeInfo,
    pub old_text: String,
    pub new_text: Option<String>,
    /// True if the displayed text is the node's real name.
    pub showing_name: bool,
    consumed: bool,
}

impl TextChangeEvent {
    pub fn new(
        node: NodeInfo,
        old_text: impl Into<String>,
        new_text: Option<String>,
        showing_name: bool,
    ) -> Self {
        Self {
            node,
            old_text: old_text.into(),
            new_text,
            showing_name,
            consumed: false,
        }
    }

    /// Mark the change as handled; later adapters are not consulted.
    pub fn consume(&mut self) {
        self.consumed = true;
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed
    }
}

// ---------------------------------------------------------------------------
// Pluggable collaborators returned by adapters
// ---------------------------------------------------------------------------

/// Handles commands for the current selection.
pub trait CommandProcessor: Send + Sync {
    fn name(&self) -> &str;

    /// Commands this processor answers to.
    fn commands(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Supplies user objects for nodes of a type.
pub trait ObjectProvider: Send + Sync {
    /// Return an object for `node` whose concrete type is `wanted`, if any.
    fn object_for_node(&self, node: &NodeInfo, wanted: TypeId) -> Option<Payload>;
}

// ---------------------------------------------------------------------------
// Population output
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct ChildSpec {
    pub name: String,
    pub node_type: NodeType,
    pub payload: Option<Payload>,
}

/// Collects the children an adapter discovers while populating a node.
#[derive(Debug, Default)]
pub struct ChildSink {
    children: Vec<ChildSpec>,
}

impl ChildSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, node_type: NodeType) {
        self.children.push(ChildSpec {
            name: name.into(),
            node_type,
            payload: None,
        });
    }

    pub fn add_with_payload(&mut self, name: impl Into<String>, node_type: NodeType, payload: Payload) {
        self.children.push(ChildSpec {
            name: name.into(),
            node_type,
            payload: Some(payload),
        });
    }

    pub fn add_object<T: TreeObject>(&mut self, name: impl Into<String>, object: T) {
        let node_type = object.node_type();
        self.add_with_payload(name, node_type, Payload::new(object));
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChildSpec> {
        self.children.iter()
    }

    pub fn into_children(self) -> Vec<ChildSpec> {
        self.children
    }
}
