//! Tree notifications and node events
//!
//! Producers describe mutations with [`Notification`]s; the tree applies them
//! one at a time on its owner context and answers with [`NodeEvent`]s that
//! cascade from the affected node up to the root.
//!
//! Wire format (one JSON object per notification):
//!
//!   { "kind": "nodeAdded", "path": "/runs/run1", "type": "leaf" }
//!   { "kind": "nodeRenamed", "path": "/runs/run1", "newName": "run9" }
//!   { "kind": "nodeSorted", "path": "/runs", "spec": "Alphabetical", "recursive": false }

use crate::error::{Error, Result};
use crate::types::{NodeId, NodePath, NodeType, Payload, TreeObject, TypeCatalog};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// An immutable request to mutate the tree, or a view-originated event.
#[derive(Clone, Debug)]
pub enum Notification {
    NodeAdded {
        path: NodePath,
        node_type: NodeType,
        payload: Option<Payload>,
    },
    NodeRemoved {
        path: NodePath,
    },
    NodeRenamed {
        path: NodePath,
        new_name: String,
    },
    NodeMoved {
        path: NodePath,
        new_path: NodePath,
    },
    NodeRepainted {
        path: NodePath,
        recursive: bool,
    },
    NodeStructureChanged {
        node: NodeId,
    },
    NodeExpanded {
        path: NodePath,
    },
    NodeSorted {
        path: NodePath,
        spec: String,
        recursive: bool,
    },
    NodeSelectionChanged {
        path: NodePath,
        selected: bool,
    },
}

impl Notification {
    pub fn added(path: NodePath, node_type: NodeType) -> Self {
        Self::NodeAdded {
            path,
            node_type,
            payload: None,
        }
    }

    pub fn added_with_payload(path: NodePath, node_type: NodeType, payload: Payload) -> Self {
        Self::NodeAdded {
            path,
            node_type,
            payload: Some(payload),
        }
    }

    /// Add a node whose type is declared by the object itself.
    pub fn added_object<T: TreeObject>(path: NodePath, object: T) -> Self {
        let node_type = object.node_type();
        Self::added_with_payload(path, node_type, Payload::new(object))
    }

    pub fn removed(path: NodePath) -> Self {
        Self::NodeRemoved { path }
    }

    pub fn renamed(path: NodePath, new_name: impl Into<String>) -> Self {
        Self::NodeRenamed {
            path,
            new_name: new_name.into(),
        }
    }

    pub fn moved(path: NodePath, new_path: NodePath) -> Self {
        Self::NodeMoved { path, new_path }
    }

    pub fn repainted(path: NodePath, recursive: bool) -> Self {
        Self::NodeRepainted { path, recursive }
    }

    pub fn structure_changed(node: NodeId) -> Self {
        Self::NodeStructureChanged { node }
    }

    pub fn expanded(path: NodePath) -> Self {
        Self::NodeExpanded { path }
    }

    pub fn sorted(path: NodePath, spec: impl Into<String>, recursive: bool) -> Self {
        Self::NodeSorted {
            path,
            spec: spec.into(),
            recursive,
        }
    }

    pub fn selection_changed(path: NodePath, selected: bool) -> Self {
        Self::NodeSelectionChanged { path, selected }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::NodeAdded { .. } => NotificationKind::NodeAdded,
            Self::NodeRemoved { .. } => NotificationKind::NodeRemoved,
            Self::NodeRenamed { .. } => NotificationKind::NodeRenamed,
            Self::NodeMoved { .. } => NotificationKind::NodeMoved,
            Self::NodeRepainted { .. } => NotificationKind::NodeRepainted,
            Self::NodeStructureChanged { .. } => NotificationKind::NodeStructureChanged,
            Self::NodeExpanded { .. } => NotificationKind::NodeExpanded,
            Self::NodeSorted { .. } => NotificationKind::NodeSorted,
            Self::NodeSelectionChanged { .. } => NotificationKind::NodeSelectionChanged,
        }
    }

    /// Target path, when the notification addresses a node by path.
    pub fn path(&self) -> Option<&NodePath> {
        match self {
            Self::NodeAdded { path, .. }
            | Self::NodeRemoved { path }
            | Self::NodeRenamed { path, .. }
            | Self::NodeMoved { path, .. }
            | Self::NodeRepainted { path, .. }
            | Self::NodeExpanded { path }
            | Self::NodeSorted { path, .. }
            | Self::NodeSelectionChanged { path, .. } => Some(path),
            Self::NodeStructureChanged { .. } => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    NodeAdded,
    NodeRemoved,
    NodeRenamed,
    NodeMoved,
    NodeRepainted,
    NodeStructureChanged,
    NodeExpanded,
    NodeSorted,
    NodeSelectionChanged,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 9] = [
        Self::NodeAdded,
        Self::NodeRemoved,
        Self::NodeRenamed,
        Self::NodeMoved,
        Self::NodeRepainted,
        Self::NodeStructureChanged,
        Self::NodeExpanded,
        Self::NodeSorted,
        Self::NodeSelectionChanged,
    ];

    /// Wire name, as used in the `kind` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NodeAdded => "nodeAdded",
            Self::NodeRemoved => "nodeRemoved",
            Self::NodeRenamed => "nodeRenamed",
            Self::NodeMoved => "nodeMoved",
            Self::NodeRepainted => "nodeRepainted",
            Self::NodeStructureChanged => "nodeStructureChanged",
            Self::NodeExpanded => "nodeExpanded",
            Self::NodeSorted => "nodeSorted",
            Self::NodeSelectionChanged => "nodeSelectionChanged",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NodeEvent - cascades from a node to the root
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeEventKind {
    Added,
    Removed,
    Changed,
    StructureChanged,
}

/// Change event fired on `source` about `node` (a child of `source` for
/// `Added`/`Removed`, the source itself otherwise).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeEvent {
    pub source: NodeId,
    pub node: NodeId,
    pub kind: NodeEventKind,
}

impl NodeEvent {
    pub fn new(source: NodeId, node: NodeId, kind: NodeEventKind) -> Self {
        Self { source, node, kind }
    }

    pub fn changed(node: NodeId) -> Self {
        Self::new(node, node, NodeEventKind::Changed)
    }

    pub fn structure_changed(node: NodeId) -> Self {
        Self::new(node, node, NodeEventKind::StructureChanged)
    }
}

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

/// Serialized form of a [`Notification`]. Node types travel by name and are
/// resolved against a [`TypeCatalog`]; payloads do not travel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NotificationRecord {
    #[serde(rename_all = "camelCase")]
    NodeAdded {
        path: NodePath,
        #[serde(rename = "type", default = "default_type_name")]
        node_type: String,
    },
    NodeRemoved {
        path: NodePath,
    },
    #[serde(rename_all = "camelCase")]
    NodeRenamed {
        path: NodePath,
        new_name: String,
    },
    #[serde(rename_all = "camelCase")]
    NodeMoved {
        path: NodePath,
        new_path: NodePath,
    },
    NodeRepainted {
        path: NodePath,
        #[serde(default)]
        recursive: bool,
    },
    NodeStructureChanged {
        node: NodeId,
    },
    NodeExpanded {
        path: NodePath,
    },
    NodeSorted {
        path: NodePath,
        spec: String,
        #[serde(default)]
        recursive: bool,
    },
    NodeSelectionChanged {
        path: NodePath,
        #[serde(default = "default_true")]
        selected: bool,
    },
}

fn default_type_name() -> String {
    crate::types::LEAF_TYPE.to_string()
}

fn default_true() -> bool {
    true
}

impl NotificationRecord {
    pub fn into_notification(self, catalog: &TypeCatalog) -> Result<Notification> {
        Ok(match self {
            Self::NodeAdded { path, node_type } => {
                Notification::added(path, catalog.resolve(&node_type)?)
            }
            Self::NodeRemoved { path } => Notification::removed(path),
            Self::NodeRenamed { path, new_name } => Notification::renamed(path, new_name),
            Self::NodeMoved { path, new_path } => Notification::moved(path, new_path),
            Self::NodeRepainted { path, recursive } => Notification::repainted(path, recursive),
            Self::NodeStructureChanged { node } => Notification::structure_changed(node),
            Self::NodeExpanded { path } => Notification::expanded(path),
            Self::NodeSorted {
                path,
                spec,
                recursive,
            } => Notification::sorted(path, spec, recursive),
            Self::NodeSelectionChanged { path, selected } => {
                Notification::selection_changed(path, selected)
            }
        })
    }
}

impl From<&Notification> for NotificationRecord {
    fn from(n: &Notification) -> Self {
        match n.clone() {
            Notification::NodeAdded {
                path, node_type, ..
            } => Self::NodeAdded {
                path,
                node_type: node_type.name().to_string(),
            },
            Notification::NodeRemoved { path } => Self::NodeRemoved { path },
            Notification::NodeRenamed { path, new_name } => Self::NodeRenamed { path, new_name },
            Notification::NodeMoved { path, new_path } => Self::NodeMoved { path, new_path },
            Notification::NodeRepainted { path, recursive } => {
                Self::NodeRepainted { path, recursive }
            }
            Notification::NodeStructureChanged { node } => Self::NodeStructureChanged { node },
            Notification::NodeExpanded { path } => Self::NodeExpanded { path },
            Notification::NodeSorted {
                path,
                spec,
                recursive,
            } => Self::NodeSorted {
                path,
                spec,
                recursive,
            },
            Notification::NodeSelectionChanged { path, selected } => {
                Self::NodeSelectionChanged { path, selected }
            }
        }
    }
}

/// Parse one serialized notification.
///
/// The `kind` is checked before the body so that an unknown kind surfaces as
/// [`Error::UnsupportedNotification`] rather than a generic JSON error.
pub fn parse_notification(json: &str, catalog: &TypeCatalog) -> Result<Notification> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let kind = value
        .get("kind")
        .and_then(|k| k.as_str())
        .ok_or_else(|| Error::UnsupportedNotification("<missing kind>".to_string()))?;
    if NotificationKind::from_wire(kind).is_none() {
        return Err(Error::UnsupportedNotification(kind.to_string()));
    }
    let record: NotificationRecord = serde_json::from_value(value)?;
    record.into_notification(catalog)
}
