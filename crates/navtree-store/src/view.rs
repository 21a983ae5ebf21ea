//! Contract between a tree and whatever displays it
//!
//! The tree never renders anything. It asks the view about expansion and
//! selection and reports model changes; [`DetachedView`] keeps that state in
//! memory for headless use.

use navtree_core::NodePath;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

pub trait TreeView: Send {
    fn is_expanded(&self, path: &NodePath) -> bool;

    fn is_selected(&self, path: &NodePath) -> bool;

    /// Expand `path` and all of its ancestors.
    fn expand_path(&mut self, path: &NodePath);

    fn set_selection_paths(&mut self, paths: &[NodePath]);

    fn repaint(&mut self) {}

    /// Children were inserted under `parent` at the given display indices.
    fn nodes_inserted(&mut self, _parent: &NodePath, _indices: &[usize]) {}

    fn nodes_removed(&mut self, _parent: &NodePath, _indices: &[usize], _removed: &[NodePath]) {}

    fn node_changed(&mut self, _path: &NodePath) {}

    /// Everything below `path` may have changed.
    fn node_structure_changed(&mut self, _path: &NodePath) {}
}

/// What a [`DetachedView`] was told, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewEvent {
    Repaint,
    Inserted { parent: NodePath, indices: Vec<usize> },
    Removed { parent: NodePath, indices: Vec<usize> },
    Changed(NodePath),
    StructureChanged(NodePath),
    Expanded(NodePath),
    Selection(Vec<NodePath>),
}

pub type ViewLog = Arc<Mutex<Vec<ViewEvent>>>;

/// In-memory view: an expanded set and a selection. The root always counts
/// as expanded.
#[derive(Default)]
pub struct DetachedView {
    expanded: HashSet<NodePath>,
    selection: Vec<NodePath>,
    log: ViewLog,
}

impl DetachedView {
    pub fn new() -> Self { Self::default() }

    /// Shared handle on the event log, readable after the view moved into a tree.
    pub fn log(&self) -> ViewLog { self.log.clone() }

    pub fn selection(&self) -> &[NodePath] { &self.selection }

    pub fn expanded_paths(&self) -> Vec<NodePath> {
        let mut paths: Vec<NodePath> = self.expanded.iter().cloned().collect();
        paths.sort_by_key(|p| p.to_string());
        paths
    }

    pub fn collapse(&mut self, path: &NodePath) {
        self.expanded.retain(|p| !p.starts_with(path));
    }

    fn record(&self, event: ViewEvent) {
        self.log.lock().push(event);
    }
}

impl TreeView for DetachedView {
    fn is_expanded(&self, path: &NodePath) -> bool {
        path.is_root() || self.expanded.contains(path)
    }

    fn is_selected(&self, path: &NodePath) -> bool { self.selection.contains(path) }

    fn expand_path(&mut self, path: &NodePath) {
        let mut current = Some(path.clone());
        while let Some(p) = current {
            if p.is_root() {
                break;
            }
            current = p.parent();
            self.expanded.insert(p);
        }
        self.record(ViewEvent::Expanded(path.clone()));
    }

    fn set_selection_paths(&mut self, paths: &[NodePath]) {
        self.selection = paths.to_vec();
        self.record(ViewEvent::Selection(paths.to_vec()));
    }

    fn repaint(&mut self) {
        self.record(ViewEvent::Repaint);
    }

    fn nodes_inserted(&mut self, parent: &NodePath, indices: &[usize]) {
        self.record(ViewEvent::Inserted {
            parent: parent.clone(),
            indices: indices.to_vec(),
        });
    }

    fn nodes_removed(&mut self, parent: &NodePath, indices: &[usize], removed: &[NodePath]) {
        for path in removed {
            self.expanded.retain(|p| !p.starts_with(path));
            self.selection.retain(|p| !p.starts_with(path));
        }
        self.record(ViewEvent::Removed {
            parent: parent.clone(),
            indices: indices.to_vec(),
        });
    }

    fn node_changed(&mut self, path: &NodePath) {
        self.record(ViewEvent::Changed(path.clone()));
    }

    /// Like a real tree widget, a structure change collapses and deselects
    /// everything below `path`; the tree restores what still exists.
    fn node_structure_changed(&mut self, path: &NodePath) {
        self.expanded.retain(|p| p == path || !p.starts_with(path));
        self.selection.retain(|p| p == path || !p.starts_with(path));
        self.record(ViewEvent::StructureChanged(path.clone()));
    }
}
