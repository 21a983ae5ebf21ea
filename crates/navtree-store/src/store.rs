//! The node store of one tree
//!
//! A [`Tree`] owns its nodes in an arena keyed by [`NodeId`]. All structural
//! mutation goes through notifications, applied one at a time by whoever holds
//! `&mut Tree` (the owner). Other threads and tasks submit through a
//! [`TreeHandle`]; the owner drains the queue synchronously on its next
//! [`Tree::tree_changed`] call, or continuously in [`Tree::run`].

use crate::config::SortingConfig;
use crate::extension::{Cached, SideTable, Tag};
use crate::node::{Node, NodeListener, PopulationState};
use crate::persist::{NodeRecord, TreeState};
use crate::queue::{NotificationQueue, TreeHandle};
use crate::selection::SelectionTracker;
use crate::sort::{SortEngine, SortEntry};
use crate::view::{DetachedView, TreeView};
use navtree_adapters::{
    AdapterProvider, AdapterRegistry, AdapterResolver, ChildSink, CommandProcessor, Icon,
    MouseEvent, NodeAdapter, ObjectProvider, ObjectProviderAdapter, PopupMenu, ResolvedAdapters,
    SelectionEvent, TextChangeEvent, Transferable,
};
use navtree_core::{
    Error, NodeEvent, NodeEventKind, NodeId, NodeInfo, NodePath, NodeType, Notification, Payload,
    Result, OBJECT_TYPE,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct Tree {
    name: Arc<str>,
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    next_seq: u64,
    resolver: AdapterResolver,
    sorter: Arc<SortEngine>,
    view: Box<dyn TreeView>,
    side: Mutex<SideTable>,
    selection: SelectionTracker,
    queue: Arc<NotificationQueue>,
    wake_rx: mpsc::UnboundedReceiver<()>,
}

/// Outcome of [`Tree::request_rename`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenameOutcome {
    /// The node's real name changed.
    Renamed,
    /// An adapter consumed the change; the tree left the name alone.
    HandledByAdapter,
    /// The displayed text is not the real name and no adapter took the change.
    Unhandled,
    Rejected(RenameRejection),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenameRejection {
    InvalidName,
    NameTaken,
    Refused,
}

/// What the view learns back after reporting a selection change.
pub struct SelectionOutcome {
    /// True if an adapter took care of the selection behavior.
    pub handled: bool,
    pub selection: Vec<NodeId>,
    pub status_message: Option<String>,
    pub command_processors: Vec<Arc<dyn CommandProcessor>>,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

pub struct TreeBuilder {
    name: String,
    registry: Option<Arc<AdapterRegistry>>,
    sorter: Option<Arc<SortEngine>>,
    view: Option<Box<dyn TreeView>>,
    sorting: SortingConfig,
}

impl TreeBuilder {
    pub fn registry(mut self, registry: Arc<AdapterRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn sort_engine(mut self, sorter: Arc<SortEngine>) -> Self {
        self.sorter = Some(sorter);
        self
    }

    pub fn view(mut self, view: impl TreeView + 'static) -> Self {
        self.view = Some(Box::new(view));
        self
    }

    /// Sorting of the root node.
    pub fn sorting(mut self, spec: impl Into<String>, recursive: bool) -> Self {
        self.sorting = SortingConfig {
            algorithm: spec.into(),
            recursive,
        };
        self
    }

    pub fn build(self) -> Tree {
        let name: Arc<str> = Arc::from(self.name.as_str());
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(AdapterRegistry::with_builtins()));
        let sorter = self
            .sorter
            .unwrap_or_else(|| Arc::new(SortEngine::with_builtins()));
        let view = self.view.unwrap_or_else(|| Box::new(DetachedView::new()));
        let (queue, wake_rx) = NotificationQueue::new();

        let mut root = Node::new(NodeId::ROOT, self.name, NodeType::folder(), None, None, 0);
        root.population = PopulationState::Checked;
        root.sorting = self.sorting.algorithm;
        root.sorting_recursive = self.sorting.recursive;

        info!(tree = %name, sorting = %root.sorting, "tree created");
        let mut nodes = HashMap::new();
        nodes.insert(NodeId::ROOT, root);
        Tree {
            resolver: AdapterResolver::new(name.clone(), registry),
            name,
            nodes,
            next_id: 1,
            next_seq: 1,
            sorter,
            view,
            side: Mutex::new(SideTable::new()),
            selection: SelectionTracker::new(),
            queue,
            wake_rx,
        }
    }
}

impl Tree {
    /// A tree with the built-in adapters and sorters, detached from any view.
    pub fn new(name: impl Into<String>) -> Self { Self::builder(name).build() }

    pub fn builder(name: impl Into<String>) -> TreeBuilder {
        TreeBuilder {
            name: name.into(),
            registry: None,
            sorter: None,
            view: None,
            sorting: SortingConfig::default(),
        }
    }

    pub fn name(&self) -> &str { &self.name }

    pub fn root(&self) -> NodeId { NodeId::ROOT }

    /// Number of nodes known so far, root included.
    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn handle(&self) -> TreeHandle { TreeHandle::new(self.name.clone(), self.queue.clone()) }

    pub fn registry(&self) -> &Arc<AdapterRegistry> { self.resolver.registry() }

    pub fn sort_engine(&self) -> &Arc<SortEngine> { &self.sorter }

    pub fn view(&self) -> &dyn TreeView { self.view.as_ref() }

    pub fn view_mut(&mut self) -> &mut dyn TreeView { self.view.as_mut() }

    pub fn get(&self, id: NodeId) -> Option<&Node> { self.nodes.get(&id) }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(&id).ok_or(Error::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(Error::UnknownNode(id))
    }

    fn resolved(&self, node_type: &NodeType) -> ResolvedAdapters { self.resolver.resolve(node_type) }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

impl Tree {
    /// Apply `notification` on the owner. Anything queued through a handle is
    /// applied first, in arrival order.
    pub fn tree_changed(&mut self, notification: Notification) -> Result<()> {
        if let Err(e) = self.drain() {
            self.queue.push(notification);
            return Err(e);
        }
        self.apply(notification)
    }

    /// Apply everything queued so far. On failure the notifications behind
    /// the failing one stay queued.
    pub fn drain(&mut self) -> Result<()> {
        loop {
            let mut batch = self.queue.take_all();
            if batch.is_empty() {
                return Ok(());
            }
            while let Some(notification) = batch.pop_front() {
                if let Err(e) = self.apply(notification) {
                    self.queue.requeue_front(batch);
                    return Err(e);
                }
            }
        }
    }

    /// Owner loop: drain whenever a producer signals, until cancelled.
    ///
    /// Environment failures are logged and skipped; a contract violation
    /// stops the loop and is returned.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        info!(tree = %self.name, "tree owner loop started");
        self.drain_logged()?;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                token = self.wake_rx.recv() => match token {
                    Some(()) => self.drain_logged()?,
                    None => break,
                },
            }
        }
        info!(tree = %self.name, pending = self.queue.len(), "tree owner loop stopped");
        Ok(())
    }

    fn drain_logged(&mut self) -> Result<()> {
        loop {
            match self.drain() {
                Ok(()) => return Ok(()),
                Err(e) if e.is_contract_violation() => return Err(e),
                Err(e) => warn!(tree = %self.name, error = %e, "notification failed"),
            }
        }
    }

    fn apply(&mut self, notification: Notification) -> Result<()> {
        debug!(
            tree = %self.name,
            kind = %notification.kind(),
            path = notification.path().map(|p| p.to_string()).unwrap_or_default(),
            "applying notification"
        );
        match notification {
            Notification::NodeAdded {
                path,
                node_type,
                payload,
            } => self.on_added(&path, node_type, payload),
            Notification::NodeRemoved { path } => self.on_removed(&path),
            Notification::NodeRenamed { path, new_name } => self.on_renamed(&path, &new_name),
            Notification::NodeMoved { path, new_path } => self.on_moved(&path, &new_path),
            Notification::NodeRepainted { path, recursive } => self.on_repainted(&path, recursive),
            Notification::NodeStructureChanged { node } => self.on_structure_changed(node),
            Notification::NodeExpanded { path } => self.on_expanded(&path),
            Notification::NodeSorted {
                path,
                spec,
                recursive,
            } => self.on_sorted(&path, &spec, recursive),
            Notification::NodeSelectionChanged { path, selected } => {
                self.on_selection_changed(&path, selected)
            }
        }
    }

    fn resolve_path(&self, path: &NodePath) -> Result<NodeId> {
        self.find_node(path)
            .ok_or_else(|| Error::NodeNotFound(path.clone()))
    }

    fn on_added(&mut self, path: &NodePath, node_type: NodeType, payload: Option<Payload>) -> Result<()> {
        let Some(name) = path.last() else {
            return Err(Error::RootImmutable("added"));
        };
        let segments = path.segments();
        let ancestors = &segments[..segments.len() - 1];

        let mut parent = NodeId::ROOT;
        let mut missing: &[String] = &[];
        for (depth, segment) in ancestors.iter().enumerate() {
            self.ensure_populated(parent)?;
            match self.child_by_name(parent, segment) {
                Some(child) => parent = child,
                None => {
                    missing = &ancestors[depth..];
                    break;
                }
            }
        }
        if missing.is_empty() {
            self.ensure_populated(parent)?;
            if self.child_by_name(parent, name).is_some() {
                return Err(Error::NodeExists(path.clone()));
            }
        }

        let parent_path = self.path(parent)?;
        if !self.allows_children(parent) {
            return Err(Error::ChildrenNotAllowed(parent_path));
        }
        if let Some(first) = missing.first() {
            if !self.folder_allows_children(&parent_path, first) {
                return Err(Error::ChildrenNotAllowed(parent_path.child(first.as_str())));
            }
        }

        // (parent, parent path, child, index), reported once the whole chain is in.
        let mut created: Vec<(NodeId, NodePath, NodeId, usize)> = Vec::with_capacity(missing.len() + 1);
        let mut current = parent;
        let mut current_path = parent_path;
        let steps = missing
            .iter()
            .map(|s| (s.clone(), NodeType::folder(), None))
            .chain(std::iter::once((name.to_string(), node_type, payload)));
        for (segment, segment_type, segment_payload) in steps {
            match self.insert_child(current, segment.clone(), segment_type, segment_payload) {
                Ok((child, index)) => {
                    let child_path = current_path.child(segment);
                    created.push((current, std::mem::replace(&mut current_path, child_path), child, index));
                    current = child;
                }
                Err(e) => {
                    for (_, _, id, _) in created.into_iter().rev() {
                        self.discard(id);
                    }
                    return Err(e);
                }
            }
        }
        for (parent, parent_path, child, index) in created {
            self.view.nodes_inserted(&parent_path, &[index]);
            self.fire(NodeEvent::new(parent, child, NodeEventKind::Added));
        }
        self.view.repaint();
        Ok(())
    }

    fn on_removed(&mut self, path: &NodePath) -> Result<()> {
        if path.is_root() {
            return Err(Error::RootImmutable("removed"));
        }
        let id = self.resolve_path(path)?;
        let parent = self.node(id)?.parent.ok_or(Error::RootImmutable("removed"))?;

        let subtree = self.subtree_postorder(id);
        for node in &subtree {
            let info = self.info(*node)?;
            self.resolved(&info.node_type).node_being_deleted(&info)?;
        }

        let index = self.detach_child(parent, id)?;
        let parent_path = self.path(parent)?;
        self.view
            .nodes_removed(&parent_path, &[index], std::slice::from_ref(path));
        self.fire(NodeEvent::new(parent, id, NodeEventKind::Removed));

        let side = self.side.get_mut();
        for node in subtree {
            self.nodes.remove(&node);
            side.forget(node);
            self.selection.remove(node);
        }
        debug!(tree = %self.name, path = %path, "node removed");
        Ok(())
    }

    fn on_renamed(&mut self, path: &NodePath, new_name: &str) -> Result<()> {
        if path.is_root() {
            return Err(Error::RootImmutable("renamed"));
        }
        validate_name(new_name)?;
        let id = self.resolve_path(path)?;
        if self.node(id)?.name == new_name {
            return Ok(());
        }
        let parent = self.node(id)?.parent.ok_or(Error::RootImmutable("renamed"))?;
        if self.child_by_name(parent, new_name).is_some() {
            return Err(Error::NodeExists(path.with_last(new_name)));
        }

        self.node_mut(id)?.name = new_name.to_string();
        self.side.get_mut().remove(id, Tag::DisplayText);
        let new_path = path.with_last(new_name);
        self.view.node_changed(&new_path);
        self.fire(NodeEvent::changed(id));
        Ok(())
    }

    fn on_moved(&mut self, path: &NodePath, new_path: &NodePath) -> Result<()> {
        let (Some(new_parent_path), Some(new_name)) = (new_path.parent(), new_path.last()) else {
            return Err(Error::RootImmutable("moved"));
        };
        if path.is_root() {
            return Err(Error::RootImmutable("moved"));
        }
        validate_name(new_name)?;
        let id = self.resolve_path(path)?;
        let old_parent = self.node(id)?.parent.ok_or(Error::RootImmutable("moved"))?;
        let new_parent = self
            .find_node(&new_parent_path)
            .ok_or_else(|| Error::NodeNotFound(new_parent_path.clone()))?;
        if new_parent == old_parent {
            return self.on_renamed(path, new_name);
        }

        if self.is_in_subtree(new_parent, id) {
            return Err(Error::invalid_move(path, new_path, "target lies inside the moved subtree"));
        }
        if !self.allows_children(new_parent) {
            return Err(Error::ChildrenNotAllowed(new_parent_path));
        }
        self.ensure_populated(new_parent)?;
        if self.child_by_name(new_parent, new_name).is_some() {
            return Err(Error::NodeExists(new_path.clone()));
        }
        self.ensure_provider(new_parent)?;

        let old_parent_path = self.path(old_parent)?;
        let old_index = self.detach_child(old_parent, id)?;
        let old_name = std::mem::replace(&mut self.node_mut(id)?.name, new_name.to_string());
        self.node_mut(id)?.parent = Some(new_parent);

        let new_index = match self.place_child(new_parent, id) {
            Ok(index) => index,
            Err(e) => {
                let node = self.node_mut(id)?;
                node.name = old_name;
                node.parent = Some(old_parent);
                self.place_child(old_parent, id)?;
                return Err(e);
            }
        };
        self.side.get_mut().remove(id, Tag::DisplayText);

        self.view
            .nodes_removed(&old_parent_path, &[old_index], std::slice::from_ref(path));
        self.fire(NodeEvent::new(old_parent, id, NodeEventKind::Removed));
        self.view.nodes_inserted(&new_parent_path, &[new_index]);
        self.fire(NodeEvent::new(new_parent, id, NodeEventKind::Added));

        self.structure_changed_pass(old_parent)?;
        self.structure_changed_pass(new_parent)?;
        Ok(())
    }

    fn on_repainted(&mut self, path: &NodePath, recursive: bool) -> Result<()> {
        let id = self.resolve_path(path)?;
        self.update_node(id, recursive)?;
        if recursive {
            self.fire(NodeEvent::structure_changed(id));
        } else {
            self.fire(NodeEvent::changed(id));
        }
        Ok(())
    }

    fn on_structure_changed(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        self.structure_changed_pass(id)?;
        self.fire(NodeEvent::structure_changed(id));
        Ok(())
    }

    fn on_expanded(&mut self, path: &NodePath) -> Result<()> {
        let id = self.resolve_path(path)?;
        self.ensure_populated(id)?;
        self.view.expand_path(path);
        self.fire(NodeEvent::structure_changed(id));
        Ok(())
    }

    fn on_sorted(&mut self, path: &NodePath, spec: &str, recursive: bool) -> Result<()> {
        let id = self.resolve_path(path)?;
        self.apply_sorting(id, spec, recursive)?;
        self.fire(NodeEvent::structure_changed(id));
        Ok(())
    }

    fn on_selection_changed(&mut self, path: &NodePath, selected: bool) -> Result<()> {
        let id = self.resolve_path(path)?;
        self.selection.selection_change(id, selected);
        self.sync_view_selection();
        Ok(())
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') {
        return Err(Error::InvalidPath(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

impl Tree {
    /// Walk from the root through already known children. Never populates.
    pub fn find_node(&self, path: &NodePath) -> Option<NodeId> {
        let mut current = NodeId::ROOT;
        for segment in path.segments() {
            current = self.child_by_name(current, segment)?;
        }
        Some(current)
    }

    fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let node = self.nodes.get(&parent)?;
        node.children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).is_some_and(|n| n.name == name))
    }

    /// Like [`Tree::find_node`], populating each node on the way.
    fn find_node_populating(&mut self, path: &NodePath) -> Result<Option<NodeId>> {
        let mut current = NodeId::ROOT;
        for segment in path.segments() {
            self.ensure_populated(current)?;
            match self.child_by_name(current, segment) {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn is_in_subtree(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    /// Every known node below and including `id`, deepest first.
    fn subtree_postorder(&self, id: NodeId) -> Vec<NodeId> {
        fn walk(tree: &Tree, id: NodeId, out: &mut Vec<NodeId>) {
            if let Some(node) = tree.nodes.get(&id) {
                for child in &node.children {
                    walk(tree, *child, out);
                }
            }
            out.push(id);
        }
        let mut out = Vec::new();
        walk(self, id, &mut out);
        out
    }

    /// Resolve and cache the structure provider of `id`.
    fn ensure_provider(&self, id: NodeId) -> Result<()> {
        let present = self.side.lock().has_provider(id);
        if present {
            return Ok(());
        }
        let info = self.info(id)?;
        let provider = self.resolved(&info.node_type).structure_provider(&info)?;
        self.side.lock().set_provider(id, provider);
        Ok(())
    }

    fn provider_order(&self, parent: NodeId) -> Option<Vec<NodeId>> {
        self.side.lock().provider(parent).map(|p| p.nodes().to_vec())
    }

    fn provider_positions(&self, parent: NodeId) -> HashMap<NodeId, usize> {
        self.side
            .lock()
            .provider(parent)
            .map(|p| p.nodes().iter().enumerate().map(|(i, id)| (*id, i)).collect())
            .unwrap_or_default()
    }

    /// Create a node under `parent` and place it. Returns its id and display index.
    fn insert_child(
        &mut self,
        parent: NodeId,
        name: String,
        node_type: NodeType,
        payload: Option<Payload>,
    ) -> Result<(NodeId, usize)> {
        self.ensure_provider(parent)?;
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.nodes
            .insert(id, Node::new(id, name, node_type, payload, Some(parent), seq));

        match self.place_child(parent, id) {
            Ok(index) => Ok((id, index)),
            Err(e) => {
                self.nodes.remove(&id);
                Err(e)
            }
        }
    }

    /// Add an existing node to `parent`'s provider and to its sorted children.
    fn place_child(&mut self, parent: NodeId, child: NodeId) -> Result<usize> {
        self.ensure_provider(parent)?;
        let accepted = self
            .side
            .get_mut()
            .provider_mut(parent)
            .is_some_and(|p| p.add_node(child));
        if !accepted {
            return Err(Error::ProviderRejected {
                parent: self.path(parent)?,
                name: self.node(child)?.name.clone(),
                op: "insertion",
            });
        }

        let (spec, recursive) = {
            let p = self.node(parent)?;
            (p.sorting.clone(), p.sorting_recursive)
        };
        if recursive {
            let node = self.node_mut(child)?;
            node.sorting = spec.clone();
            node.sorting_recursive = true;
        }

        let index = match self.sorter.comparator(&spec) {
            None => self.node(parent)?.children.len(),
            Some(cmp) => {
                let positions = cmp.uses_position().then(|| self.provider_positions(parent));
                let entry = self.sort_entry(child, positions.as_ref())?;
                let siblings = &self.node(parent)?.children;
                siblings.partition_point(|s| {
                    self.sort_entry(*s, positions.as_ref())
                        .map_or(true, |e| cmp.compare(&e, &entry) != Ordering::Greater)
                })
            }
        };
        self.node_mut(parent)?.children.insert(index, child);
        Ok(index)
    }

    /// Remove `child` from `parent`'s provider and children. Returns the
    /// display index it had.
    fn detach_child(&mut self, parent: NodeId, child: NodeId) -> Result<usize> {
        self.ensure_provider(parent)?;
        let removed = self
            .side
            .get_mut()
            .provider_mut(parent)
            .is_some_and(|p| p.remove_node(child));
        if !removed {
            return Err(Error::ProviderRejected {
                parent: self.path(parent)?,
                name: self.node(child)?.name.clone(),
                op: "removal",
            });
        }
        let parent_node = self.node_mut(parent)?;
        let index = parent_node
            .child_position(child)
            .unwrap_or(parent_node.children.len());
        if index < parent_node.children.len() {
            parent_node.children.remove(index);
        }
        Ok(index)
    }

    /// Undo a freshly created node that has no children.
    fn discard(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes.get(&id).and_then(|n| n.parent) {
            if let Some(provider) = self.side.get_mut().provider_mut(parent) {
                provider.remove_node(id);
            }
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.retain(|c| *c != id);
            }
        }
        self.nodes.remove(&id);
        self.side.get_mut().forget(id);
    }

    fn folder_allows_children(&self, under: &NodePath, name: &str) -> bool {
        let probe = NodeInfo {
            id: NodeId::new(self.next_id),
            tree: self.name.clone(),
            name: name.to_string(),
            path: under.child(name),
            node_type: NodeType::folder(),
            payload: None,
        };
        self.resolved(&probe.node_type).allows_children(&probe)
    }
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

impl Tree {
    /// Run the one-time child discovery of `id` if it has not happened yet.
    /// The node ends up checked even when an adapter fails.
    pub fn ensure_populated(&mut self, id: NodeId) -> Result<()> {
        let node = self.node_mut(id)?;
        if node.population != PopulationState::Unchecked {
            return Ok(());
        }
        node.population = PopulationState::Checking;
        let result = self.populate(id);
        if let Some(node) = self.nodes.get_mut(&id) {
            node.population = PopulationState::Checked;
        }
        result
    }

    fn populate(&mut self, id: NodeId) -> Result<()> {
        if !self.allows_children(id) {
            return Ok(());
        }
        if !self.node(id)?.children.is_empty() {
            return self.resort_children(id);
        }

        let info = self.info(id)?;
        let mut sink = ChildSink::new();
        let mut result = self.resolved(&info.node_type).check_for_children(&info, &mut sink);
        debug!(tree = %self.name, path = %info.path, found = sink.len(), "populating node");

        for spec in sink.into_children() {
            if self.child_by_name(id, &spec.name).is_some() {
                warn!(tree = %self.name, parent = %info.path, name = %spec.name, "duplicate child skipped");
                continue;
            }
            match self.insert_child(id, spec.name, spec.node_type, spec.payload) {
                Ok((child, _)) => self.fire(NodeEvent::new(id, child, NodeEventKind::Added)),
                Err(e) => {
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }
        self.resort_children(id)?;
        result
    }

    /// Children of `id` in display order, populating it first.
    pub fn child_nodes(&mut self, id: NodeId) -> Result<Vec<NodeId>> {
        self.ensure_populated(id)?;
        Ok(self.node(id)?.children.clone())
    }

    pub fn child_count(&mut self, id: NodeId) -> Result<usize> {
        self.ensure_populated(id)?;
        Ok(self.node(id)?.children.len())
    }

    /// Children known so far. Never populates.
    pub fn known_children(&self, id: NodeId) -> Result<&[NodeId]> { Ok(&self.node(id)?.children) }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

impl Tree {
    /// Sort `id`'s children by `spec`, optionally its whole subtree.
    /// Unpopulated descendants keep the spec and sort when populated.
    pub fn apply_sorting(&mut self, id: NodeId, spec: &str, recursive: bool) -> Result<()> {
        self.sort_node(id, spec, recursive, true)
    }

    fn sort_node(&mut self, id: NodeId, spec: &str, recursive: bool, finalize: bool) -> Result<()> {
        if !self.allows_children(id) {
            return Ok(());
        }
        {
            let node = self.node_mut(id)?;
            node.sorting = spec.to_string();
            node.sorting_recursive = recursive;
        }
        if !self.node(id)?.children.is_empty() {
            self.resort_children(id)?;
        }
        if recursive {
            for child in self.node(id)?.children.clone() {
                self.sort_node(child, spec, recursive, false)?;
            }
        }
        if finalize && self.view.is_expanded(&self.path(id)?) {
            self.structure_changed_pass(id)?;
        }
        Ok(())
    }

    fn resort_children(&mut self, id: NodeId) -> Result<()> {
        let spec = self.node(id)?.sorting.clone();
        let order = match self.provider_order(id) {
            Some(order) => order,
            None => self.node(id)?.children.clone(),
        };
        let children = match self.sorter.comparator(&spec) {
            None => order,
            Some(cmp) => {
                let positions: HashMap<NodeId, usize> =
                    order.iter().enumerate().map(|(i, c)| (*c, i)).collect();
                let mut entries: Vec<SortEntry> = order
                    .iter()
                    .filter_map(|c| self.sort_entry(*c, Some(&positions)).ok())
                    .collect();
                entries.sort_by(|a, b| cmp.compare(a, b));
                entries.into_iter().map(|e| e.id).collect()
            }
        };
        self.node_mut(id)?.children = children;
        Ok(())
    }

    /// What sorters see of `id`. Without `positions` the provider position
    /// is left at `usize::MAX`.
    fn sort_entry(&self, id: NodeId, positions: Option<&HashMap<NodeId, usize>>) -> Result<SortEntry> {
        let node = self.node(id)?;
        Ok(SortEntry {
            id,
            name: node.name.clone(),
            allows_children: self.allows_children(id),
            position: positions
                .and_then(|p| p.get(&id).copied())
                .unwrap_or(usize::MAX),
            creation_seq: node.creation_seq,
        })
    }

    /// Re-apply the current sorting of `id` to its children.
    fn reapply_sorting(&mut self, id: NodeId) -> Result<()> {
        if self.node(id)?.children.is_empty() {
            return Ok(());
        }
        self.resort_children(id)?;
        if self.view.is_expanded(&self.path(id)?) {
            self.structure_changed_pass(id)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Events and view synchronization
// ---------------------------------------------------------------------------

impl Tree {
    /// Deliver `event` to the listeners of its source and of every ancestor.
    /// A change of a child makes its parent re-apply its sort order.
    fn fire(&mut self, event: NodeEvent) {
        let mut chain = Vec::new();
        let mut current = Some(event.source);
        while let Some(id) = current {
            let Some(node) = self.nodes.get(&id) else { break };
            for listener in &node.listeners {
                listener.node_changed(&event);
            }
            chain.push(id);
            current = node.parent;
        }

        if event.kind == NodeEventKind::Changed {
            let target = self.nodes.get(&event.node).and_then(|n| n.parent);
            if let Some(parent) = target.filter(|p| chain.contains(p)) {
                if let Err(e) = self.reapply_sorting(parent) {
                    warn!(tree = %self.name, error = %e, "resort after change failed");
                }
            }
        }
    }

    fn update_node(&mut self, id: NodeId, recursive: bool) -> Result<()> {
        let path = self.path(id)?;
        self.view.node_changed(&path);
        if self.view.is_expanded(&path) {
            for child in self.node(id)?.children.clone() {
                if recursive {
                    self.update_node(child, true)?;
                } else {
                    let child_path = self.path(child)?;
                    self.view.node_changed(&child_path);
                }
            }
        }
        Ok(())
    }

    /// Tell the view everything below `id` changed, then restore the
    /// expansion of descendants that still exist and the selection.
    fn structure_changed_pass(&mut self, id: NodeId) -> Result<()> {
        let path = self.path(id)?;
        let mut expanded = Vec::new();
        self.collect_expanded(id, &path, &mut expanded)?;

        self.view.node_structure_changed(&path);

        for relative in expanded {
            let mut current = id;
            let mut current_path = path.clone();
            let mut resolved = true;
            for segment in &relative {
                if let Err(e) = self.ensure_populated(current) {
                    warn!(tree = %self.name, path = %current_path, error = %e, "population failed while restoring expansion");
                }
                match self.child_by_name(current, segment) {
                    Some(child) => {
                        current = child;
                        current_path = current_path.child(segment.as_str());
                    }
                    None => {
                        resolved = false;
                        break;
                    }
                }
            }
            if resolved {
                self.view.expand_path(&current_path);
            }
        }
        self.sync_view_selection();
        Ok(())
    }

    /// Relative segment lists of expanded, populated descendants of `id`.
    fn collect_expanded(&self, id: NodeId, path: &NodePath, out: &mut Vec<Vec<String>>) -> Result<()> {
        let base = path.len();
        let mut stack = vec![(id, path.clone())];
        while let Some((node, node_path)) = stack.pop() {
            for child in &self.node(node)?.children {
                let child_node = self.node(*child)?;
                if child_node.population != PopulationState::Checked && child_node.children.is_empty() {
                    continue;
                }
                let child_path = node_path.child(child_node.name.as_str());
                if self.view.is_expanded(&child_path) {
                    out.push(child_path.segments()[base..].to_vec());
                    stack.push((*child, child_path));
                }
            }
        }
        out.sort_by_key(|segments| segments.len());
        Ok(())
    }

    fn sync_view_selection(&mut self) {
        let paths: Vec<NodePath> = self
            .selection
            .nodes()
            .iter()
            .filter_map(|id| self.path(*id).ok())
            .collect();
        self.view.set_selection_paths(&paths);
    }
}

// ---------------------------------------------------------------------------
// Read surface
// ---------------------------------------------------------------------------

impl Tree {
    pub fn real_name(&self, id: NodeId) -> Result<&str> { Ok(&self.node(id)?.name) }

    pub fn path(&self, id: NodeId) -> Result<NodePath> {
        let mut segments = Vec::new();
        let mut current = self.node(id)?;
        while let Some(parent) = current.parent {
            segments.push(current.name.clone());
            current = self.node(parent)?;
        }
        segments.reverse();
        Ok(NodePath::from_segments(segments))
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> { Ok(self.node(id)?.parent) }

    pub fn node_type(&self, id: NodeId) -> Result<&NodeType> { Ok(&self.node(id)?.node_type) }

    pub fn payload(&self, id: NodeId) -> Result<Option<&Payload>> { Ok(self.node(id)?.payload.as_ref()) }

    pub fn population_state(&self, id: NodeId) -> Result<PopulationState> {
        Ok(self.node(id)?.population)
    }

    pub fn sorting(&self, id: NodeId) -> Result<(&str, bool)> {
        let node = self.node(id)?;
        Ok((&node.sorting, node.sorting_recursive))
    }

    pub fn info(&self, id: NodeId) -> Result<NodeInfo> {
        let node = self.node(id)?;
        Ok(NodeInfo {
            id,
            tree: self.name.clone(),
            name: node.name.clone(),
            path: self.path(id)?,
            node_type: node.node_type.clone(),
            payload: node.payload.clone(),
        })
    }

    pub fn selected(&self) -> &[NodeId] { self.selection.nodes() }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

impl Tree {
    /// Adapter text if any, else the real name. Cached.
    pub fn display_name(&self, id: NodeId) -> Result<String> {
        match self.adapter_text(id)? {
            Some(text) => Ok(text),
            None => Ok(self.node(id)?.name.clone()),
        }
    }

    fn adapter_text(&self, id: NodeId) -> Result<Option<String>> {
        let cached = self.side.lock().text(id, Tag::DisplayText);
        if let Some(text) = cached {
            return Ok(text);
        }
        let info = self.info(id)?;
        let text = self.resolved(&info.node_type).text(&info);
        self.side
            .lock()
            .insert(id, Tag::DisplayText, Cached::Text(text.clone()));
        Ok(text)
    }

    fn showing_name(&self, id: NodeId) -> Result<bool> { Ok(self.adapter_text(id)?.is_none()) }

    pub fn icon(&self, id: NodeId, selected: bool, expanded: bool) -> Result<Icon> {
        let tag = Tag::Icon { selected, expanded };
        let cached = self.side.lock().icon(id, tag);
        if let Some(icon) = cached {
            return Ok(icon);
        }
        let info = self.info(id)?;
        let base_type = if self.allows_children(id) {
            NodeType::folder()
        } else {
            NodeType::leaf()
        };
        let base = self
            .resolved(&base_type)
            .icon(&info, Some(Icon::broken()), selected, expanded);
        let icon = self
            .resolved(&info.node_type)
            .icon(&info, base, selected, expanded)
            .unwrap_or_else(Icon::broken);
        self.side.lock().insert(id, tag, Cached::Icon(icon.clone()));
        Ok(icon)
    }

    pub fn tooltip(&self, id: NodeId) -> Result<Option<String>> {
        let cached = self.side.lock().text(id, Tag::Tooltip);
        if let Some(tooltip) = cached {
            return Ok(tooltip);
        }
        let info = self.info(id)?;
        let tooltip = self.resolved(&info.node_type).tooltip(&info);
        self.side
            .lock()
            .insert(id, Tag::Tooltip, Cached::Text(tooltip.clone()));
        Ok(tooltip)
    }

    pub fn status_message(&self, id: NodeId) -> Result<Option<String>> {
        let info = self.info(id)?;
        Ok(self.resolved(&info.node_type).status_message(&info))
    }

    /// The root and plain `object` nodes always allow children.
    pub fn allows_children(&self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        if id == NodeId::ROOT || node.node_type.name() == OBJECT_TYPE {
            return true;
        }
        let cached = self.side.lock().flag(id, Tag::AllowsChildren);
        if let Some(allows) = cached {
            return allows;
        }
        let Ok(info) = self.info(id) else {
            return false;
        };
        let allows = self.resolved(&info.node_type).allows_children(&info);
        self.side
            .lock()
            .insert(id, Tag::AllowsChildren, Cached::Flag(allows));
        allows
    }

    pub fn is_editable(&self, id: NodeId) -> Result<bool> {
        if id == NodeId::ROOT {
            return Ok(false);
        }
        let cached = self.side.lock().flag(id, Tag::Editable);
        if let Some(editable) = cached {
            return Ok(editable);
        }
        let info = self.info(id)?;
        let evt = TextChangeEvent::new(info, self.display_name(id)?, None, self.showing_name(id)?);
        let editable = self.resolved(&evt.node.node_type).can_text_be_changed(&evt);
        self.side
            .lock()
            .insert(id, Tag::Editable, Cached::Flag(editable));
        Ok(editable)
    }

    /// The node's payload if it is a `T`, else the first provided object of
    /// type `T`. Always `None` for the root.
    pub fn object_for<T: Any + Send + Sync>(&self, id: NodeId) -> Option<Arc<T>> {
        if id == NodeId::ROOT {
            return None;
        }
        let node = self.nodes.get(&id)?;
        if let Some(own) = node.payload.as_ref().and_then(|p| p.downcast::<T>()) {
            return Some(own);
        }
        let info = self.info(id).ok()?;
        self.resolved(&info.node_type)
            .object_for(&info, TypeId::of::<T>())?
            .downcast::<T>()
    }

    /// Only nodes without children react to double clicks.
    pub fn double_click(&mut self, id: NodeId) -> Result<bool> {
        if self.child_count(id)? > 0 {
            return Ok(false);
        }
        let info = self.info(id)?;
        Ok(self.resolved(&info.node_type).double_click(&info))
    }

    pub fn mouse_clicked(&self, id: NodeId, evt: &MouseEvent) -> Result<bool> {
        let info = self.info(id)?;
        Ok(self.resolved(&info.node_type).mouse_clicked(&info, evt))
    }

    fn infos(&self, nodes: &[NodeId]) -> Result<Vec<NodeInfo>> {
        nodes.iter().map(|id| self.info(*id)).collect()
    }

    /// Popup menu of `selection`, built by the adapters of its first node,
    /// followed by the tree's own entries.
    pub fn popup_menu(&self, selection: &[NodeId]) -> Result<Option<PopupMenu>> {
        let infos = self.infos(selection)?;
        let Some(first) = infos.first() else {
            return Ok(None);
        };
        let Some(mut menu) = self.resolved(&first.node_type).popup_menu(&infos) else {
            return Ok(None);
        };
        if !menu.is_empty() && !menu.ends_with_separator() {
            menu.add_separator();
        }
        menu.add_item("Rename", "rename");
        if selection.iter().any(|id| self.allows_children(*id)) {
            menu.add_item("Sorting ...", "sorting");
        }
        Ok(Some(menu))
    }

    pub fn transferable(&self, nodes: &[NodeId]) -> Result<Transferable> {
        let infos = self.infos(nodes)?;
        match infos.first() {
            Some(first) => Ok(self.resolved(&first.node_type).transferable(&infos)),
            None => Ok(Transferable::new(Vec::new())),
        }
    }

    /// Command processors of every adapter of every selected node's type.
    pub fn command_processors(&self, selection: &[NodeId]) -> Result<Vec<Arc<dyn CommandProcessor>>> {
        let infos = self.infos(selection)?;
        let mut seen_types = HashSet::new();
        let mut processors: Vec<Arc<dyn CommandProcessor>> = Vec::new();
        for info in &infos {
            if !seen_types.insert(info.node_type.name().to_string()) {
                continue;
            }
            for processor in self.resolved(&info.node_type).command_processors(&infos) {
                let ptr = Arc::as_ptr(&processor) as *const ();
                if !processors.iter().any(|p| std::ptr::eq(Arc::as_ptr(p) as *const (), ptr)) {
                    processors.push(processor);
                }
            }
        }
        Ok(processors)
    }

    /// Inline rename from the view: permission checks, adapter hooks, then a
    /// rename notification if nobody else took the change.
    pub fn request_rename(&mut self, id: NodeId, text: &str) -> Result<RenameOutcome> {
        if id == NodeId::ROOT {
            return Err(Error::RootImmutable("renamed"));
        }
        let info = self.info(id)?;
        let showing_name = self.showing_name(id)?;
        let mut evt = TextChangeEvent::new(
            info.clone(),
            self.display_name(id)?,
            Some(text.to_string()),
            showing_name,
        );

        if showing_name {
            if validate_name(text).is_err() {
                return Ok(RenameOutcome::Rejected(RenameRejection::InvalidName));
            }
            let parent = self.node(id)?.parent.unwrap_or(NodeId::ROOT);
            if self.child_by_name(parent, text).is_some_and(|other| other != id) {
                return Ok(RenameOutcome::Rejected(RenameRejection::NameTaken));
            }
        }

        let adapters = self.resolved(&info.node_type);
        if !adapters.accept_new_text(&evt) {
            return Ok(RenameOutcome::Rejected(RenameRejection::Refused));
        }
        if adapters.node_text_changed(&mut evt) {
            return Ok(RenameOutcome::HandledByAdapter);
        }
        if !showing_name {
            return Ok(RenameOutcome::Unhandled);
        }
        self.tree_changed(Notification::renamed(info.path, text))?;
        Ok(RenameOutcome::Renamed)
    }

    /// Selection change reported by the view.
    ///
    /// Unless an adapter handles the change, adding to the selection collapses
    /// it to the lead node.
    pub fn view_selection_changed(
        &mut self,
        lead: NodeId,
        added: bool,
        selection: &[NodeId],
    ) -> Result<SelectionOutcome> {
        let info = self.info(lead)?;
        self.selection.set(selection.iter().copied());

        let evt = SelectionEvent {
            tree: self.name.clone(),
            lead: info.clone(),
            added,
            selection: selection.to_vec(),
        };
        let handled = self.resolved(&info.node_type).selection_changed(&evt);
        if !handled && added && self.selection.len() > 1 {
            self.selection.set([lead]);
            self.sync_view_selection();
        }

        let selection = self.selection.nodes().to_vec();
        Ok(SelectionOutcome {
            handled,
            status_message: self.status_message(lead)?,
            command_processors: self.command_processors(&selection)?,
            selection,
        })
    }

    /// Replace the selection and push it to the view.
    pub fn select_nodes(&mut self, nodes: &[NodeId]) -> Result<()> {
        for id in nodes {
            self.node(*id)?;
        }
        self.selection.set(nodes.iter().copied());
        self.sync_view_selection();
        Ok(())
    }

    /// Drop the cached display values of `id`.
    pub fn invalidate(&self, id: NodeId) { self.side.lock().invalidate(id); }
}

// ---------------------------------------------------------------------------
// Extension values and listeners
// ---------------------------------------------------------------------------

impl Tree {
    pub fn set_value(&mut self, id: NodeId, key: impl Into<String>, value: Value) -> Result<Option<Value>> {
        Ok(self.node_mut(id)?.values.insert(key.into(), value))
    }

    pub fn value(&self, id: NodeId, key: &str) -> Option<&Value> {
        self.nodes.get(&id)?.values.get(key)
    }

    pub fn remove_value(&mut self, id: NodeId, key: &str) -> Result<Option<Value>> {
        Ok(self.node_mut(id)?.values.remove(key))
    }

    pub fn add_listener(&mut self, id: NodeId, listener: Arc<dyn NodeListener>) -> Result<()> {
        self.node_mut(id)?.listeners.push(listener);
        Ok(())
    }

    pub fn remove_listener(&mut self, id: NodeId, listener: &Arc<dyn NodeListener>) -> Result<bool> {
        let node = self.node_mut(id)?;
        let before = node.listeners.len();
        let target = Arc::as_ptr(listener) as *const ();
        node.listeners
            .retain(|l| !std::ptr::eq(Arc::as_ptr(l) as *const (), target));
        Ok(before != node.listeners.len())
    }
}

// ---------------------------------------------------------------------------
// Per-tree registration
// ---------------------------------------------------------------------------

impl Tree {
    pub fn register_adapter(&mut self, adapter: Arc<dyn NodeAdapter>, node_type: &NodeType) {
        self.resolver.register_adapter(adapter, node_type);
    }

    pub fn register_adapter_provider(&mut self, provider: Arc<dyn AdapterProvider>) {
        self.resolver.register_adapter_provider(provider);
    }

    pub fn register_object_provider(
        &mut self,
        provider: Arc<dyn ObjectProvider>,
        node_type: &NodeType,
        priority: i32,
    ) {
        self.register_adapter(Arc::new(ObjectProviderAdapter::new(provider, priority)), node_type);
    }
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

impl Tree {
    /// Every top-level node, with the expanded descendants of expanded ones,
    /// plus the selection.
    pub fn save_state(&mut self) -> Result<TreeState> {
        let mut nodes = Vec::new();
        for child in self.child_nodes(NodeId::ROOT)? {
            let path = self.path(child)?;
            let expanded = self.view.is_expanded(&path);
            let mut record = NodeRecord::new(path, expanded);
            if expanded {
                record.children = self.expanded_records(child)?;
            }
            nodes.push(record);
        }
        let selected = self
            .selection
            .nodes()
            .iter()
            .map(|id| self.path(*id))
            .collect::<Result<Vec<_>>>()?;
        Ok(TreeState { nodes, selected })
    }

    fn expanded_records(&self, id: NodeId) -> Result<Vec<NodeRecord>> {
        let mut out = Vec::new();
        for child in &self.node(id)?.children {
            let path = self.path(*child)?;
            if self.view.is_expanded(&path) {
                let mut record = NodeRecord::new(path, true);
                record.children = self.expanded_records(*child)?;
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Re-expand what still resolves by name and select, in one batch,
    /// every selected path that still exists.
    pub fn restore_state(&mut self, state: &TreeState) -> Result<()> {
        for path in state.expanded_paths() {
            match self.find_node_populating(path) {
                Ok(Some(id)) => {
                    if let Err(e) = self.ensure_populated(id) {
                        warn!(tree = %self.name, path = %path, error = %e, "population failed during restore");
                    }
                    self.view.expand_path(path);
                }
                Ok(None) => debug!(tree = %self.name, path = %path, "expanded node no longer exists"),
                Err(e) => warn!(tree = %self.name, path = %path, error = %e, "cannot restore expansion"),
            }
        }

        let mut selected = Vec::new();
        for path in &state.selected {
            if let Ok(Some(id)) = self.find_node_populating(path) {
                selected.push(id);
            }
        }
        self.select_nodes(&selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> NodePath {
        NodePath::parse(s).unwrap()
    }

    #[test]
    fn root_is_checked_folder() {
        let tree = Tree::new("Navigation");
        let root = tree.get(NodeId::ROOT).unwrap();
        assert_eq!(root.name(), "Navigation");
        assert_eq!(root.population(), PopulationState::Checked);
        assert!(tree.allows_children(NodeId::ROOT));
        assert_eq!(tree.path(NodeId::ROOT).unwrap(), NodePath::root());
    }

    #[test]
    fn subtree_postorder_lists_children_first() {
        let mut tree = Tree::new("t");
        tree.tree_changed(Notification::added(path("/a/b/c"), NodeType::leaf()))
            .unwrap();
        tree.tree_changed(Notification::added(path("/a/d"), NodeType::leaf()))
            .unwrap();
        let a = tree.find_node(&path("/a")).unwrap();
        let names: Vec<String> = tree
            .subtree_postorder(a)
            .into_iter()
            .map(|id| tree.real_name(id).unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["c", "b", "d", "a"]);
    }

    #[test]
    fn cycle_check_walks_ancestors() {
        let mut tree = Tree::new("t");
        tree.tree_changed(Notification::added(path("/a/b"), NodeType::folder()))
            .unwrap();
        let a = tree.find_node(&path("/a")).unwrap();
        let b = tree.find_node(&path("/a/b")).unwrap();
        assert!(tree.is_in_subtree(b, a));
        assert!(!tree.is_in_subtree(a, b));
    }
}
