//! Per-tree adapter resolution with caching
//!
//! A resolver merges the global registrations with the tree's own, orders the
//! applicable adapters by priority and caches the result per type name.
//! [`ResolvedAdapters`] then applies the merge policy of each capability.

use crate::capability::{
    ChildSink, CommandProcessor, Icon, MouseEvent, PopupMenu, SelectionEvent, TextChangeEvent,
    Transferable,
};
use crate::registry::{AdapterProvider, AdapterRegistry, AdapterSet, NodeAdapter};
use crate::structure::StructureProvider;
use dashmap::DashMap;
use navtree_core::{Error, NodeInfo, NodeType, Payload, Result};
use std::any::TypeId;
use std::cmp::Reverse;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

pub struct AdapterResolver {
    tree: Arc<str>,
    global: Arc<AdapterRegistry>,
    local: AdapterSet,
    cache: DashMap<String, ResolvedAdapters>,
    seen_generation: AtomicU64,
}

impl AdapterResolver {
    pub fn new(tree: impl Into<Arc<str>>, global: Arc<AdapterRegistry>) -> Self {
        let seen = global.generation();
        Self {
            tree: tree.into(),
            global,
            local: AdapterSet::new(),
            cache: DashMap::new(),
            seen_generation: AtomicU64::new(seen),
        }
    }

    pub fn tree_name(&self) -> &str { &self.tree }

    pub fn registry(&self) -> &Arc<AdapterRegistry> { &self.global }

    /// Register an adapter for this tree only.
    pub fn register_adapter(&mut self, adapter: Arc<dyn NodeAdapter>, node_type: &NodeType) {
        debug!(tree = %self.tree, adapter = adapter.name(), node_type = %node_type, "registering tree adapter");
        self.local.add_adapter(adapter, node_type);
        self.cache.clear();
    }

    pub fn register_adapter_provider(&mut self, provider: Arc<dyn AdapterProvider>) {
        self.local.add_provider(provider);
        self.cache.clear();
    }

    /// Adapters applicable to `node_type`, highest priority first.
    pub fn resolve(&self, node_type: &NodeType) -> ResolvedAdapters {
        let generation = self.global.generation();
        if self.seen_generation.swap(generation, Ordering::AcqRel) != generation {
            self.cache.clear();
        }
        if let Some(hit) = self.cache.get(node_type.name()) {
            return hit.clone();
        }

        let mut all = self.global.adapters_for(node_type);
        self.local.collect_into(node_type, &mut all);

        let mut adapters: Vec<Arc<dyn NodeAdapter>> = Vec::with_capacity(all.len());
        for adapter in all {
            if !adapters.iter().any(|a| same_adapter(a, &adapter)) {
                adapters.push(adapter);
            }
        }
        // Stable: equal priorities keep registration order.
        adapters.sort_by_key(|a| Reverse(a.priority(&self.tree)));

        debug!(tree = %self.tree, node_type = %node_type, count = adapters.len(), "resolved adapters");
        let resolved = ResolvedAdapters {
            adapters: Arc::from(adapters),
        };
        self.cache.insert(node_type.name().to_string(), resolved.clone());
        resolved
    }

    pub fn cached_types(&self) -> usize { self.cache.len() }
}

fn same_adapter(a: &Arc<dyn NodeAdapter>, b: &Arc<dyn NodeAdapter>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

// ---------------------------------------------------------------------------
// ResolvedAdapters - merge policies
// ---------------------------------------------------------------------------

/// Priority-ordered adapters for one type (highest first). Cheap to clone.
#[derive(Clone)]
pub struct ResolvedAdapters {
    adapters: Arc<[Arc<dyn NodeAdapter>]>,
}

impl ResolvedAdapters {
    pub fn len(&self) -> usize { self.adapters.len() }

    pub fn is_empty(&self) -> bool { self.adapters.is_empty() }

    /// Highest priority first.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn NodeAdapter>> { self.adapters.iter() }

    pub fn names(&self) -> Vec<&str> { self.adapters.iter().map(|a| a.name()).collect() }

    pub fn ptr_eq(&self, other: &ResolvedAdapters) -> bool {
        Arc::ptr_eq(&self.adapters, &other.adapters)
    }

    fn ascending(&self) -> impl Iterator<Item = &Arc<dyn NodeAdapter>> { self.adapters.iter().rev() }

    // --- cascade ---

    pub fn icon(&self, node: &NodeInfo, default: Option<Icon>, selected: bool, expanded: bool) -> Option<Icon> {
        let mut icon = default.clone();
        for adapter in self.ascending() {
            if icon.is_none() {
                icon = default.clone();
            }
            icon = adapter.icon(node, icon, selected, expanded);
        }
        icon
    }

    pub fn text(&self, node: &NodeInfo) -> Option<String> {
        self.ascending().fold(None, |text, adapter| adapter.text(node, text))
    }

    pub fn tooltip(&self, node: &NodeInfo) -> Option<String> {
        let mut message: Option<String> = None;
        for adapter in self.ascending() {
            message = adapter.tooltip(node, message);
        }
        message.filter(|m| !m.is_empty())
    }

    pub fn status_message(&self, node: &NodeInfo) -> Option<String> {
        let mut message: Option<String> = None;
        for adapter in self.ascending() {
            message = adapter.status_message(node, message);
        }
        message.filter(|m| !m.is_empty())
    }

    pub fn allows_children(&self, node: &NodeInfo) -> bool {
        self.ascending().fold(false, |allows, adapter| adapter.allows_children(node, allows))
    }

    pub fn popup_menu(&self, selection: &[NodeInfo]) -> Option<PopupMenu> {
        let mut menu: Option<PopupMenu> = None;
        for adapter in self.ascending() {
            let current = menu.take().unwrap_or_default();
            menu = adapter.modify_popup_menu(selection, Some(current));
        }
        menu
    }

    pub fn transferable(&self, nodes: &[NodeInfo]) -> Transferable {
        let initial = Transferable::new(nodes.iter().map(|n| n.path.clone()).collect());
        self.ascending()
            .fold(initial, |t, adapter| adapter.modify_transferable(nodes, t))
    }

    pub fn can_text_be_changed(&self, evt: &TextChangeEvent) -> bool {
        self.ascending().fold(false, |can, adapter| adapter.can_text_be_changed(evt, can))
    }

    pub fn accept_new_text(&self, evt: &TextChangeEvent) -> bool {
        self.ascending().fold(true, |accept, adapter| adapter.accept_new_text(evt, accept))
    }

    // --- first-wins ---

    /// Returns true if some adapter consumed the event.
    pub fn node_text_changed(&self, evt: &mut TextChangeEvent) -> bool {
        for adapter in self.iter() {
            adapter.node_text_changed(evt);
            if evt.is_consumed() {
                return true;
            }
        }
        false
    }

    pub fn double_click(&self, node: &NodeInfo) -> bool {
        self.iter().any(|a| a.double_click(node))
    }

    pub fn mouse_clicked(&self, node: &NodeInfo, evt: &MouseEvent) -> bool {
        self.iter().any(|a| a.mouse_clicked(node, evt))
    }

    pub fn selection_changed(&self, evt: &SelectionEvent) -> bool {
        self.iter().any(|a| a.selection_changed(evt))
    }

    pub fn structure_provider(&self, node: &NodeInfo) -> Result<Box<dyn StructureProvider>> {
        self.iter()
            .find_map(|a| a.structure_provider(node))
            .ok_or_else(|| Error::no_adapter("structure provider", node.node_type.name()))
    }

    /// First object, highest priority first, whose concrete type is `wanted`.
    pub fn object_for(&self, node: &NodeInfo, wanted: TypeId) -> Option<Payload> {
        self.iter().find_map(|adapter| {
            let provider = adapter.object_provider(node)?;
            let object = provider.object_for_node(node, wanted)?;
            (object.concrete_type_id() == wanted).then_some(object)
        })
    }

    // --- broadcast ---

    /// Stops at the first failing adapter.
    pub fn node_being_deleted(&self, node: &NodeInfo) -> Result<()> {
        for adapter in self.iter() {
            adapter.node_being_deleted(node)?;
        }
        Ok(())
    }

    /// Stops at the first failing adapter; children found so far stay in `sink`.
    pub fn check_for_children(&self, node: &NodeInfo, sink: &mut ChildSink) -> Result<()> {
        for adapter in self.iter() {
            adapter.check_for_children(node, sink)?;
        }
        Ok(())
    }

    pub fn command_processors(&self, selection: &[NodeInfo]) -> Vec<Arc<dyn CommandProcessor>> {
        self.iter().filter_map(|a| a.command_processor(selection)).collect()
    }
}
