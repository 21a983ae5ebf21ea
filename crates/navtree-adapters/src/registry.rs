//! Adapter registry and trait definitions
//!
//! Each adapter is a self-contained unit implementing [`NodeAdapter`] for one
//! node type (and, through the type hierarchy, all of its subtypes).
//! Adapters are registered globally on an [`AdapterRegistry`], shared by every
//! tree, or locally on a single tree.

use crate::capability::{
    ChildSink, CommandProcessor, Icon, MouseEvent, ObjectProvider, PopupMenu, SelectionEvent,
    TextChangeEvent, Transferable,
};
use crate::adapters::ObjectProviderAdapter;
use crate::structure::StructureProvider;
use navtree_core::{NodeInfo, NodeType, Result};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// The NodeAdapter trait: implement this to give nodes of a type behavior.
///
/// Every method has a neutral default, so an adapter only overrides what it
/// contributes. Methods fall in three groups, which differ in how the
/// resolver combines several adapters:
///
/// * cascade (`icon`, `text`, `tooltip`, ...): called from lowest to highest
///   priority, each receiving the value accumulated so far;
/// * first-wins (`double_click`, `structure_provider`, ...): called from
///   highest to lowest priority until one answers;
/// * broadcast (`node_being_deleted`, `check_for_children`,
///   `command_processor`): every adapter is called.
pub trait NodeAdapter: Send + Sync {
    /// Ordering key; higher runs first in first-wins and last in cascades.
    fn priority(&self, _tree: &str) -> i32 { 0 }

    /// Name used in logs and errors.
    fn name(&self) -> &str { std::any::type_name::<Self>() }

    // --- cascade ---

    /// Icon for the node. Returning `None` hands the original icon to the
    /// next adapter.
    fn icon(&self, _node: &NodeInfo, icon: Option<Icon>, _selected: bool, _expanded: bool) -> Option<Icon> {
        icon
    }

    /// Displayed text; `None` means the node's real name is shown.
    fn text(&self, _node: &NodeInfo, text: Option<String>) -> Option<String> { text }

    fn tooltip(&self, node: &NodeInfo, tooltip: Option<String>) -> Option<String> {
        self.status_message(node, tooltip)
    }

    fn status_message(&self, _node: &NodeInfo, message: Option<String>) -> Option<String> { message }

    fn allows_children(&self, _node: &NodeInfo, allows: bool) -> bool { allows }

    /// Contribute to the popup menu of `selection`. `None` suppresses the menu.
    fn modify_popup_menu(&self, _selection: &[NodeInfo], menu: Option<PopupMenu>) -> Option<PopupMenu> {
        menu
    }

    fn modify_transferable(&self, _nodes: &[NodeInfo], transferable: Transferable) -> Transferable {
        transferable
    }

    fn can_text_be_changed(&self, _evt: &TextChangeEvent, can: bool) -> bool { can }

    fn accept_new_text(&self, _evt: &TextChangeEvent, accept: bool) -> bool { accept }

    // --- first-wins ---

    /// React to an accepted rename. Call `evt.consume()` to stop the chain.
    fn node_text_changed(&self, _evt: &mut TextChangeEvent) {}

    fn double_click(&self, _node: &NodeInfo) -> bool { false }

    fn mouse_clicked(&self, _node: &NodeInfo, _evt: &MouseEvent) -> bool { false }

    /// Return true if selection behavior is provided for this event.
    fn selection_changed(&self, _evt: &SelectionEvent) -> bool { false }

    fn structure_provider(&self, _node: &NodeInfo) -> Option<Box<dyn StructureProvider>> { None }

    fn object_provider(&self, _node: &NodeInfo) -> Option<Arc<dyn ObjectProvider>> { None }

    // --- broadcast ---

    /// Teardown hook, called on every node of a removed subtree, deepest first.
    fn node_being_deleted(&self, _node: &NodeInfo) -> Result<()> { Ok(()) }

    /// Discover the children of a node on its first enumeration.
    fn check_for_children(&self, _node: &NodeInfo, _sink: &mut ChildSink) -> Result<()> { Ok(()) }

    fn command_processor(&self, _selection: &[NodeInfo]) -> Option<Arc<dyn CommandProcessor>> { None }
}

/// A source of adapters, queried per node type.
pub trait AdapterProvider: Send + Sync {
    /// Adapters applicable to `node_type`, in registration order.
    fn adapters_for(&self, node_type: &NodeType) -> Vec<Arc<dyn NodeAdapter>>;
}

// ---------------------------------------------------------------------------
// TypedAdapterProvider - adapters bound to a declared type
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct TypedAdapterProvider {
    entries: Vec<(NodeType, Arc<dyn NodeAdapter>)>,
}

impl TypedAdapterProvider {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, adapter: Arc<dyn NodeAdapter>, node_type: &NodeType) {
        self.entries.push((node_type.clone(), adapter));
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl AdapterProvider for TypedAdapterProvider {
    fn adapters_for(&self, node_type: &NodeType) -> Vec<Arc<dyn NodeAdapter>> {
        self.entries
            .iter()
            .filter(|(declared, _)| node_type.is_a(declared))
            .map(|(_, adapter)| adapter.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// AdapterSet - directly registered adapters plus providers
// ---------------------------------------------------------------------------

/// Registration storage shared by the global registry and per-tree resolvers.
///
/// Directly registered adapters are collected before those of registered
/// providers; within each group registration order is kept.
#[derive(Default)]
pub struct AdapterSet {
    typed: TypedAdapterProvider,
    providers: Vec<Arc<dyn AdapterProvider>>,
}

impl AdapterSet {
    pub fn new() -> Self { Self::default() }

    pub fn add_adapter(&mut self, adapter: Arc<dyn NodeAdapter>, node_type: &NodeType) {
        self.typed.add(adapter, node_type);
    }

    pub fn add_provider(&mut self, provider: Arc<dyn AdapterProvider>) {
        self.providers.push(provider);
    }

    pub fn is_empty(&self) -> bool { self.typed.is_empty() && self.providers.is_empty() }

    pub fn collect_into(&self, node_type: &NodeType, out: &mut Vec<Arc<dyn NodeAdapter>>) {
        out.extend(self.typed.adapters_for(node_type));
        for provider in &self.providers {
            out.extend(provider.adapters_for(node_type));
        }
    }
}

// ---------------------------------------------------------------------------
// AdapterRegistry - global registrations
// ---------------------------------------------------------------------------

/// Global adapter registrations, shared by all trees.
///
/// Every registration bumps a generation counter; resolvers compare it with
/// the generation they last saw and drop their caches when it moved.
pub struct AdapterRegistry {
    set: RwLock<AdapterSet>,
    generation: AtomicU64,
}

impl Default for AdapterRegistry {
    fn default() -> Self { Self::new() }
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self {
            set: RwLock::new(AdapterSet::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// A registry holding the built-in object, folder and leaf adapters.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        crate::adapters::register_builtins(&registry);
        registry
    }

    /// Register an adapter for `node_type` and all of its subtypes.
    pub fn register_adapter(&self, adapter: Arc<dyn NodeAdapter>, node_type: &NodeType) {
        info!(adapter = adapter.name(), node_type = %node_type, "registering global adapter");
        self.set.write().add_adapter(adapter, node_type);
        self.bump();
    }

    pub fn register_adapter_provider(&self, provider: Arc<dyn AdapterProvider>) {
        info!("registering global adapter provider");
        self.set.write().add_provider(provider);
        self.bump();
    }

    pub fn register_object_provider(
        &self,
        provider: Arc<dyn ObjectProvider>,
        node_type: &NodeType,
        priority: i32,
    ) {
        self.register_adapter(Arc::new(ObjectProviderAdapter::new(provider, priority)), node_type);
    }

    /// Registered adapters applicable to `node_type`, unsorted.
    pub fn adapters_for(&self, node_type: &NodeType) -> Vec<Arc<dyn NodeAdapter>> {
        let mut out = Vec::new();
        self.set.read().collect_into(node_type, &mut out);
        out
    }

    pub fn generation(&self) -> u64 { self.generation.load(Ordering::Acquire) }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}
