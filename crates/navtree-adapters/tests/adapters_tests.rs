//! Tests for navtree-adapters: registration, resolution, caching and merge policies

use navtree_adapters::*;
use navtree_core::*;
use parking_lot::Mutex;
use std::any::TypeId;
use std::sync::Arc;

fn info(name: &str, node_type: &NodeType) -> NodeInfo {
    NodeInfo {
        id: NodeId::new(1),
        tree: Arc::from("test"),
        name: name.to_string(),
        path: NodePath::root().child(name),
        node_type: node_type.clone(),
        payload: None,
    }
}

/// Records the order in which adapters are consulted.
type CallLog = Arc<Mutex<Vec<String>>>;

struct Probe {
    label: &'static str,
    priority: i32,
    log: CallLog,
    text: Option<&'static str>,
    handles_click: bool,
    fail_teardown: bool,
}

impl Probe {
    fn new(label: &'static str, priority: i32, log: &CallLog) -> Self {
        Self {
            label,
            priority,
            log: log.clone(),
            text: None,
            handles_click: false,
            fail_teardown: false,
        }
    }

    fn record(&self, what: &str) {
        self.log.lock().push(format!("{}:{}", what, self.label));
    }
}

impl NodeAdapter for Probe {
    fn priority(&self, _tree: &str) -> i32 { self.priority }

    fn name(&self) -> &str { self.label }

    fn text(&self, _node: &NodeInfo, text: Option<String>) -> Option<String> {
        self.record("text");
        match self.text {
            Some(t) => Some(t.to_string()),
            None => text,
        }
    }

    fn double_click(&self, _node: &NodeInfo) -> bool {
        self.record("click");
        self.handles_click
    }

    fn node_being_deleted(&self, _node: &NodeInfo) -> Result<()> {
        self.record("delete");
        if self.fail_teardown {
            return Err(Error::adapter(self.label, "teardown failed"));
        }
        Ok(())
    }
}

fn calls(log: &CallLog) -> Vec<String> {
    log.lock().clone()
}

// ===========================================================================
// Resolution
// ===========================================================================

#[test]
fn resolve_orders_by_descending_priority() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::new());
    let object = NodeType::object();
    registry.register_adapter(Arc::new(Probe::new("low", 1, &log)), &object);
    registry.register_adapter(Arc::new(Probe::new("high", 9, &log)), &object);
    registry.register_adapter(Arc::new(Probe::new("mid", 5, &log)), &object);

    let resolver = AdapterResolver::new("test", registry);
    let resolved = resolver.resolve(&NodeType::leaf());
    assert_eq!(resolved.names(), vec!["high", "mid", "low"]);
}

#[test]
fn resolve_keeps_registration_order_for_equal_priority() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::new());
    registry.register_adapter(Arc::new(Probe::new("a", 0, &log)), &NodeType::object());
    registry.register_adapter(Arc::new(Probe::new("b", 0, &log)), &NodeType::leaf());

    let resolver = AdapterResolver::new("test", registry);
    assert_eq!(resolver.resolve(&NodeType::leaf()).names(), vec!["a", "b"]);
}

#[test]
fn resolve_matches_supertypes_only() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::new());
    let run = NodeType::derive("run", &[&NodeType::folder()]);
    registry.register_adapter(Arc::new(Probe::new("folder", 0, &log)), &NodeType::folder());
    registry.register_adapter(Arc::new(Probe::new("run", 0, &log)), &run);
    registry.register_adapter(Arc::new(Probe::new("leaf", 0, &log)), &NodeType::leaf());

    let resolver = AdapterResolver::new("test", registry);
    assert_eq!(resolver.resolve(&run).names(), vec!["folder", "run"]);
    assert_eq!(resolver.resolve(&NodeType::folder()).names(), vec!["folder"]);
    assert!(resolver.resolve(&NodeType::object()).is_empty());
}

#[test]
fn resolve_deduplicates_by_identity() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::new());
    let shared: Arc<dyn NodeAdapter> = Arc::new(Probe::new("shared", 0, &log));
    registry.register_adapter(shared.clone(), &NodeType::object());
    registry.register_adapter(shared, &NodeType::leaf());

    let resolver = AdapterResolver::new("test", registry);
    assert_eq!(resolver.resolve(&NodeType::leaf()).len(), 1);
}

#[test]
fn resolve_is_cached_and_idempotent() {
    let registry = Arc::new(AdapterRegistry::with_builtins());
    let resolver = AdapterResolver::new("test", registry);
    let first = resolver.resolve(&NodeType::leaf());
    let second = resolver.resolve(&NodeType::leaf());
    assert!(first.ptr_eq(&second));
    assert_eq!(resolver.cached_types(), 1);
}

#[test]
fn global_registration_invalidates_every_resolver() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::with_builtins());
    let a = AdapterResolver::new("a", registry.clone());
    let b = AdapterResolver::new("b", registry.clone());
    let before_a = a.resolve(&NodeType::leaf());
    let before_b = b.resolve(&NodeType::leaf());

    registry.register_adapter(Arc::new(Probe::new("late", 50, &log)), &NodeType::leaf());

    let after_a = a.resolve(&NodeType::leaf());
    let after_b = b.resolve(&NodeType::leaf());
    assert!(!before_a.ptr_eq(&after_a));
    assert_eq!(after_a.names()[0], "late");
    assert_eq!(after_b.len(), before_b.len() + 1);
}

#[test]
fn local_registration_is_scoped_to_one_resolver() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::with_builtins());
    let mut local = AdapterResolver::new("local", registry.clone());
    let other = AdapterResolver::new("other", registry);
    let before = local.resolve(&NodeType::leaf());

    local.register_adapter(Arc::new(Probe::new("mine", 99, &log)), &NodeType::leaf());

    let after = local.resolve(&NodeType::leaf());
    assert!(!before.ptr_eq(&after));
    assert_eq!(after.names()[0], "mine");
    assert!(!other.resolve(&NodeType::leaf()).names().contains(&"mine"));
}

struct ByTree;

impl NodeAdapter for ByTree {
    fn priority(&self, tree: &str) -> i32 {
        if tree == "special" { 100 } else { -100 }
    }

    fn name(&self) -> &str { "by-tree" }
}

#[test]
fn priority_may_depend_on_tree() {
    let registry = Arc::new(AdapterRegistry::with_builtins());
    registry.register_adapter(Arc::new(ByTree), &NodeType::leaf());

    let special = AdapterResolver::new("special", registry.clone());
    let plain = AdapterResolver::new("plain", registry);
    assert_eq!(special.resolve(&NodeType::leaf()).names()[0], "by-tree");
    assert_eq!(plain.resolve(&NodeType::leaf()).names()[0], "leaf");
}

struct RunAdapters {
    adapter: Arc<dyn NodeAdapter>,
}

impl AdapterProvider for RunAdapters {
    fn adapters_for(&self, node_type: &NodeType) -> Vec<Arc<dyn NodeAdapter>> {
        if node_type.is_a_name("run") {
            vec![self.adapter.clone()]
        } else {
            Vec::new()
        }
    }
}

#[test]
fn adapter_provider_contributes_adapters() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::new());
    registry.register_adapter_provider(Arc::new(RunAdapters {
        adapter: Arc::new(Probe::new("from-provider", 0, &log)),
    }));
    let resolver = AdapterResolver::new("test", registry);
    let run = NodeType::derive("run", &[&NodeType::folder()]);
    assert_eq!(resolver.resolve(&run).names(), vec!["from-provider"]);
    assert!(resolver.resolve(&NodeType::folder()).is_empty());
}

// ===========================================================================
// Merge policies
// ===========================================================================

#[test]
fn cascade_runs_lowest_to_highest_and_highest_wins() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::new());
    let mut low = Probe::new("low", 1, &log);
    low.text = Some("from-low");
    let mut high = Probe::new("high", 2, &log);
    high.text = Some("from-high");
    registry.register_adapter(Arc::new(high), &NodeType::object());
    registry.register_adapter(Arc::new(low), &NodeType::object());

    let resolved = AdapterResolver::new("t", registry).resolve(&NodeType::leaf());
    let text = resolved.text(&info("n", &NodeType::leaf()));
    assert_eq!(text.as_deref(), Some("from-high"));
    assert_eq!(calls(&log), vec!["text:low", "text:high"]);
}

#[test]
fn cascade_highest_may_defer() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::new());
    let mut low = Probe::new("low", 1, &log);
    low.text = Some("from-low");
    registry.register_adapter(Arc::new(low), &NodeType::object());
    registry.register_adapter(Arc::new(Probe::new("high", 2, &log)), &NodeType::object());

    let resolved = AdapterResolver::new("t", registry).resolve(&NodeType::leaf());
    assert_eq!(resolved.text(&info("n", &NodeType::leaf())).as_deref(), Some("from-low"));
}

#[test]
fn first_wins_stops_at_first_handler() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::new());
    let mut mid = Probe::new("mid", 5, &log);
    mid.handles_click = true;
    registry.register_adapter(Arc::new(Probe::new("low", 1, &log)), &NodeType::object());
    registry.register_adapter(Arc::new(mid), &NodeType::object());
    registry.register_adapter(Arc::new(Probe::new("high", 9, &log)), &NodeType::object());

    let resolved = AdapterResolver::new("t", registry).resolve(&NodeType::leaf());
    assert!(resolved.double_click(&info("n", &NodeType::leaf())));
    assert_eq!(calls(&log), vec!["click:high", "click:mid"]);
}

#[test]
fn broadcast_is_fail_fast() {
    let log = CallLog::default();
    let registry = Arc::new(AdapterRegistry::new());
    let mut mid = Probe::new("mid", 5, &log);
    mid.fail_teardown = true;
    registry.register_adapter(Arc::new(Probe::new("low", 1, &log)), &NodeType::object());
    registry.register_adapter(Arc::new(mid), &NodeType::object());
    registry.register_adapter(Arc::new(Probe::new("high", 9, &log)), &NodeType::object());

    let resolved = AdapterResolver::new("t", registry).resolve(&NodeType::leaf());
    let err = resolved.node_being_deleted(&info("n", &NodeType::leaf())).unwrap_err();
    assert!(matches!(err, Error::Adapter { .. }));
    assert_eq!(calls(&log), vec!["delete:high", "delete:mid"]);
}

struct NullIcon;

impl NodeAdapter for NullIcon {
    fn priority(&self, _tree: &str) -> i32 { 50 }

    fn icon(&self, _node: &NodeInfo, _icon: Option<Icon>, _selected: bool, _expanded: bool) -> Option<Icon> {
        None
    }
}

struct Passthrough;

impl NodeAdapter for Passthrough {
    fn priority(&self, _tree: &str) -> i32 { 60 }
}

#[test]
fn icon_cascade_resets_to_default_after_none() {
    let registry = Arc::new(AdapterRegistry::new());
    registry.register_adapter(Arc::new(NullIcon), &NodeType::object());
    registry.register_adapter(Arc::new(Passthrough), &NodeType::object());

    let resolved = AdapterResolver::new("t", registry).resolve(&NodeType::leaf());
    let icon = resolved.icon(&info("n", &NodeType::leaf()), Some(Icon::named("default")), false, false);
    assert_eq!(icon, Some(Icon::named("default")));
}

struct Menu(&'static str, i32);

impl NodeAdapter for Menu {
    fn priority(&self, _tree: &str) -> i32 { self.1 }

    fn modify_popup_menu(&self, _selection: &[NodeInfo], menu: Option<PopupMenu>) -> Option<PopupMenu> {
        let mut menu = menu?;
        menu.add_item(self.0, self.0);
        Some(menu)
    }
}

#[test]
fn popup_menu_accumulates_low_to_high() {
    let registry = Arc::new(AdapterRegistry::new());
    registry.register_adapter(Arc::new(Menu("Second", 2)), &NodeType::object());
    registry.register_adapter(Arc::new(Menu("First", 1)), &NodeType::object());

    let resolved = AdapterResolver::new("t", registry).resolve(&NodeType::leaf());
    let menu = resolved.popup_menu(&[info("n", &NodeType::leaf())]).unwrap();
    assert_eq!(menu.labels(), vec!["First", "Second"]);
}

// ===========================================================================
// Structure and object providers
// ===========================================================================

#[test]
fn structure_provider_absence_is_an_error() {
    let resolver = AdapterResolver::new("t", Arc::new(AdapterRegistry::new()));
    let resolved = resolver.resolve(&NodeType::folder());
    let err = resolved.structure_provider(&info("n", &NodeType::folder())).err().unwrap();
    assert!(matches!(err, Error::NoAdapter { .. }));
}

#[test]
fn builtins_supply_a_list_structure_provider() {
    let resolver = AdapterResolver::new("t", Arc::new(AdapterRegistry::with_builtins()));
    let resolved = resolver.resolve(&NodeType::folder());
    let mut provider = resolved.structure_provider(&info("n", &NodeType::folder())).unwrap();
    assert!(provider.add_node(NodeId::new(7)));
    assert!(!provider.add_node(NodeId::new(7)));
}

struct Numbers;

impl ObjectProvider for Numbers {
    fn object_for_node(&self, node: &NodeInfo, wanted: TypeId) -> Option<Payload> {
        if wanted == TypeId::of::<usize>() {
            Some(Payload::new(node.name.len()))
        } else {
            // Deliberately wrong type for anything else.
            Some(Payload::new(String::from("nope")))
        }
    }
}

#[test]
fn object_provider_checks_concrete_type() {
    let registry = Arc::new(AdapterRegistry::with_builtins());
    registry.register_object_provider(Arc::new(Numbers), &NodeType::leaf(), 5);
    let resolved = AdapterResolver::new("t", registry).resolve(&NodeType::leaf());
    let node = info("abcd", &NodeType::leaf());

    let found = resolved.object_for(&node, TypeId::of::<usize>()).unwrap();
    assert_eq!(found.downcast_ref::<usize>(), Some(&4));
    assert!(resolved.object_for(&node, TypeId::of::<i64>()).is_none());
}

// ===========================================================================
// Built-in adapters
// ===========================================================================

#[test]
fn folder_allows_children_and_leaf_does_not() {
    let resolver = AdapterResolver::new("t", Arc::new(AdapterRegistry::with_builtins()));
    assert!(resolver.resolve(&NodeType::folder()).allows_children(&info("f", &NodeType::folder())));
    assert!(!resolver.resolve(&NodeType::leaf()).allows_children(&info("l", &NodeType::leaf())));
}

#[test]
fn folder_icon_follows_state() {
    let resolver = AdapterResolver::new("t", Arc::new(AdapterRegistry::with_builtins()));
    let folder = info("f", &NodeType::folder());
    let resolved = resolver.resolve(&NodeType::folder());
    assert_eq!(
        resolved.icon(&folder, None, false, true).unwrap().name(),
        adapters::folder::FOLDER_OPEN
    );
    assert_eq!(
        resolved.icon(&folder, None, true, false).unwrap().name(),
        adapters::folder::FOLDER_CLOSED_SELECTED
    );
}

#[test]
fn text_defaults_to_none() {
    let resolver = AdapterResolver::new("t", Arc::new(AdapterRegistry::with_builtins()));
    assert!(resolver.resolve(&NodeType::leaf()).text(&info("l", &NodeType::leaf())).is_none());
}

#[test]
fn rename_permission_defaults() {
    let resolver = AdapterResolver::new("t", Arc::new(AdapterRegistry::with_builtins()));
    let resolved = resolver.resolve(&NodeType::leaf());
    let evt = TextChangeEvent::new(info("l", &NodeType::leaf()), "l", Some("m".into()), true);
    assert!(!resolved.can_text_be_changed(&evt));
    assert!(resolved.accept_new_text(&evt));
}

#[test]
fn transferable_carries_node_paths() {
    let resolver = AdapterResolver::new("t", Arc::new(AdapterRegistry::with_builtins()));
    let t = resolver
        .resolve(&NodeType::leaf())
        .transferable(&[info("a", &NodeType::leaf()), info("b", &NodeType::leaf())]);
    assert_eq!(t.nodes.len(), 2);
    assert!(t.supports(capability::NODE_FLAVOR));
}
