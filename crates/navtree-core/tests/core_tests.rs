//! Tests for navtree-core: node paths, the type hierarchy, payloads, notifications and errors

use navtree_core::*;
use std::collections::HashSet;

// ===========================================================================
// NodePath
// ===========================================================================

#[test]
fn path_parse_and_display() {
    let path = NodePath::parse("/a/b/c").unwrap();
    assert_eq!(path.segments(), &["a", "b", "c"]);
    assert_eq!(path.to_string(), "/a/b/c");
    assert_eq!(path.len(), 3);
}

#[test]
fn path_leading_and_trailing_slash_are_optional() {
    assert_eq!(NodePath::parse("a/b").unwrap(), NodePath::parse("/a/b/").unwrap());
}

#[test]
fn path_root_forms() {
    assert!(NodePath::parse("").unwrap().is_root());
    assert!(NodePath::parse("/").unwrap().is_root());
    assert_eq!(NodePath::root().to_string(), "/");
    assert!(NodePath::root().parent().is_none());
    assert!(NodePath::root().last().is_none());
}

#[test]
fn path_rejects_empty_segments() {
    let err = NodePath::parse("/a//b").unwrap_err();
    assert!(matches!(err, Error::InvalidPath(p) if p == "/a//b"));
}

#[test]
fn path_parent_child_and_with_last() {
    let path = NodePath::parse("/runs/run1").unwrap();
    assert_eq!(path.parent().unwrap().to_string(), "/runs");
    assert_eq!(path.last(), Some("run1"));
    assert_eq!(path.child("hist").to_string(), "/runs/run1/hist");
    assert_eq!(path.with_last("run9").to_string(), "/runs/run9");
}

#[test]
fn path_starts_with() {
    let a = NodePath::parse("/a").unwrap();
    let abc = NodePath::parse("/a/b/c").unwrap();
    assert!(abc.starts_with(&a));
    assert!(a.starts_with(&a));
    assert!(!a.starts_with(&abc));
    assert!(!NodePath::parse("/ab").unwrap().starts_with(&a));
    assert!(abc.starts_with(&NodePath::root()));
}

#[test]
fn path_serde_as_string() {
    let path = NodePath::parse("/x/y").unwrap();
    assert_eq!(serde_json::to_string(&path).unwrap(), "\"/x/y\"");
    let back: NodePath = serde_json::from_str("\"/x/y\"").unwrap();
    assert_eq!(back, path);
    assert!(serde_json::from_str::<NodePath>("\"/x//y\"").is_err());
}

// ===========================================================================
// NodeType
// ===========================================================================

#[test]
fn builtin_types_descend_from_object() {
    assert!(NodeType::folder().is_a(&NodeType::object()));
    assert!(NodeType::leaf().is_a(&NodeType::object()));
    assert!(NodeType::object().is_a(&NodeType::object()));
    assert!(!NodeType::leaf().is_a(&NodeType::folder()));
    assert!(NodeType::object().is_object());
    assert!(NodeType::folder().is_folder());
}

#[test]
fn derived_types_flatten_supertypes() {
    let run = NodeType::derive("run", &[&NodeType::folder()]);
    let special = NodeType::derive("special-run", &[&run]);
    let keys: Vec<&str> = special.capability_keys().collect();
    assert_eq!(keys, vec!["special-run", "run", "folder", "object"]);
    assert!(special.is_a(&run));
    assert!(special.is_folder());
    assert!(!run.is_a(&special));
}

#[test]
fn derive_with_multiple_parents_has_no_duplicates() {
    let a = NodeType::derive("a", &[&NodeType::folder()]);
    let b = NodeType::derive("b", &[&NodeType::folder()]);
    let ab = NodeType::derive("ab", &[&a, &b]);
    let keys: Vec<&str> = ab.supertypes().collect();
    assert_eq!(keys, vec!["a", "folder", "object", "b"]);
}

#[test]
fn node_type_equality_uses_name() {
    let one = NodeType::derive("x", &[&NodeType::folder()]);
    let two = NodeType::derive("x", &[&NodeType::leaf()]);
    assert_eq!(one, two);
    let set: HashSet<NodeType> = [one, two].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn catalog_declares_and_resolves() {
    let mut catalog = TypeCatalog::new();
    assert_eq!(catalog.names(), vec!["folder", "leaf", "object"]);
    let run = catalog.declare("run", &["folder"]).unwrap();
    assert!(run.is_folder());
    assert_eq!(catalog.resolve("run").unwrap(), run);
    assert!(matches!(catalog.resolve("nope"), Err(Error::UnknownType(_))));
    assert!(matches!(catalog.declare("bad", &["nope"]), Err(Error::UnknownType(_))));
}

// ===========================================================================
// Payloads
// ===========================================================================

struct Histogram {
    entries: u32,
}

impl TreeObject for Histogram {
    fn node_type(&self) -> NodeType {
        NodeType::derive("histogram", &[&NodeType::leaf()])
    }
}

#[test]
fn payload_downcasts() {
    let payload = Payload::new(Histogram { entries: 12 });
    assert!(payload.is::<Histogram>());
    assert_eq!(payload.downcast_ref::<Histogram>().unwrap().entries, 12);
    assert!(payload.downcast_ref::<String>().is_none());
    assert_eq!(payload.concrete_type_id(), std::any::TypeId::of::<Histogram>());
    let arc = payload.downcast::<Histogram>().unwrap();
    assert_eq!(arc.entries, 12);
}

#[test]
fn payload_identity() {
    let a = Payload::new(1u8);
    let b = a.clone();
    let c = Payload::new(1u8);
    assert!(a.ptr_eq(&b));
    assert!(!a.ptr_eq(&c));
}

// ===========================================================================
// Notifications
// ===========================================================================

#[test]
fn added_object_takes_type_from_object() {
    let path = NodePath::parse("/h").unwrap();
    match Notification::added_object(path.clone(), Histogram { entries: 1 }) {
        Notification::NodeAdded {
            path: p,
            node_type,
            payload,
        } => {
            assert_eq!(p, path);
            assert_eq!(node_type.name(), "histogram");
            assert!(payload.unwrap().is::<Histogram>());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn notification_kind_and_path() {
    let path = NodePath::parse("/a").unwrap();
    let n = Notification::renamed(path.clone(), "b");
    assert_eq!(n.kind(), NotificationKind::NodeRenamed);
    assert_eq!(n.path(), Some(&path));
    assert!(Notification::structure_changed(NodeId::ROOT).path().is_none());
}

#[test]
fn notification_kind_wire_names() {
    for kind in NotificationKind::ALL {
        assert_eq!(NotificationKind::from_wire(kind.as_str()), Some(kind));
    }
    assert_eq!(NotificationKind::NodeSelectionChanged.to_string(), "nodeSelectionChanged");
    assert!(NotificationKind::from_wire("nodeExploded").is_none());
}

#[test]
fn parse_added_with_default_type() {
    let catalog = TypeCatalog::new();
    let n = parse_notification(r#"{"kind":"nodeAdded","path":"/runs/run1"}"#, &catalog).unwrap();
    match n {
        Notification::NodeAdded { path, node_type, .. } => {
            assert_eq!(path.to_string(), "/runs/run1");
            assert_eq!(node_type.name(), LEAF_TYPE);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn parse_moved_and_sorted() {
    let catalog = TypeCatalog::new();
    let moved = parse_notification(
        r#"{"kind":"nodeMoved","path":"/a/x","newPath":"/b/y"}"#,
        &catalog,
    )
    .unwrap();
    assert!(matches!(moved, Notification::NodeMoved { ref new_path, .. } if new_path.to_string() == "/b/y"));

    let sorted = parse_notification(
        r#"{"kind":"nodeSorted","path":"/","spec":"Folders first:Alphabetical","recursive":true}"#,
        &catalog,
    )
    .unwrap();
    match sorted {
        Notification::NodeSorted { path, spec, recursive } => {
            assert!(path.is_root());
            assert_eq!(spec, "Folders first:Alphabetical");
            assert!(recursive);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn parse_selection_defaults_to_selected() {
    let catalog = TypeCatalog::new();
    let n = parse_notification(r#"{"kind":"nodeSelectionChanged","path":"/a"}"#, &catalog).unwrap();
    assert!(matches!(n, Notification::NodeSelectionChanged { selected: true, .. }));
}

#[test]
fn parse_rejects_unknown_kind() {
    let catalog = TypeCatalog::new();
    let err = parse_notification(r#"{"kind":"nodeExploded","path":"/a"}"#, &catalog).unwrap_err();
    assert!(matches!(err, Error::UnsupportedNotification(k) if k == "nodeExploded"));
    let err = parse_notification(r#"{"path":"/a"}"#, &catalog).unwrap_err();
    assert!(matches!(err, Error::UnsupportedNotification(_)));
}

#[test]
fn parse_rejects_undeclared_type() {
    let catalog = TypeCatalog::new();
    let err = parse_notification(r#"{"kind":"nodeAdded","path":"/a","type":"run"}"#, &catalog).unwrap_err();
    assert!(matches!(err, Error::UnknownType(t) if t == "run"));
}

#[test]
fn parse_malformed_body_is_json_error() {
    let catalog = TypeCatalog::new();
    let err = parse_notification(r#"{"kind":"nodeRenamed","path":"/a"}"#, &catalog).unwrap_err();
    assert!(matches!(err, Error::JsonError(_)));
}

#[test]
fn record_from_notification_serializes_wire_form() {
    let n = Notification::added(NodePath::parse("/a").unwrap(), NodeType::folder());
    let json = serde_json::to_value(NotificationRecord::from(&n)).unwrap();
    assert_eq!(json["kind"], "nodeAdded");
    assert_eq!(json["path"], "/a");
    assert_eq!(json["type"], "folder");
}

// ===========================================================================
// Errors
// ===========================================================================

#[test]
fn error_display() {
    let path = NodePath::parse("/a/b").unwrap();
    assert_eq!(Error::NodeExists(path.clone()).to_string(), "node /a/b already exists");
    assert_eq!(
        Error::no_adapter("structure provider", "folder").to_string(),
        "no structure provider adapter available for type folder"
    );
    assert_eq!(
        Error::invalid_move(&path, &NodePath::parse("/a/b/c").unwrap(), "target is inside the moved subtree")
            .to_string(),
        "cannot move /a/b to /a/b/c: target is inside the moved subtree"
    );
}

#[test]
fn error_contract_violation_classification() {
    assert!(Error::NodeExists(NodePath::root()).is_contract_violation());
    assert!(Error::UnsupportedNotification("x".into()).is_contract_violation());
    let io = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
    assert!(!io.is_contract_violation());
}
