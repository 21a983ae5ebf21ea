//! Core types for navtree

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Stable identifier of a node inside one tree's arena.
///
/// Ids are never reused within a tree, so a stale id simply stops resolving
/// once its node has been removed.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(u64);

impl NodeId {
    /// The root node of every tree.
    pub const ROOT: NodeId = NodeId(0);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// NodePath
// ---------------------------------------------------------------------------

/// Path of a node below the root, one segment per level.
///
/// Rendered as `/a/b/c`. The empty path designates the root itself.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodePath {
    segments: Vec<String>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `/a/b/c` (the leading slash is optional). Empty segments are rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            if segment.is_empty() {
                return Err(Error::InvalidPath(s.to_string()));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` for the root.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path of the parent, `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn child(&self, name: impl Into<String>) -> NodePath {
        let mut segments = self.segments.clone();
        segments.push(name.into());
        Self { segments }
    }

    /// Same parent, different last segment.
    pub fn with_last(&self, name: impl Into<String>) -> NodePath {
        match self.parent() {
            Some(parent) => parent.child(name),
            None => Self::root().child(name),
        }
    }

    /// True if `self` equals `other` or lies below it.
    pub fn starts_with(&self, other: &NodePath) -> bool {
        self.segments.len() >= other.segments.len()
            && self.segments[..other.segments.len()] == other.segments[..]
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for NodePath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<NodePath> for String {
    fn from(path: NodePath) -> Self {
        path.to_string()
    }
}

// ---------------------------------------------------------------------------
// NodeType
// ---------------------------------------------------------------------------

pub const OBJECT_TYPE: &str = "object";
pub const FOLDER_TYPE: &str = "folder";
pub const LEAF_TYPE: &str = "leaf";

/// The declared type of a node: a name plus the flattened set of its supertypes.
///
/// Adapters registered for a type apply to every node whose type `is_a` that
/// type. Equality and hashing use the name only.
#[derive(Clone)]
pub struct NodeType {
    name: Arc<str>,
    supertypes: Arc<[Arc<str>]>,
}

impl NodeType {
    /// Top of every hierarchy.
    pub fn object() -> Self {
        Self {
            name: Arc::from(OBJECT_TYPE),
            supertypes: Arc::from(Vec::new()),
        }
    }

    pub fn folder() -> Self {
        Self::derive(FOLDER_TYPE, &[])
    }

    pub fn leaf() -> Self {
        Self::derive(LEAF_TYPE, &[])
    }

    /// Declare `name` as a subtype of `parents` (and, implicitly, of `object`).
    pub fn derive(name: impl Into<String>, parents: &[&NodeType]) -> Self {
        let name: String = name.into();
        let mut supertypes: Vec<Arc<str>> = Vec::new();
        let mut push = |key: &Arc<str>| {
            if **key != *name && !supertypes.iter().any(|s| s == key) {
                supertypes.push(key.clone());
            }
        };
        for parent in parents {
            push(&parent.name);
            for s in parent.supertypes.iter() {
                push(s);
            }
        }
        push(&Arc::from(OBJECT_TYPE));
        Self {
            name: Arc::from(name),
            supertypes: Arc::from(supertypes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.supertypes.iter().map(|s| &**s)
    }

    /// The type's own key followed by all supertype keys.
    pub fn capability_keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(&*self.name).chain(self.supertypes())
    }

    /// Subtype-or-equal test.
    pub fn is_a(&self, other: &NodeType) -> bool {
        self.is_a_name(other.name())
    }

    pub fn is_a_name(&self, name: &str) -> bool {
        self.capability_keys().any(|k| k == name)
    }

    pub fn is_object(&self) -> bool {
        &*self.name == OBJECT_TYPE
    }

    pub fn is_folder(&self) -> bool {
        self.is_a_name(FOLDER_TYPE)
    }
}

impl PartialEq for NodeType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for NodeType {}

impl std::hash::Hash for NodeType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("name", &self.name)
            .field("supertypes", &self.supertypes)
            .finish()
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Name → type lookup for serialized notifications.
#[derive(Clone, Debug)]
pub struct TypeCatalog {
    types: HashMap<String, NodeType>,
}

impl Default for TypeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeCatalog {
    /// A catalog holding the built-in `object`, `folder` and `leaf` types.
    pub fn new() -> Self {
        let mut catalog = Self {
            types: HashMap::new(),
        };
        catalog.insert(NodeType::object());
        catalog.insert(NodeType::folder());
        catalog.insert(NodeType::leaf());
        catalog
    }

    pub fn insert(&mut self, node_type: NodeType) {
        self.types.insert(node_type.name().to_string(), node_type);
    }

    /// Declare a type by name; every parent must already be known.
    pub fn declare(&mut self, name: &str, parents: &[&str]) -> Result<NodeType> {
        let parents = parents
            .iter()
            .map(|p| self.resolve(p))
            .collect::<Result<Vec<_>>>()?;
        let refs: Vec<&NodeType> = parents.iter().collect();
        let node_type = NodeType::derive(name, &refs);
        self.insert(node_type.clone());
        Ok(node_type)
    }

    pub fn get(&self, name: &str) -> Option<&NodeType> {
        self.types.get(name)
    }

    pub fn resolve(&self, name: &str) -> Result<NodeType> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownType(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Opaque user object attached to a node. Cheap to clone.
#[derive(Clone)]
pub struct Payload(Arc<dyn Any + Send + Sync>);

impl Payload {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone().downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }

    /// `TypeId` of the stored value, not of the wrapper.
    pub fn concrete_type_id(&self) -> TypeId {
        (*self.0).type_id()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Payload) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Payload(..)")
    }
}

/// An object that knows which node type represents it in a tree.
pub trait TreeObject: Any + Send + Sync {
    fn node_type(&self) -> NodeType;
}

// ---------------------------------------------------------------------------
// NodeInfo - what adapters and sorters get to see of a node
// ---------------------------------------------------------------------------

/// Owned snapshot of a node, handed to adapters.
#[derive(Clone, Debug)]
pub struct NodeInfo {
    pub id: NodeId,
    pub tree: Arc<str>,
    pub name: String,
    pub path: NodePath,
    pub node_type: NodeType,
    pub payload: Option<Payload>,
}

impl NodeInfo {
    pub fn is_root(&self) -> bool {
        self.id == NodeId::ROOT
    }

    pub fn payload_as<T: Any>(&self) -> Option<&T> {
        self.payload.as_ref().and_then(|p| p.downcast_ref::<T>())
    }
}
