//! navtree adapters - type-scoped node behavior
//!
//! Each built-in adapter is a self-contained file in src/adapters/.
//! Adapters are bound to a node type and apply to all of its subtypes; a
//! per-tree [`AdapterResolver`] orders them by priority and merges their
//! answers according to each capability's policy.

pub mod adapters;
pub mod capability;
pub mod registry;
pub mod resolver;
pub mod structure;

pub use adapters::{register_builtins, ObjectProviderAdapter};
pub use capability::{
    ChildSink, ChildSpec, CommandProcessor, Icon, MenuEntry, MouseButton, MouseEvent,
    ObjectProvider, PopupMenu, SelectionEvent, TextChangeEvent, Transferable,
};
pub use registry::{AdapterProvider, AdapterRegistry, AdapterSet, NodeAdapter, TypedAdapterProvider};
pub use resolver::{AdapterResolver, ResolvedAdapters};
pub use structure::{ListStructureProvider, StructureProvider};
