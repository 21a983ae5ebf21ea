//! Built-in adapter implementations.
//!
//! Each adapter is a self-contained module. To add a new built-in:
//! 1. Create a new file in this directory
//! 2. Implement the NodeAdapter trait
//! 3. Add `pub mod <name>;` here
//! 4. Register it in register_builtins() below

pub mod base;
pub mod folder;
pub mod leaf;
pub mod object;

pub use base::BaseAdapter;
pub use folder::FolderAdapter;
pub use leaf::LeafAdapter;
pub use object::ObjectProviderAdapter;

use crate::registry::AdapterRegistry;
use navtree_core::NodeType;
use std::sync::Arc;

/// Priority of the folder and leaf adapters.
pub const BUILTIN_PRIORITY: i32 = 10;

/// Register the built-in adapters on `registry`.
pub fn register_builtins(registry: &AdapterRegistry) {
    registry.register_adapter(Arc::new(BaseAdapter), &NodeType::object());
    registry.register_adapter(Arc::new(FolderAdapter), &NodeType::folder());
    registry.register_adapter(Arc::new(LeafAdapter), &NodeType::leaf());
}
