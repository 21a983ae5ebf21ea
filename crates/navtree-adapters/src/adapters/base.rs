//! Base adapter - default structure for every node

use crate::registry::NodeAdapter;
use crate::structure::{ListStructureProvider, StructureProvider};
use navtree_core::NodeInfo;

/// Registered for `object`, so it applies to every node. Runs last in
/// first-wins lookups: any other adapter's structure provider takes precedence.
pub struct BaseAdapter;

impl NodeAdapter for BaseAdapter {
    fn priority(&self, _tree: &str) -> i32 { i32::MIN }

    fn name(&self) -> &str { "base" }

    fn structure_provider(&self, _node: &NodeInfo) -> Option<Box<dyn StructureProvider>> {
        Some(Box::new(ListStructureProvider::new()))
    }
}
