//! Leaf adapter

use super::BUILTIN_PRIORITY;
use crate::capability::Icon;
use crate::registry::NodeAdapter;
use navtree_core::NodeInfo;

pub const LEAF: &str = "leaf";
pub const LEAF_SELECTED: &str = "leaf-selected";

pub struct LeafAdapter;

impl NodeAdapter for LeafAdapter {
    fn priority(&self, _tree: &str) -> i32 { BUILTIN_PRIORITY }

    fn name(&self) -> &str { "leaf" }

    fn icon(&self, _node: &NodeInfo, _icon: Option<Icon>, selected: bool, _expanded: bool) -> Option<Icon> {
        Some(Icon::named(if selected { LEAF_SELECTED } else { LEAF }))
    }

    fn allows_children(&self, _node: &NodeInfo, _allows: bool) -> bool { false }
}
