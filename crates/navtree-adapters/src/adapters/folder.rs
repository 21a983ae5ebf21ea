//! Folder adapter - children allowed, icon follows expanded/selected state

use super::BUILTIN_PRIORITY;
use crate::capability::Icon;
use crate::registry::NodeAdapter;
use navtree_core::NodeInfo;

pub const FOLDER_OPEN: &str = "folder-open";
pub const FOLDER_CLOSED: &str = "folder-closed";
pub const FOLDER_OPEN_SELECTED: &str = "folder-open-selected";
pub const FOLDER_CLOSED_SELECTED: &str = "folder-closed-selected";

pub struct FolderAdapter;

impl NodeAdapter for FolderAdapter {
    fn priority(&self, _tree: &str) -> i32 { BUILTIN_PRIORITY }

    fn name(&self) -> &str { "folder" }

    fn icon(&self, _node: &NodeInfo, _icon: Option<Icon>, selected: bool, expanded: bool) -> Option<Icon> {
        let name = match (selected, expanded) {
            (true, true) => FOLDER_OPEN_SELECTED,
            (true, false) => FOLDER_CLOSED_SELECTED,
            (false, true) => FOLDER_OPEN,
            (false, false) => FOLDER_CLOSED,
        };
        Some(Icon::named(name))
    }

    fn allows_children(&self, _node: &NodeInfo, _allows: bool) -> bool { true }
}
