//! Expanded and selected state of a tree, by path
//!
//! ```json
//! {
//!   "nodes": [
//!     { "path": "/runs", "isExpanded": true,
//!       "children": [ { "path": "/runs/run1", "isExpanded": true } ] },
//!     { "path": "/notes" }
//!   ],
//!   "selected": ["/runs/run1"]
//! }
//! ```

use navtree_core::{NodePath, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeState {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selected: Vec<NodePath>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub path: NodePath,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_expanded: Option<bool>,
    /// Expanded descendants, depth first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeRecord>,
}

impl NodeRecord {
    pub fn new(path: NodePath, expanded: bool) -> Self {
        Self {
            path,
            is_expanded: expanded.then_some(true),
            children: Vec::new(),
        }
    }

    pub fn expanded(&self) -> bool { self.is_expanded.unwrap_or(false) }
}

impl TreeState {
    pub fn to_json(&self) -> Result<String> { Ok(serde_json::to_string_pretty(self)?) }

    pub fn from_json(json: &str) -> Result<Self> { Ok(serde_json::from_str(json)?) }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Every record with `isExpanded`, parents before children.
    pub fn expanded_paths(&self) -> Vec<&NodePath> {
        fn walk<'a>(records: &'a [NodeRecord], out: &mut Vec<&'a NodePath>) {
            for record in records {
                if record.expanded() {
                    out.push(&record.path);
                }
                walk(&record.children, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }
}
