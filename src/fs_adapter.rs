//! Lazily scanned directory trees
//!
//! A `directory` node carries an [`FsEntry`] payload; its children are listed
//! one level deep the first time the node is enumerated.

use navtree_adapters::{AdapterRegistry, ChildSink, NodeAdapter};
use navtree_core::{Error, NodeInfo, NodeType, Result, TreeObject};
use std::path::PathBuf;
use std::sync::Arc;
use walkdir::WalkDir;

pub const DIRECTORY_TYPE: &str = "directory";
pub const FILE_TYPE: &str = "file";

pub fn directory_type() -> NodeType { NodeType::derive(DIRECTORY_TYPE, &[&NodeType::folder()]) }

pub fn file_type() -> NodeType { NodeType::derive(FILE_TYPE, &[&NodeType::leaf()]) }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FsEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    /// Size in bytes, 0 for directories.
    pub len: u64,
}

impl FsEntry {
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            len: 0,
        }
    }
}

impl TreeObject for FsEntry {
    fn node_type(&self) -> NodeType {
        if self.is_dir {
            directory_type()
        } else {
            file_type()
        }
    }
}

pub struct DirectoryAdapter {
    show_hidden: bool,
}

impl DirectoryAdapter {
    pub fn new(show_hidden: bool) -> Self { Self { show_hidden } }
}

impl NodeAdapter for DirectoryAdapter {
    fn priority(&self, _tree: &str) -> i32 { 20 }

    fn name(&self) -> &str { "directory" }

    fn status_message(&self, node: &NodeInfo, message: Option<String>) -> Option<String> {
        match node.payload_as::<FsEntry>() {
            Some(entry) if entry.is_dir => Some(entry.path.display().to_string()),
            Some(entry) => Some(format!("{} ({} bytes)", entry.path.display(), entry.len)),
            None => message,
        }
    }

    fn check_for_children(&self, node: &NodeInfo, sink: &mut ChildSink) -> Result<()> {
        let Some(entry) = node.payload_as::<FsEntry>() else {
            return Ok(());
        };
        let walker = WalkDir::new(&entry.path)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for item in walker {
            let item = item.map_err(|e| Error::adapter(self.name(), e.to_string()))?;
            let name = item.file_name().to_string_lossy().into_owned();
            if !self.show_hidden && name.starts_with('.') {
                continue;
            }
            let is_dir = item.file_type().is_dir();
            let len = if is_dir {
                0
            } else {
                item.metadata().map(|m| m.len()).unwrap_or(0)
            };
            sink.add_object(
                name,
                FsEntry {
                    path: item.into_path(),
                    is_dir,
                    len,
                },
            );
        }
        Ok(())
    }
}

/// Register the directory adapter for directories and files.
pub fn register_fs_adapter(registry: &AdapterRegistry, show_hidden: bool) {
    let adapter: Arc<dyn NodeAdapter> = Arc::new(DirectoryAdapter::new(show_hidden));
    registry.register_adapter(adapter.clone(), &directory_type());
    registry.register_adapter(adapter, &file_type());
}
