//! navtree - command-line front end and filesystem adapter for navtree trees

pub mod fs_adapter;
pub mod render;
pub mod replay;

pub use fs_adapter::{register_fs_adapter, DirectoryAdapter, FsEntry};
pub use render::render;
pub use replay::{declare_types, parse_script, replay};
