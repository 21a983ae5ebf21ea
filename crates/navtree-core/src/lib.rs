//! navtree core - node identity, type hierarchy, notifications and errors

pub mod error;
pub mod protocol;
pub mod types;

pub use error::{Error, Result};
pub use protocol::*;
pub use types::*;
