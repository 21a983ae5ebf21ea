//! Error types for navtree

use crate::types::{NodeId, NodePath};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("node {0} already exists")]
    NodeExists(NodePath),

    #[error("node not found: {0}")]
    NodeNotFound(NodePath),

    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("cannot add nodes to {0}: it doesn't allow children")]
    ChildrenNotAllowed(NodePath),

    #[error("cannot move {from} to {to}: {reason}")]
    InvalidMove {
        from: NodePath,
        to: NodePath,
        reason: String,
    },

    #[error("the root node cannot be {0}")]
    RootImmutable(&'static str),

    #[error("structure provider of {parent} rejected {op} of {name}")]
    ProviderRejected {
        parent: NodePath,
        name: String,
        op: &'static str,
    },

    #[error("unsupported notification kind: {0}")]
    UnsupportedNotification(String),

    #[error("no {capability} adapter available for type {node_type}")]
    NoAdapter {
        capability: &'static str,
        node_type: String,
    },

    #[error("adapter error: {adapter} - {message}")]
    Adapter { adapter: String, message: String },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("unknown node type: {0}")]
    UnknownType(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("json error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn adapter(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    pub fn no_adapter(capability: &'static str, node_type: impl Into<String>) -> Self {
        Self::NoAdapter {
            capability,
            node_type: node_type.into(),
        }
    }

    pub fn invalid_move(from: &NodePath, to: &NodePath, reason: impl Into<String>) -> Self {
        Self::InvalidMove {
            from: from.clone(),
            to: to.clone(),
            reason: reason.into(),
        }
    }

    /// True for errors that indicate a producer or registration bug rather
    /// than an environment failure.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            Self::IoError(_) | Self::JsonError(_) | Self::ConfigError(_)
        )
    }
}
