//! Object provider adapter - backs `register_object_provider`

use crate::capability::ObjectProvider;
use crate::registry::NodeAdapter;
use navtree_core::NodeInfo;
use std::sync::Arc;

/// Wraps an [`ObjectProvider`] as an adapter with a fixed priority.
pub struct ObjectProviderAdapter {
    provider: Arc<dyn ObjectProvider>,
    priority: i32,
}

impl ObjectProviderAdapter {
    pub fn new(provider: Arc<dyn ObjectProvider>, priority: i32) -> Self {
        Self { provider, priority }
    }
}

impl NodeAdapter for ObjectProviderAdapter {
    fn priority(&self, _tree: &str) -> i32 { self.priority }

    fn name(&self) -> &str { "object-provider" }

    fn object_provider(&self, _node: &NodeInfo) -> Option<Arc<dyn ObjectProvider>> {
        Some(self.provider.clone())
    }
}
