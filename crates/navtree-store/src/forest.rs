//! Named trees sharing one adapter registry and one sort engine.

use crate::config::NavtreeConfig;
use crate::sort::SortEngine;
use crate::store::Tree;
use navtree_adapters::AdapterRegistry;
use navtree_core::{NodeId, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Name of the tree a host shows when it only has one.
pub const DEFAULT_TREE: &str = "Navigation";

pub struct Forest {
    registry: Arc<AdapterRegistry>,
    sorter: Arc<SortEngine>,
    config: NavtreeConfig,
    trees: BTreeMap<String, Tree>,
}

impl Forest {
    /// A forest with the built-in adapters and sorters.
    pub fn new(config: NavtreeConfig) -> Self {
        Self::with_parts(
            Arc::new(AdapterRegistry::with_builtins()),
            Arc::new(SortEngine::with_builtins()),
            config,
        )
    }

    pub fn with_parts(registry: Arc<AdapterRegistry>, sorter: Arc<SortEngine>, config: NavtreeConfig) -> Self {
        Self {
            registry,
            sorter,
            config,
            trees: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> { &self.registry }

    pub fn sort_engine(&self) -> &Arc<SortEngine> { &self.sorter }

    pub fn config(&self) -> &NavtreeConfig { &self.config }

    /// The tree called `name`, created with the configured sorting if needed.
    pub fn tree(&mut self, name: &str) -> &mut Tree {
        let registry = &self.registry;
        let sorter = &self.sorter;
        let config = &self.config;
        self.trees.entry(name.to_string()).or_insert_with(|| {
            let sorting = config.sorting_for(name);
            info!(tree = name, "creating tree");
            Tree::builder(name)
                .registry(registry.clone())
                .sort_engine(sorter.clone())
                .sorting(sorting.algorithm.clone(), sorting.recursive)
                .build()
        })
    }

    pub fn get(&self, name: &str) -> Option<&Tree> { self.trees.get(name) }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tree> { self.trees.get_mut(name) }

    pub fn remove(&mut self, name: &str) -> Option<Tree> { self.trees.remove(name) }

    pub fn names(&self) -> Vec<&str> { self.trees.keys().map(String::as_str).collect() }

    /// Sort the root of `name` and remember the choice in the configuration.
    pub fn set_tree_sorting(&mut self, name: &str, spec: &str, recursive: bool) -> Result<()> {
        self.tree(name).apply_sorting(NodeId::ROOT, spec, recursive)?;
        self.config.set_tree_sorting(name, spec, recursive);
        Ok(())
    }
}
