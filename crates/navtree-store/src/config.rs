//! Sorting preferences
//!
//! ```toml
//! [sorting]
//! algorithm = "Folders first:Alphabetical"
//! recursive = true
//!
//! [trees.Navigation]
//! algorithm = "Alpha-numerical"
//! recursive = false
//! ```

use crate::sort::DEFAULT_ORDER;
use navtree_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavtreeConfig {
    /// Sorting of trees without an override.
    pub sorting: SortingConfig,
    /// Per-tree overrides, keyed by tree name.
    pub trees: BTreeMap<String, SortingConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SortingConfig {
    pub algorithm: String,
    pub recursive: bool,
}

impl Default for NavtreeConfig {
    fn default() -> Self {
        Self {
            sorting: SortingConfig::default(),
            trees: BTreeMap::new(),
        }
    }
}

impl Default for SortingConfig {
    fn default() -> Self {
        Self {
            algorithm: DEFAULT_ORDER.to_string(),
            recursive: true,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl NavtreeConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {} - using defaults", path.display());
                Self::default()
            }
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::ConfigError(e.to_string()))?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Sorting preference for `tree`: its override, else the global one.
    pub fn sorting_for(&self, tree: &str) -> &SortingConfig {
        self.trees.get(tree).unwrap_or(&self.sorting)
    }

    pub fn set_tree_sorting(&mut self, tree: &str, algorithm: impl Into<String>, recursive: bool) {
        self.trees.insert(
            tree.to_string(),
            SortingConfig {
                algorithm: algorithm.into(),
                recursive,
            },
        );
    }
}
