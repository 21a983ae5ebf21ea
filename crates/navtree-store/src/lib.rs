//! navtree store - lazily populated node trees driven by notifications

pub mod config;
pub mod extension;
pub mod forest;
pub mod node;
pub mod persist;
pub mod queue;
pub mod selection;
pub mod sort;
pub mod store;
pub mod view;

pub use config::{NavtreeConfig, SortingConfig};
pub use extension::{Cached, SideTable, Tag};
pub use forest::{Forest, DEFAULT_TREE};
pub use node::{Node, NodeListener, PopulationState};
pub use persist::{NodeRecord, TreeState};
pub use queue::{NotificationQueue, TreeHandle};
pub use selection::SelectionTracker;
pub use sort::{
    join_spec, parse_spec, CompositeComparator, NodeSorter, SortEngine, SortEntry, ALPHABETICAL,
    ALPHA_NUMERICAL, DEFAULT_ORDER, FOLDERS_FIRST,
};
pub use store::{RenameOutcome, RenameRejection, SelectionOutcome, Tree, TreeBuilder};
pub use view::{DetachedView, TreeView, ViewEvent, ViewLog};
