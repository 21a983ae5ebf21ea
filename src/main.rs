//! navtree - inspect and drive navigation trees from the command line
//!
//! Usage:
//!   navtree replay script.jsonl                  → apply a notification script, print the tree
//!   navtree replay script.jsonl --state out.json → also save expansion/selection state
//!   navtree scan ~/src --depth 2                 → browse a directory as a lazily populated tree
//!   navtree sorters                              → list the registered sort algorithms
//!   navtree config                               → print the effective configuration

use anyhow::Context;
use clap::{Parser, Subcommand};
use navtree::fs_adapter::{register_fs_adapter, FsEntry};
use navtree_adapters::AdapterRegistry;
use navtree_core::{NodePath, Notification, TypeCatalog};
use navtree_store::{NavtreeConfig, SortEngine, Tree, TreeState, DEFAULT_TREE};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "navtree",
    about = "Hierarchical navigation trees with lazy population and pluggable sorting",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to a file as JSON lines (in addition to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a script of JSON notifications (one per line) to a fresh tree
    Replay {
        script: PathBuf,

        /// Tree name
        #[arg(long, default_value = DEFAULT_TREE)]
        tree: String,

        /// Declare a node type: NAME or NAME=PARENT1,PARENT2
        #[arg(long = "declare")]
        declare: Vec<String>,

        /// Sort specification for the root, e.g. "Folders first:Alphabetical"
        #[arg(long)]
        sort: Option<String>,

        /// Restore expansion and selection from a saved state after replay
        #[arg(long)]
        restore: Option<PathBuf>,

        /// Save expansion and selection state after replay
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Browse a directory as a tree
    Scan {
        dir: PathBuf,

        /// Maximum depth to print
        #[arg(long, default_value_t = 1)]
        depth: usize,

        /// Sort specification for all directories
        #[arg(long)]
        sort: Option<String>,

        /// Include entries whose name starts with a dot
        #[arg(long, default_value_t = false)]
        hidden: bool,
    },
    /// List the sort algorithms
    Sorters,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref());

    let config = match &cli.config {
        Some(path) => NavtreeConfig::load(path),
        None => NavtreeConfig::default(),
    };

    match cli.command {
        Commands::Replay {
            script,
            tree,
            declare,
            sort,
            restore,
            state,
        } => {
            let mut catalog = TypeCatalog::new();
            navtree::declare_types(&mut catalog, &declare)?;
            let text = std::fs::read_to_string(&script)
                .with_context(|| format!("reading {}", script.display()))?;
            let notifications = navtree::parse_script(&text, &catalog)?;

            let sorting = config.sorting_for(&tree);
            let tree = Tree::builder(tree.as_str())
                .sorting(sort.unwrap_or_else(|| sorting.algorithm.clone()), sorting.recursive)
                .build();
            let mut tree = navtree::replay(tree, notifications).await?;

            if let Some(path) = restore {
                let saved = TreeState::load(&path)?;
                tree.restore_state(&saved)?;
            }
            print!("{}", navtree::render(&mut tree, None)?);
            if let Some(path) = state {
                tree.save_state()?.save(&path)?;
                println!("state saved to {}", path.display());
            }
        }
        Commands::Scan {
            dir,
            depth,
            sort,
            hidden,
        } => {
            let dir = dir
                .canonicalize()
                .with_context(|| format!("resolving {}", dir.display()))?;
            let registry = Arc::new(AdapterRegistry::with_builtins());
            register_fs_adapter(&registry, hidden);

            let sorting = config.sorting_for(DEFAULT_TREE);
            let mut tree = Tree::builder(DEFAULT_TREE)
                .registry(registry)
                .sorting(sort.unwrap_or_else(|| sorting.algorithm.clone()), true)
                .build();

            let name = dir
                .file_name()
                .unwrap_or_else(|| OsStr::new("root"))
                .to_string_lossy()
                .into_owned();
            let path = NodePath::root().child(name);
            tree.tree_changed(Notification::added_object(path, FsEntry::directory(&dir)))?;
            print!("{}", navtree::render(&mut tree, Some(depth + 1))?);
        }
        Commands::Sorters => {
            for (name, description) in SortEngine::with_builtins().algorithms() {
                if description.is_empty() {
                    println!("{name}");
                } else {
                    println!("{name:<20} {description}");
                }
            }
        }
        Commands::Config => {
            print!("{}", config.to_toml());
        }
    }
    Ok(())
}

/// Stderr logging, plus a JSON file layer when `log_file` is given. The
/// returned guard flushes the file writer on drop.
fn init_tracing(log_file: Option<&Path>) -> Option<WorkerGuard> {
    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navtree=info,navtree_store=info,navtree_adapters=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    let Some(path) = log_file else {
        registry.init();
        return None;
    };
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file = path.file_name().unwrap_or_else(|| OsStr::new("navtree.log"));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));
    registry
        .with(tracing_subscriber::fmt::layer().json().with_ansi(false).with_writer(writer))
        .init();
    Some(guard)
}
