//! Replaying serialized notification scripts
//!
//! A script holds one JSON notification per line; blank lines and lines
//! starting with `#` are skipped. Notifications are submitted from a producer
//! task while the tree's owner loop applies them.

use anyhow::Context;
use navtree_core::{parse_notification, Notification, TypeCatalog};
use navtree_store::Tree;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Declare types given as `name` or `name=parent1,parent2`.
pub fn declare_types(catalog: &mut TypeCatalog, specs: &[String]) -> anyhow::Result<()> {
    for spec in specs {
        let (name, parents) = match spec.split_once('=') {
            Some((name, parents)) => (name.trim(), parents.split(',').map(str::trim).collect::<Vec<_>>()),
            None => (spec.trim(), Vec::new()),
        };
        catalog
            .declare(name, &parents)
            .with_context(|| format!("declaring type {spec}"))?;
    }
    Ok(())
}

pub fn parse_script(script: &str, catalog: &TypeCatalog) -> anyhow::Result<Vec<Notification>> {
    let mut out = Vec::new();
    for (index, line) in script.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let notification =
            parse_notification(line, catalog).with_context(|| format!("line {}", index + 1))?;
        out.push(notification);
    }
    Ok(out)
}

/// Apply `notifications` through the tree's handle and owner loop.
pub async fn replay(mut tree: Tree, notifications: Vec<Notification>) -> anyhow::Result<Tree> {
    let count = notifications.len();
    let handle = tree.handle();
    let cancel = CancellationToken::new();

    let owner_cancel = cancel.clone();
    let owner = tokio::spawn(async move {
        let result = tree.run(owner_cancel).await;
        (tree, result)
    });

    let producer = tokio::spawn(async move {
        for notification in notifications {
            handle.tree_changed(notification);
            tokio::task::yield_now().await;
        }
    });
    producer.await?;
    cancel.cancel();

    let (mut tree, result) = owner.await?;
    result?;
    tree.drain()?;
    info!(tree = tree.name(), count, nodes = tree.len(), "replay finished");
    Ok(tree)
}
