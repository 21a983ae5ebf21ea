//! Plain-text rendering of a tree.

use navtree_core::{NodeId, Result};
use navtree_store::Tree;

/// Indented outline of the tree, populating nodes as it goes. Composite
/// nodes are marked `+`, others `-`.
pub fn render(tree: &mut Tree, max_depth: Option<usize>) -> Result<String> {
    let mut out = tree.display_name(NodeId::ROOT)?;
    out.push('\n');
    render_children(tree, NodeId::ROOT, 1, max_depth, &mut out)?;
    Ok(out)
}

fn render_children(
    tree: &mut Tree,
    id: NodeId,
    depth: usize,
    max_depth: Option<usize>,
    out: &mut String,
) -> Result<()> {
    if max_depth.is_some_and(|max| depth > max) {
        return Ok(());
    }
    for child in tree.child_nodes(id)? {
        let marker = if tree.allows_children(child) { '+' } else { '-' };
        out.push_str(&"  ".repeat(depth - 1));
        out.push(marker);
        out.push(' ');
        out.push_str(&tree.display_name(child)?);
        out.push('\n');
        render_children(tree, child, depth + 1, max_depth, out)?;
    }
    Ok(())
}
