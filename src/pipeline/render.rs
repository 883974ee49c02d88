//! Markdown summary of a crawled site.
//!
//! Only the root, its children and its grandchildren are rendered:
//!
//! ```text
//! # <root title>
//! > <root description>
//! ## <child title>
//! - [<child title>](<child url>): <child description>
//! - [<grandchild title>](<grandchild url>): <grandchild description>
//! ```
//!
//! Nodes without a resolved title are skipped together with everything below
//! them.

use std::fmt::Write as _;

use crate::models::{NodeId, PageNode, PageTree};

/// Render the tree. An unresolved root renders as an empty string.
pub fn render_tree(tree: &PageTree) -> String {
    let root = tree.root();
    let Some(title) = &root.title else {
        return String::new();
    };

    let mut out = String::new();
    let _ = writeln!(out, "# {}", title);
    let _ = writeln!(out, "> {}", root.description.as_deref().unwrap_or(""));

    for child in tree.children(NodeId::ROOT) {
        let Some(child_title) = &child.title else {
            continue;
        };
        let _ = writeln!(out, "## {}", child_title);
        write_link(&mut out, child);

        for grandchild in child.children.iter().filter_map(|id| tree.get(*id)) {
            if grandchild.is_resolved() {
                write_link(&mut out, grandchild);
            }
        }
    }

    out
}

fn write_link(out: &mut String, node: &PageNode) {
    let _ = writeln!(
        out,
        "- [{}]({}): {}",
        node.title.as_deref().unwrap_or(""),
        node.url,
        node.description.as_deref().unwrap_or("")
    );
}
