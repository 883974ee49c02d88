//! Page tree produced by a crawl.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Canonical URL to content fingerprint.
pub type FingerprintMap = BTreeMap<String, String>;

/// Stable index of a node inside a [`PageTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// The root node of every tree.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

/// A page discovered during a crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    /// Canonical URL (`scheme://host/path`)
    pub url: String,

    /// Resolved title; `None` until the page is fetched successfully
    pub title: Option<String>,

    pub description: Option<String>,

    /// Hops from the root
    pub depth: usize,

    pub fingerprint: Option<String>,

    /// Fingerprint matched the baseline carried from the previous crawl
    #[serde(default)]
    pub unchanged: bool,

    /// Children in discovery order
    pub children: Vec<NodeId>,
}

impl PageNode {
    fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            title: None,
            description: None,
            depth,
            fingerprint: None,
            unchanged: false,
            children: Vec::new(),
        }
    }

    /// Whether the page was fetched and its metadata resolved.
    pub fn is_resolved(&self) -> bool {
        self.title.is_some()
    }
}

/// Arena of page nodes; each node is owned by exactly one parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTree {
    nodes: Vec<PageNode>,
}

impl PageTree {
    /// Create a tree holding only an unresolved root.
    pub fn new(root_url: impl Into<String>) -> Self {
        Self {
            nodes: vec![PageNode::new(root_url.into(), 0)],
        }
    }

    pub fn root(&self) -> &PageNode {
        &self.nodes[NodeId::ROOT.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&PageNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut PageNode> {
        self.nodes.get_mut(id.0)
    }

    /// Append a new child under `parent` and return its id.
    ///
    /// Returns `None` if `parent` is not part of this tree.
    pub fn add_child(&mut self, parent: NodeId, url: impl Into<String>) -> Option<NodeId> {
        let depth = self.nodes.get(parent.0)?.depth + 1;
        let id = NodeId(self.nodes.len());
        self.nodes.push(PageNode::new(url.into(), depth));
        self.nodes[parent.0].children.push(id);
        Some(id)
    }

    /// Children of a node, in discovery order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &PageNode> + '_ {
        self.get(id)
            .into_iter()
            .flat_map(|node| node.children.iter())
            .filter_map(|child| self.get(*child))
    }

    /// All nodes in insertion (breadth-first) order.
    pub fn iter(&self) -> impl Iterator<Item = &PageNode> + '_ {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Deepest node depth in the tree.
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }
}

/// Counters for a single crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    /// Pages fetched and resolved
    pub fetched: usize,
    /// Pages that failed to fetch or were not HTML
    pub abandoned: usize,
    /// Fetched pages whose fingerprint matched the baseline
    pub unchanged: usize,
    /// Nodes created, including the root
    pub discovered: usize,
}

/// Output of one crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub tree: PageTree,

    /// Fingerprints of the pages fetched during this crawl only
    pub fingerprints: FingerprintMap,

    pub stats: CrawlStats,
}

impl CrawlResult {
    /// A crawl that never resolved its root.
    pub fn unresolved(root_url: impl Into<String>) -> Self {
        Self {
            tree: PageTree::new(root_url),
            fingerprints: FingerprintMap::new(),
            stats: CrawlStats {
                discovered: 1,
                ..CrawlStats::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_child_sets_depth_and_order() {
        let mut tree = PageTree::new("https://example.com/");
        let a = tree.add_child(NodeId::ROOT, "https://example.com/a").unwrap();
        let b = tree.add_child(NodeId::ROOT, "https://example.com/b").unwrap();
        let c = tree.add_child(a, "https://example.com/c").unwrap();

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.root().children, vec![a, b]);
        assert_eq!(tree.get(c).unwrap().depth, 2);
        assert_eq!(tree.max_depth(), 2);

        let urls: Vec<_> = tree.children(a).map(|n| n.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/c"]);
    }

    #[test]
    fn test_add_child_to_unknown_parent() {
        let mut tree = PageTree::new("https://example.com/");
        assert!(tree.add_child(NodeId(7), "https://example.com/x").is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_unresolved_result() {
        let result = CrawlResult::unresolved("not a url");
        assert!(!result.tree.root().is_resolved());
        assert!(result.fingerprints.is_empty());
        assert_eq!(result.stats.discovered, 1);
    }
}
