//! Pipeline entry points for crawl operations.
//!
//! - `run_crawl`: Crawl a site once
//! - `detect_changes`: Compare two fingerprint maps
//! - `render_tree`: Summarize a crawled tree as Markdown

pub mod crawl;
pub mod diff;
pub mod render;

pub use crawl::{build_crawler, run_crawl};
pub use diff::{ChangeSet, detect_changes};
pub use render::render_tree;
