// src/models/mod.rs

//! Domain models for the site watcher.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod page;
mod task;

// Re-export all public types
pub use config::{Config, CrawlerConfig, SchedulerConfig, TextPattern, VolatileRules};
pub use page::{CrawlResult, CrawlStats, FingerprintMap, NodeId, PageNode, PageTree};
pub use task::{TaskId, TaskRecord, TaskSpec, TaskStatus};
