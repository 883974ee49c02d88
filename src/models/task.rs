//! Recurring crawl task records.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Config, CrawlStats, CrawlerConfig, FingerprintMap};

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters for creating a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub base_url: String,

    /// URLs containing any of these substrings are never crawled
    #[serde(default)]
    pub avoid: Vec<String>,

    pub max_pages: usize,

    pub max_depth: usize,

    /// Total body bytes a single crawl may download
    #[serde(default)]
    pub max_bytes: Option<u64>,

    pub interval_secs: u64,
}

impl TaskSpec {
    /// Build a spec with the built-in default depth and no byte budget.
    ///
    /// Use [`TaskSpec::from_config`] to honor a loaded configuration.
    pub fn new(
        base_url: impl Into<String>,
        avoid: Vec<String>,
        max_pages: usize,
        interval_secs: u64,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            avoid,
            max_pages,
            max_depth: CrawlerConfig::default().max_depth,
            max_bytes: None,
            interval_secs,
        }
    }

    /// Build a spec whose budgets and interval come from `config`.
    pub fn from_config(base_url: impl Into<String>, config: &Config) -> Self {
        Self {
            base_url: base_url.into(),
            avoid: Vec::new(),
            max_pages: config.crawler.max_pages,
            max_depth: config.crawler.max_depth,
            max_bytes: None,
            interval_secs: config.scheduler.default_interval_secs,
        }
    }

    pub fn with_avoid(mut self, avoid: Vec<String>) -> Self {
        self.avoid = avoid;
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_interval(mut self, interval_secs: u64) -> Self {
        self.interval_secs = interval_secs;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }
}

/// Outcome of the most recent execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskStatus {
    /// Never executed
    Pending,
    Completed,
    Error { message: String },
}

impl TaskStatus {
    pub fn is_error(&self) -> bool {
        matches!(self, TaskStatus::Error { .. })
    }
}

/// State of one recurring task.
///
/// `output` and `fingerprints` are replaced only by a successful run that
/// detected a change; otherwise the previous `Arc`s are kept as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub spec: TaskSpec,
    pub status: TaskStatus,

    /// Last rendered summary of the site
    pub output: Option<Arc<String>>,

    /// Baseline for the next run's change detection
    pub fingerprints: Arc<FingerprintMap>,

    pub created_at: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub last_changed: Option<DateTime<Utc>>,
    pub last_stats: Option<CrawlStats>,
}

impl TaskRecord {
    pub fn new(id: TaskId, spec: TaskSpec, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            spec,
            status: TaskStatus::Pending,
            output: None,
            fingerprints: Arc::new(FingerprintMap::new()),
            created_at,
            last_run: None,
            last_changed: None,
            last_stats: None,
        }
    }
}
