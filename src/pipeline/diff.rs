//! Change detection between two crawls of the same site.
//!
//! Compares the fingerprint map of a new crawl against the baseline carried
//! from the previous run. Pages whose fingerprint differs count as changed and
//! pages absent from the baseline count as added. Pages that disappeared are
//! reported but do not by themselves mean the site changed, since a crawl that
//! hit its budget earlier may simply not have reached them.

use serde::{Deserialize, Serialize};

use crate::models::FingerprintMap;

/// Differences between a baseline and a fresh fingerprint map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// In both maps with different fingerprints
    pub changed: Vec<String>,
    /// Only in the new map
    pub added: Vec<String>,
    /// Only in the baseline
    pub removed: Vec<String>,
}

impl ChangeSet {
    /// Whether the site's content changed since the baseline.
    pub fn anything_changed(&self) -> bool {
        !self.changed.is_empty() || !self.added.is_empty()
    }

    /// Get the total number of differences, removals included.
    pub fn change_count(&self) -> usize {
        self.changed.len() + self.added.len() + self.removed.len()
    }
}

/// Compute the differences from `previous` to `current`.
pub fn detect_changes(previous: &FingerprintMap, current: &FingerprintMap) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (url, fingerprint) in current {
        match previous.get(url) {
            Some(old) if old != fingerprint => changes.changed.push(url.clone()),
            Some(_) => {}
            None => changes.added.push(url.clone()),
        }
    }

    changes.removed = previous
        .keys()
        .filter(|url| !current.contains_key(*url))
        .cloned()
        .collect();

    changes
}
