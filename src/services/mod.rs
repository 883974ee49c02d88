//! Service layer for the site watcher.
//!
//! This module contains the business logic for:
//! - Page metadata extraction (`metadata`)
//! - Content fingerprinting (`Fingerprinter`)
//! - Site traversal (`SiteCrawler`)

pub mod crawler;
pub mod fingerprint;
pub mod metadata;

pub use crawler::{CrawlOptions, SiteCrawler};
pub use fingerprint::{Fingerprinter, fingerprint};
