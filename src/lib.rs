// src/lib.rs

//! sitewatch Library
//!
//! Crawls a site breadth-first, fingerprints each page's meaningful content,
//! and reruns crawls on a schedule to report when that content changes.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod scheduler;
pub mod services;
pub mod utils;
