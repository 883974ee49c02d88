// src/error.rs

//! Unified error handling for the site watcher.

use std::fmt;

use thiserror::Error;

use crate::models::TaskId;

/// Result type alias for site watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Regular expression failed to compile
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A page could not be used (network failure, bad status, wrong content type)
    #[error("Fetch error for {url}: {message}")]
    Fetch { url: String, message: String },

    /// No task registered under the id
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// The task already has an execution in progress
    #[error("Task {0} is already running")]
    TaskBusy(TaskId),

    /// The task manager no longer accepts tasks
    #[error("Task manager is shut down")]
    ShutDown,

    /// The crawl was cancelled before it finished
    #[error("Crawl cancelled")]
    Cancelled,

    /// The crawl exceeded its deadline
    #[error("Crawl timed out after {0}s")]
    Timeout(u64),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a fetch error for a URL.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.to_string(),
        }
    }
}
