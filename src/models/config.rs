//! Application configuration structures.

use std::fs;
use std::path::Path;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Recurring task settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Rules that decide which content is ignored when fingerprinting
    #[serde(default)]
    pub fingerprint: VolatileRules,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if self.crawler.max_pages == 0 {
            return Err(AppError::validation("crawler.max_pages must be > 0"));
        }
        if self.crawler.crawl_timeout_secs == 0 {
            return Err(AppError::validation(
                "crawler.crawl_timeout_secs must be > 0",
            ));
        }
        if self.scheduler.default_interval_secs == 0 {
            return Err(AppError::validation(
                "scheduler.default_interval_secs must be > 0",
            ));
        }
        self.fingerprint.validate()
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum in-flight fetches per crawl
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Default page budget
    #[serde(default = "defaults::max_pages")]
    pub max_pages: usize,

    /// Default depth budget (root is depth 0)
    #[serde(default = "defaults::max_depth")]
    pub max_depth: usize,

    /// Deadline for a whole scheduled crawl
    #[serde(default = "defaults::crawl_timeout")]
    pub crawl_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            max_pages: defaults::max_pages(),
            max_depth: defaults::max_depth(),
            crawl_timeout_secs: defaults::crawl_timeout(),
        }
    }
}

/// Recurring task settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Interval used when a task is created without one
    #[serde(default = "defaults::interval")]
    pub default_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: defaults::interval(),
        }
    }
}

/// Versioned set of rules describing volatile page content.
///
/// Changing any rule changes which edits count as a content change, so the
/// `version` should be bumped alongside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatileRules {
    #[serde(default = "defaults::rules_version")]
    pub version: u32,

    /// Subtrees that never carry content (scripts, styles, meta tags)
    #[serde(default = "defaults::strip_selectors")]
    pub strip_selectors: Vec<String>,

    /// Elements whose content changes between fetches of an unchanged page
    #[serde(default = "defaults::volatile_selectors")]
    pub volatile_selectors: Vec<String>,

    /// Attributes kept on surviving elements; everything else is dropped
    #[serde(default = "defaults::allowed_attributes")]
    pub allowed_attributes: Vec<String>,

    /// Text patterns erased from the normalized markup
    #[serde(default = "defaults::text_patterns")]
    pub text_patterns: Vec<TextPattern>,
}

impl VolatileRules {
    /// Check that every selector and pattern compiles.
    pub fn validate(&self) -> Result<()> {
        if self.version == 0 {
            return Err(AppError::validation("fingerprint.version must be > 0"));
        }
        for s in self.strip_selectors.iter().chain(&self.volatile_selectors) {
            Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))?;
        }
        for p in &self.text_patterns {
            Regex::new(&p.pattern)?;
        }
        Ok(())
    }
}

impl Default for VolatileRules {
    fn default() -> Self {
        Self {
            version: defaults::rules_version(),
            strip_selectors: defaults::strip_selectors(),
            volatile_selectors: defaults::volatile_selectors(),
            allowed_attributes: defaults::allowed_attributes(),
            text_patterns: defaults::text_patterns(),
        }
    }
}

/// A regex whose matches are erased before hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPattern {
    /// Pattern name for identification
    pub name: String,

    /// Regular expression
    pub pattern: String,

    /// Only erase matches that mix letters and digits
    #[serde(default)]
    pub mixed_alphanumeric: bool,
}

mod defaults {
    use super::TextPattern;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; sitewatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        5
    }
    pub fn max_concurrent() -> usize {
        4
    }
    pub fn max_pages() -> usize {
        30
    }
    pub fn max_depth() -> usize {
        3
    }
    pub fn crawl_timeout() -> u64 {
        300
    }

    // Scheduler defaults
    pub fn interval() -> u64 {
        3600
    }

    // Fingerprint defaults
    pub fn rules_version() -> u32 {
        1
    }
    pub fn strip_selectors() -> Vec<String> {
        ["script", "style", "noscript", "meta"]
            .into_iter()
            .map(String::from)
            .collect()
    }
    pub fn volatile_selectors() -> Vec<String> {
        [
            // Dates and clocks
            "time",
            "[datetime]",
            ".timestamp",
            ".date",
            "[class*='timestamp']",
            "[class*='last-updated']",
            // Session, CSRF and tracking carriers
            "[name*='csrf']",
            "[data-csrf]",
            "[data-session]",
            "[data-session-id]",
            "[data-token]",
            "[data-tracking]",
            "[data-analytics]",
            // Ads and analytics
            ".ad",
            ".ads",
            ".advert",
            ".advertisement",
            "[class^='ad-']",
            "[id^='ad-']",
            "[id^='google_ads']",
            "[data-ad-slot]",
            "ins.adsbygoogle",
            "[class*='analytics']",
            // Social widgets and comments
            "iframe",
            ".social",
            ".share",
            "[class*='social-']",
            "[class*='share-']",
            ".comments",
            "#comments",
            "[class*='comment-list']",
            // Live counters
            "[class*='counter']",
            "[class*='view-count']",
            "[class*='hit-count']",
            // Form controls
            "form",
            "input",
            "textarea",
            "select",
            "button",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn allowed_attributes() -> Vec<String> {
        ["href", "src", "alt", "title"]
            .into_iter()
            .map(String::from)
            .collect()
    }
    pub fn text_patterns() -> Vec<TextPattern> {
        vec![
            TextPattern {
                name: "iso8601".into(),
                pattern: r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?"
                    .into(),
                mixed_alphanumeric: false,
            },
            TextPattern {
                name: "hex_token".into(),
                pattern: r"\b[0-9a-fA-F]{32,}\b".into(),
                mixed_alphanumeric: false,
            },
            TextPattern {
                name: "opaque_token".into(),
                pattern: r"\b[A-Za-z0-9]{20,}\b".into(),
                mixed_alphanumeric: true,
            },
        ]
    }
}
