// src/utils/http.rs

//! HTTP client utilities and the page fetching seam used by the crawler.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Raw response for a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    /// A 200 response with an HTML content type.
    pub fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: Some("text/html; charset=utf-8".to_string()),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the declared content type is HTML or XHTML.
    pub fn is_html(&self) -> bool {
        self.content_type.as_deref().is_some_and(|ct| {
            let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "text/html" || mime == "application/xhtml+xml"
        })
    }

    /// Reject responses the crawler cannot use.
    pub fn ensure_usable(&self, url: &str) -> Result<()> {
        if !self.is_success() {
            return Err(AppError::fetch(url, format!("status {}", self.status)));
        }
        if !self.is_html() {
            return Err(AppError::fetch(
                url,
                format!(
                    "unsupported content type {}",
                    self.content_type.as_deref().unwrap_or("<none>")
                ),
            ));
        }
        Ok(())
    }
}

/// Source of pages for a crawl.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a page. Transport failures are errors; HTTP error statuses are not.
    /// The body is only read for successful HTML responses.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;
}

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// [`PageFetcher`] backed by `reqwest`, with a per-request timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self::with_client(create_async_client(config)?))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut page = FetchedPage {
            status,
            content_type,
            body: String::new(),
        };
        // Bodies the crawler would discard are never downloaded.
        if page.is_success() && page.is_html() {
            page.body = response.text().await?;
        }
        Ok(page)
    }
}
