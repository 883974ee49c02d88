// src/services/crawler.rs

//! Site crawler service.
//!
//! Breadth-first traversal of a single site. Pages are fetched in small
//! batches bounded by `max_concurrent`, but their results are applied to the
//! tree one at a time in frontier order, so the resulting tree is the same as
//! a sequential crawl would produce.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, LazyLock};

use futures::stream::{self, StreamExt};
use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, Result};
use crate::models::{CrawlResult, CrawlStats, CrawlerConfig, FingerprintMap, NodeId, PageTree, TaskSpec};
use crate::services::Fingerprinter;
use crate::services::metadata;
use crate::utils::http::{FetchedPage, PageFetcher};
use crate::utils::url::{canonicalize, resolve, same_site};

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// Budgets and filters for one crawl.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOptions {
    /// Maximum number of pages fetched successfully
    pub max_pages: usize,
    /// Pages at this depth are fetched but not expanded
    pub max_depth: usize,
    /// Stop once this many body bytes have been downloaded
    pub max_bytes: Option<u64>,
    /// URLs containing any of these substrings are skipped
    pub avoid: Vec<String>,
}

impl CrawlOptions {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            max_pages: config.max_pages,
            max_depth: config.max_depth,
            max_bytes: None,
            avoid: Vec::new(),
        }
    }

    pub fn from_spec(spec: &TaskSpec) -> Self {
        Self {
            max_pages: spec.max_pages,
            max_depth: spec.max_depth,
            max_bytes: spec.max_bytes,
            avoid: spec.avoid.clone(),
        }
    }

    fn is_avoided(&self, url: &str) -> bool {
        self.avoid
            .iter()
            .any(|pattern| !pattern.is_empty() && url.contains(pattern.as_str()))
    }
}

/// What a single fetched page contributes to the crawl.
#[derive(Debug, Clone)]
struct PageAnalysis {
    title: String,
    description: String,
    fingerprint: String,
    links: Vec<String>,
}

/// Breadth-first crawler over one registrable domain.
pub struct SiteCrawler {
    fetcher: Arc<dyn PageFetcher>,
    fingerprinter: Arc<Fingerprinter>,
    max_concurrent: usize,
}

impl SiteCrawler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        fingerprinter: Arc<Fingerprinter>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            fetcher,
            fingerprinter,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Crawl the site rooted at `base_url`.
    ///
    /// Pages whose fingerprint equals their `baseline` entry are flagged as
    /// unchanged and only followed to links the baseline already holds. Failed pages stay in the tree without a title. Only
    /// cancellation makes this return an error.
    pub async fn crawl(
        &self,
        base_url: &str,
        options: &CrawlOptions,
        baseline: &FingerprintMap,
        cancel: &CancellationToken,
    ) -> Result<CrawlResult> {
        let Some(root_url) = canonicalize(base_url) else {
            log::warn!("Skipping crawl of malformed base URL {:?}", base_url);
            return Ok(CrawlResult::unresolved(base_url.trim()));
        };

        log::info!(
            "Crawling {} (max {} pages, depth {})",
            root_url,
            options.max_pages,
            options.max_depth
        );

        let mut tree = PageTree::new(root_url.clone());
        let mut visited = HashSet::from([root_url.clone()]);
        let mut frontier = VecDeque::from([(NodeId::ROOT, root_url.clone())]);
        let mut fingerprints = FingerprintMap::new();
        let mut stats = CrawlStats {
            discovered: 1,
            ..CrawlStats::default()
        };
        let mut bytes: u64 = 0;

        'crawl: while !frontier.is_empty() && stats.fetched < options.max_pages {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let slots = self
                .max_concurrent
                .min(options.max_pages - stats.fetched)
                .min(frontier.len());
            let batch: Vec<_> = frontier.drain(..slots).collect();

            let fetches = stream::iter(batch)
                .map(|(id, url)| async move {
                    let response = self.fetcher.fetch(&url).await;
                    (id, url, response)
                })
                .buffered(slots)
                .collect::<Vec<_>>();

            let responses = tokio::select! {
                _ = cancel.cancelled() => return Err(AppError::Cancelled),
                responses = fetches => responses,
            };

            for (id, url, response) in responses {
                if options.max_bytes.is_some_and(|limit| bytes >= limit) {
                    log::debug!("Byte budget exhausted before {}", url);
                    break 'crawl;
                }

                let page = match response.and_then(|page| usable(page, &url)) {
                    Ok(page) => page,
                    Err(e) => {
                        log::debug!("Abandoning {}: {}", url, e);
                        stats.abandoned += 1;
                        continue;
                    }
                };
                bytes += page.body.len() as u64;

                let depth = tree.get(id).map_or(0, |node| node.depth);
                stats.fetched += 1;
                let expand = depth < options.max_depth && stats.fetched < options.max_pages;
                let analysis = self.analyze(&url, &page.body, expand);

                let unchanged = baseline.get(&url) == Some(&analysis.fingerprint);
                if unchanged {
                    stats.unchanged += 1;
                }
                fingerprints.insert(url.clone(), analysis.fingerprint.clone());

                if let Some(node) = tree.get_mut(id) {
                    node.title = Some(analysis.title);
                    node.description = Some(analysis.description);
                    node.fingerprint = Some(analysis.fingerprint);
                    node.unchanged = unchanged;
                }

                // An unchanged page only leads back to pages the baseline knows.
                for link in analysis.links {
                    if visited.contains(&link)
                        || (unchanged && !baseline.contains_key(&link))
                        || options.is_avoided(&link)
                        || !same_site(&root_url, &link)
                    {
                        continue;
                    }
                    visited.insert(link.clone());
                    if let Some(child) = tree.add_child(id, link.clone()) {
                        frontier.push_back((child, link));
                        stats.discovered += 1;
                    }
                }
            }
        }

        log::info!(
            "Crawled {}: {} fetched, {} abandoned, {} unchanged, {} discovered",
            root_url,
            stats.fetched,
            stats.abandoned,
            stats.unchanged,
            stats.discovered
        );

        Ok(CrawlResult {
            tree,
            fingerprints,
            stats,
        })
    }

    /// Extract metadata, fingerprint and (optionally) outgoing links.
    fn analyze(&self, page_url: &str, body: &str, with_links: bool) -> PageAnalysis {
        let document = Html::parse_document(body);

        let links = if with_links {
            document
                .select(&ANCHOR)
                .filter_map(|a| a.value().attr("href"))
                .filter_map(|href| resolve(page_url, href))
                .collect()
        } else {
            Vec::new()
        };

        PageAnalysis {
            title: metadata::title(&document),
            description: metadata::description(&document),
            fingerprint: self.fingerprinter.fingerprint_document(&document),
            links,
        }
    }
}

fn usable(page: FetchedPage, url: &str) -> Result<FetchedPage> {
    page.ensure_usable(url)?;
    Ok(page)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::models::VolatileRules;

    /// In-memory site keyed by exact URL.
    #[derive(Default)]
    pub(crate) struct StubFetcher {
        pages: Mutex<HashMap<String, FetchedPage>>,
        pub(crate) calls: AtomicUsize,
    }

    impl StubFetcher {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn page(self, url: &str, body: &str) -> Self {
            self.set(url, FetchedPage::html(body));
            self
        }

        pub(crate) fn set(&self, url: &str, page: FetchedPage) {
            self.pages.lock().insert(url.to_string(), page);
        }
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .lock()
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::fetch(url, "connection refused"))
        }
    }

    pub(crate) fn html(title: &str, links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|href| format!(r#"<a href="{href}">{href}</a>"#))
            .collect();
        format!("<html><head><title>{title}</title></head><body><p>{title} page. More text.</p>{anchors}</body></html>")
    }

    pub(crate) fn crawler(fetcher: Arc<StubFetcher>) -> SiteCrawler {
        let fingerprinter = Fingerprinter::new(&VolatileRules::default()).unwrap();
        SiteCrawler::new(fetcher, Arc::new(fingerprinter), 2)
    }

    fn options(max_pages: usize, max_depth: usize) -> CrawlOptions {
        CrawlOptions {
            max_pages,
            max_depth,
            max_bytes: None,
            avoid: Vec::new(),
        }
    }

    async fn run(fetcher: StubFetcher, opts: &CrawlOptions) -> CrawlResult {
        crawler(Arc::new(fetcher))
            .crawl(
                "https://x.com/",
                opts,
                &FingerprintMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap()
    }

    fn urls(result: &CrawlResult) -> Vec<&str> {
        result.tree.iter().map(|n| n.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_external_links_are_skipped() {
        let fetcher = StubFetcher::new()
            .page(
                "https://x.com/",
                &html("Home", &["/a", "https://blog.x.com/b", "https://y.org/c"]),
            )
            .page("https://x.com/a", &html("A", &[]))
            .page("https://blog.x.com/b", &html("B", &[]));

        let result = run(fetcher, &options(5, 3)).await;
        assert_eq!(result.tree.len(), 3);
        assert_eq!(
            urls(&result),
            vec!["https://x.com/", "https://x.com/a", "https://blog.x.com/b"]
        );
        assert_eq!(result.stats.fetched, 3);
        assert_eq!(result.fingerprints.len(), 3);
    }

    #[tokio::test]
    async fn test_avoid_list_blocks_links() {
        let fetcher = StubFetcher::new()
            .page("https://x.com/", &html("Home", &["/blog/post1", "/about"]))
            .page("https://x.com/blog/post1", &html("Post", &[]))
            .page("https://x.com/about", &html("About", &[]));

        let mut opts = options(10, 3);
        opts.avoid = vec!["/blog/".into()];
        let result = run(fetcher, &opts).await;

        assert_eq!(urls(&result), vec!["https://x.com/", "https://x.com/about"]);
    }

    #[tokio::test]
    async fn test_depth_budget_per_node() {
        let fetcher = StubFetcher::new()
            .page("https://x.com/", &html("Home", &["/a"]))
            .page("https://x.com/a", &html("A", &["/b"]))
            .page("https://x.com/b", &html("B", &[]));

        let result = run(fetcher, &options(10, 1)).await;
        assert_eq!(urls(&result), vec!["https://x.com/", "https://x.com/a"]);
        let a = result.tree.root().children[0];
        assert!(result.tree.get(a).unwrap().children.is_empty());
        assert!(result.tree.max_depth() <= 1);
    }

    #[tokio::test]
    async fn test_each_url_appears_once() {
        let fetcher = StubFetcher::new()
            .page("https://x.com/", &html("Home", &["/a", "/b", "/a?ref=1", "/#top"]))
            .page("https://x.com/a", &html("A", &["/b", "/", "/a"]))
            .page("https://x.com/b", &html("B", &["/a"]));

        let result = run(fetcher, &options(10, 5)).await;
        let all = urls(&result);
        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), unique.len());
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_page_budget_limits_fetches() {
        let links: Vec<String> = (0..20).map(|i| format!("/p{i}")).collect();
        let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();
        let fetcher = StubFetcher::new().page("https://x.com/", &html("Home", &link_refs));
        for link in &links {
            fetcher.set(&format!("https://x.com{link}"), FetchedPage::html(html(link, &[])));
        }
        let fetcher = Arc::new(fetcher);

        let result = crawler(Arc::clone(&fetcher))
            .crawl(
                "https://x.com/",
                &options(5, 3),
                &FingerprintMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.stats.fetched, 5);
        assert_eq!(result.fingerprints.len(), 5);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_failed_pages_stay_unresolved() {
        let fetcher = StubFetcher::new()
            .page("https://x.com/", &html("Home", &["/missing", "/file.pdf", "/gone"]));
        fetcher.set(
            "https://x.com/file.pdf",
            FetchedPage {
                status: 200,
                content_type: Some("application/pdf".into()),
                body: "%PDF".into(),
            },
        );
        fetcher.set(
            "https://x.com/gone",
            FetchedPage {
                status: 404,
                content_type: Some("text/html".into()),
                body: html("Not found", &["/secret"]),
            },
        );

        let result = run(fetcher, &options(10, 3)).await;
        assert_eq!(result.tree.len(), 4);
        assert_eq!(result.stats.fetched, 1);
        assert_eq!(result.stats.abandoned, 3);
        for child in result.tree.children(NodeId::ROOT) {
            assert!(!child.is_resolved());
            assert!(child.children.is_empty());
        }
        assert_eq!(result.fingerprints.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_base_url() {
        let result = crawler(Arc::new(StubFetcher::new()))
            .crawl(
                "::not a url::",
                &options(10, 3),
                &FingerprintMap::new(),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(result.tree.len(), 1);
        assert!(!result.tree.root().is_resolved());
        assert!(result.fingerprints.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_recorded() {
        let fetcher = StubFetcher::new().page("https://x.com/", &html("Home", &[]));
        let result = run(fetcher, &options(10, 3)).await;
        let root = result.tree.root();
        assert_eq!(root.title.as_deref(), Some("Home"));
        assert_eq!(root.description.as_deref(), Some("Home page."));
        assert!(root.fingerprint.is_some());
    }

    #[tokio::test]
    async fn test_baseline_marks_unchanged_pages() {
        let fetcher = Arc::new(
            StubFetcher::new()
                .page("https://x.com/", &html("Home", &["/a"]))
                .page("https://x.com/a", &html("A", &[])),
        );
        let crawler = crawler(Arc::clone(&fetcher));
        let cancel = CancellationToken::new();
        let opts = options(10, 3);

        let first = crawler
            .crawl("https://x.com/", &opts, &FingerprintMap::new(), &cancel)
            .await
            .unwrap();
        assert_eq!(first.stats.unchanged, 0);

        fetcher.set("https://x.com/a", FetchedPage::html(html("A v2", &[])));
        let second = crawler
            .crawl("https://x.com/", &opts, &first.fingerprints, &cancel)
            .await
            .unwrap();

        assert_eq!(second.stats.unchanged, 1);
        assert!(second.tree.root().unchanged);
        assert_eq!(second.tree.len(), 2);
        let a = second.tree.root().children[0];
        assert!(!second.tree.get(a).unwrap().unchanged);
    }

    #[tokio::test]
    async fn test_unchanged_page_ignores_rotating_links() {
        let first_token = "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08";
        let second_token = "2c26b46b68ffc68ff99b453c1d30413413422d706483bfa0f98a5e886266e7ae";
        let first_link = format!("/s/{first_token}");
        let second_link = format!("/s/{second_token}");
        let fetcher = Arc::new(
            StubFetcher::new()
                .page(
                    "https://x.com/",
                    &html("Home", &["/a", first_link.as_str()]),
                )
                .page("https://x.com/a", &html("A", &[]))
                .page(&format!("https://x.com/s/{first_token}"), &html("S", &[]))
                .page(&format!("https://x.com/s/{second_token}"), &html("S", &[])),
        );
        let crawler = crawler(Arc::clone(&fetcher));
        let cancel = CancellationToken::new();
        let opts = options(10, 3);

        let first = crawler
            .crawl("https://x.com/", &opts, &FingerprintMap::new(), &cancel)
            .await
            .unwrap();
        assert_eq!(first.fingerprints.len(), 3);

        fetcher.set(
            "https://x.com/",
            FetchedPage::html(html("Home", &["/a", second_link.as_str()])),
        );
        let second = crawler
            .crawl("https://x.com/", &opts, &first.fingerprints, &cancel)
            .await
            .unwrap();

        assert!(second.tree.root().unchanged);
        assert_eq!(urls(&second), vec!["https://x.com/", "https://x.com/a"]);
        let changes = crate::pipeline::detect_changes(&first.fingerprints, &second.fingerprints);
        assert!(!changes.anything_changed());
    }

    #[tokio::test]
    async fn test_changed_page_follows_new_links() {
        let fetcher = Arc::new(
            StubFetcher::new()
                .page("https://x.com/", &html("Home", &["/a"]))
                .page("https://x.com/a", &html("A", &[]))
                .page("https://x.com/b", &html("B", &[])),
        );
        let crawler = crawler(Arc::clone(&fetcher));
        let cancel = CancellationToken::new();
        let opts = options(10, 3);

        let first = crawler
            .crawl("https://x.com/", &opts, &FingerprintMap::new(), &cancel)
            .await
            .unwrap();

        fetcher.set("https://x.com/", FetchedPage::html(html("Home", &["/a", "/b"])));
        let second = crawler
            .crawl("https://x.com/", &opts, &first.fingerprints, &cancel)
            .await
            .unwrap();

        assert!(!second.tree.root().unchanged);
        assert!(second.fingerprints.contains_key("https://x.com/b"));
    }

    #[tokio::test]
    async fn test_byte_budget_stops_crawl() {
        let fetcher = StubFetcher::new()
            .page("https://x.com/", &html("Home", &["/a", "/b"]))
            .page("https://x.com/a", &html("A", &[]))
            .page("https://x.com/b", &html("B", &[]));

        let mut opts = options(10, 3);
        opts.max_bytes = Some(1);
        let result = run(fetcher, &opts).await;
        assert_eq!(result.stats.fetched, 1);
    }

    #[tokio::test]
    async fn test_cancelled_crawl_errors() {
        let fetcher = StubFetcher::new().page("https://x.com/", &html("Home", &[]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = crawler(Arc::new(fetcher))
            .crawl("https://x.com/", &options(10, 3), &FingerprintMap::new(), &cancel)
            .await;
        assert!(matches!(result, Err(AppError::Cancelled)));
    }
}
