// src/utils/url.rs

//! URL canonicalization and same-site checks.

use url::{Host, Url};

/// Parse an absolute http(s) URL, rejecting every other scheme.
fn parse_web_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Some(url),
        _ => None,
    }
}

fn canonical_form(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    Some(format!("{}://{}{}{}", url.scheme(), host, port, url.path()))
}

/// Reduce a URL to `scheme://host[:port]/path`, dropping query and fragment.
///
/// Returns `None` for malformed or non-http(s) URLs.
///
/// # Examples
/// ```
/// use sitewatch::utils::url::canonicalize;
///
/// assert_eq!(
///     canonicalize("https://Example.com/docs?page=2#intro"),
///     Some("https://example.com/docs".to_string())
/// );
/// ```
pub fn canonicalize(raw: &str) -> Option<String> {
    canonical_form(&parse_web_url(raw)?)
}

/// Resolve `href` against `base` and canonicalize the result.
pub fn resolve(base: &str, href: &str) -> Option<String> {
    let base = parse_web_url(base)?;
    let joined = base.join(href.trim()).ok()?;
    match joined.scheme() {
        "http" | "https" => canonical_form(&joined),
        _ => None,
    }
}

/// Registrable domain of a host (`blog.example.co.uk` -> `example.co.uk`).
///
/// IP addresses and hosts without a public suffix are their own domain.
pub fn registrable_domain(host: &str) -> String {
    let host = host.trim_end_matches('.').to_lowercase();
    match Host::parse(&host) {
        Ok(Host::Domain(_)) => psl::domain_str(&host)
            .map(str::to_string)
            .unwrap_or(host),
        _ => host,
    }
}

/// Registrable domain of a URL, or `None` if it is not a usable web URL.
pub fn site_of(raw: &str) -> Option<String> {
    let url = parse_web_url(raw)?;
    url.host_str().map(registrable_domain)
}

/// Whether two URLs belong to the same registrable domain.
///
/// Malformed URLs are never in scope.
pub fn same_site(base: &str, candidate: &str) -> bool {
    match (site_of(base), site_of(candidate)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_drops_query_and_fragment() {
        assert_eq!(
            canonicalize("https://example.com/a/b?x=1&y=2#top"),
            Some("https://example.com/a/b".to_string())
        );
    }

    #[test]
    fn test_canonicalize_root_path() {
        assert_eq!(
            canonicalize("https://example.com"),
            Some("https://example.com/".to_string())
        );
    }

    #[test]
    fn test_canonicalize_keeps_explicit_port() {
        assert_eq!(
            canonicalize("http://127.0.0.1:8080/page"),
            Some("http://127.0.0.1:8080/page".to_string())
        );
        assert_eq!(
            canonicalize("https://example.com:443/page"),
            Some("https://example.com/page".to_string())
        );
    }

    #[test]
    fn test_canonicalize_rejects_malformed() {
        assert_eq!(canonicalize("not a url"), None);
        assert_eq!(canonicalize("mailto:someone@example.com"), None);
        assert_eq!(canonicalize("javascript:void(0)"), None);
        assert_eq!(canonicalize(""), None);
    }

    #[test]
    fn test_resolve_relative_links() {
        assert_eq!(
            resolve("https://example.com/docs/index.html", "guide.html?v=3"),
            Some("https://example.com/docs/guide.html".to_string())
        );
        assert_eq!(
            resolve("https://example.com/docs/", "/about#team"),
            Some("https://example.com/about".to_string())
        );
        assert_eq!(
            resolve("https://example.com/", "https://other.org/x"),
            Some("https://other.org/x".to_string())
        );
        assert_eq!(resolve("https://example.com/", "mailto:a@b.c"), None);
    }

    #[test]
    fn test_registrable_domain() {
        assert_eq!(registrable_domain("blog.example.com"), "example.com");
        assert_eq!(registrable_domain("www.example.co.uk"), "example.co.uk");
        assert_eq!(registrable_domain("Example.COM."), "example.com");
        assert_eq!(registrable_domain("127.0.0.1"), "127.0.0.1");
        assert_eq!(registrable_domain("localhost"), "localhost");
    }

    #[test]
    fn test_same_site_ignores_subdomains() {
        assert!(same_site("https://example.com/", "https://blog.example.com/post"));
        assert!(same_site("https://www.example.com/", "http://example.com/"));
        assert!(!same_site("https://example.com/", "https://example.org/"));
        assert!(!same_site("https://example.com/", "::garbage::"));
        assert!(!same_site("garbage", "https://example.com/"));
    }
}
