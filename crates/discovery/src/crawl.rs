//! Documentation-site discovery: sitemap first, breadth-first crawl as fallback.

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::fetch::WebFetcher;
use crate::model::{Page, PageSource};
use regex::Regex;
use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;
use url::Url;

static SITEMAP_LOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<loc>\s*(.*?)\s*</loc>").expect("valid regex"));
static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("valid regex")
});

/// Parse and check a crawl root.
///
/// # Errors
///
/// Returns [`DiscoveryError::Input`] unless `root_url` is an absolute `http(s)` URL with a host.
pub fn parse_root_url(root_url: &str) -> Result<Url> {
    let url = Url::parse(root_url.trim())
        .map_err(|e| DiscoveryError::Input(format!("invalid root URL '{root_url}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(DiscoveryError::Input(format!(
            "root URL must be an http(s) URL with a host: '{root_url}'"
        )));
    }
    Ok(url)
}

/// Pages for `root`: the sitemap's pages when it lists any, otherwise a bounded crawl.
pub async fn discover_pages(
    fetcher: &dyn WebFetcher,
    root: &Url,
    config: &DiscoveryConfig,
) -> Vec<Page> {
    let pages = try_sitemap(fetcher, root, config).await;
    if !pages.is_empty() {
        return pages;
    }
    crawl(fetcher, root, config).await
}

/// Fetch `/sitemap.xml` at the root's origin and then every listed page (up to the limit).
pub async fn try_sitemap(
    fetcher: &dyn WebFetcher,
    root: &Url,
    config: &DiscoveryConfig,
) -> Vec<Page> {
    let Ok(sitemap_url) = root.join("/sitemap.xml") else {
        return Vec::new();
    };
    let sitemap = match fetcher.fetch(sitemap_url.as_str()).await {
        Ok(page) => page,
        Err(e) => {
            tracing::info!("No sitemap at {}: {}", sitemap_url, e);
            return Vec::new();
        }
    };

    let locations = sitemap_locations(&sitemap.body);
    tracing::info!(
        urls = locations.len(),
        limit = config.sitemap_url_limit,
        "Found sitemap"
    );

    let mut pages = Vec::new();
    for loc in locations.into_iter().take(config.sitemap_url_limit) {
        tokio::time::sleep(config.crawl_throttle()).await;
        match fetcher.fetch(&loc).await {
            Ok(page) => pages.push(Page {
                url: loc,
                content: page.body,
                source: PageSource::Sitemap,
            }),
            Err(e) => tracing::warn!("Skipping sitemap entry {}: {}", loc, e),
        }
    }
    pages
}

/// Breadth-first crawl restricted to the root's host and port.
pub async fn crawl(fetcher: &dyn WebFetcher, root: &Url, config: &DiscoveryConfig) -> Vec<Page> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<Url> = VecDeque::from([without_fragment(root)]);
    let mut pages = Vec::new();

    while pages.len() < config.max_crawl_pages {
        let Some(url) = queue.pop_front() else {
            break;
        };
        if !visited.insert(url.to_string()) {
            continue;
        }

        tokio::time::sleep(config.crawl_throttle()).await;
        let page = match fetcher.fetch(url.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Error crawling {}: {}", url, e);
                continue;
            }
        };

        for link in extract_links(&url, &page.body) {
            if same_origin(root, &link) && !visited.contains(link.as_str()) {
                queue.push_back(link);
            }
        }
        pages.push(Page {
            url: url.to_string(),
            content: page.body,
            source: PageSource::Crawl,
        });
    }

    tracing::info!(pages = pages.len(), visited = visited.len(), "Crawl finished");
    pages
}

/// Text of every `<loc>` element.
#[must_use]
pub fn sitemap_locations(xml: &str) -> Vec<String> {
    SITEMAP_LOC
        .captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| unescape_xml(m.as_str()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// Absolute targets of every `<a href>` in `html`, resolved against `base`, fragments removed.
#[must_use]
pub fn extract_links(base: &Url, html: &str) -> Vec<Url> {
    ANCHOR_HREF
        .captures_iter(html)
        .filter_map(|c| c.get(1).or_else(|| c.get(2)).or_else(|| c.get(3)))
        .map(|m| unescape_xml(m.as_str()))
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .filter_map(|href| base.join(&href).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(|u| without_fragment(&u))
        .collect()
}

fn same_origin(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

fn without_fragment(url: &Url) -> Url {
    let mut u = url.clone();
    u.set_fragment(None);
    u
}

fn unescape_xml(s: &str) -> String {
    s.trim()
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
