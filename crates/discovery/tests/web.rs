use std::sync::Arc;
use toolforge_discovery::crawl::{crawl, discover_pages, try_sitemap};
use toolforge_discovery::model::PageSource;
use toolforge_discovery::{
    DiscoveryConfig, DiscoveryContext, DiscoveryInput, DiscoveryPipeline, EndpointSource,
    FetchConfig, FetchError, HttpFetcher, NoExtraction, RetryPolicy, WebFetcher,
};
use toolforge_test_support::SiteBuilder;
use toolforge_workflow::{InMemoryCheckpointStore, RunOutcome};
use url::Url;

fn fast_config() -> DiscoveryConfig {
    DiscoveryConfig {
        crawl_throttle_ms: 0,
        fetch: FetchConfig {
            timeout_ms: 2_000,
            retry: RetryPolicy {
                maximum_attempts: 3,
                initial_interval_ms: 10,
                backoff_coefficient: 2.0,
                maximum_interval_ms: Some(50),
            },
            ..FetchConfig::default()
        },
        ..DiscoveryConfig::default()
    }
}

fn fetcher(cfg: &DiscoveryConfig) -> HttpFetcher {
    HttpFetcher::new(cfg.fetch.clone()).unwrap()
}

#[tokio::test]
async fn fetcher_retries_server_errors_then_succeeds() -> anyhow::Result<()> {
    let site = SiteBuilder::new()
        .flaky("/docs", 2, "GET /api/users")
        .serve()
        .await?;
    let cfg = fast_config();

    let page = fetcher(&cfg).fetch(&site.url("/docs")).await?;
    assert_eq!(page.status, 200);
    assert_eq!(page.body, "GET /api/users");
    assert_eq!(site.hit_count("/docs"), 3);
    Ok(())
}

#[tokio::test]
async fn fetcher_gives_up_after_max_attempts_and_skips_retry_on_404() -> anyhow::Result<()> {
    let site = SiteBuilder::new().flaky("/down", 10, "never").serve().await?;
    let cfg = fast_config();
    let f = fetcher(&cfg);

    let err = f.fetch(&site.url("/down")).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 503, .. }));
    assert_eq!(site.hit_count("/down"), 3);

    let err = f.fetch(&site.url("/missing")).await.unwrap_err();
    assert!(matches!(err, FetchError::Status { status: 404, .. }));
    assert_eq!(site.hit_count("/missing"), 1);
    Ok(())
}

#[tokio::test]
async fn sitemap_pages_are_fetched_up_to_the_limit() -> anyhow::Result<()> {
    let site = SiteBuilder::new()
        .xml(
            "/sitemap.xml",
            "<urlset><url><loc>{{BASE}}/a</loc></url><url><loc>{{BASE}}/missing</loc></url>\
             <url><loc>{{BASE}}/b</loc></url><url><loc>{{BASE}}/c</loc></url></urlset>",
        )
        .html("/a", "page a")
        .html("/b", "page b")
        .html("/c", "page c")
        .serve()
        .await?;
    let cfg = DiscoveryConfig {
        sitemap_url_limit: 3,
        ..fast_config()
    };
    let root = Url::parse(&site.url("/docs/"))?;

    let pages = try_sitemap(&fetcher(&cfg), &root, &cfg).await;
    let urls: Vec<String> = pages.iter().map(|p| p.url.clone()).collect();
    assert_eq!(urls, vec![site.url("/a"), site.url("/b")]);
    assert!(pages.iter().all(|p| p.source == PageSource::Sitemap));
    assert_eq!(pages[0].content, "page a");
    // Only the first three entries are considered.
    assert_eq!(site.hit_count("/c"), 0);
    assert_eq!(site.hit_count("/missing"), 1);
    Ok(())
}

#[tokio::test]
async fn crawl_stays_on_origin_and_respects_page_cap() -> anyhow::Result<()> {
    let site = SiteBuilder::new()
        .html(
            "/",
            r#"<a href="/guide">Guide</a> <a href="/api#top">API</a>
               <a href="https://elsewhere.invalid/">x</a> <a href="/guide">again</a>"#,
        )
        .html("/guide", r#"<a href="/">home</a> <a href="/deep">deep</a>"#)
        .html("/api", "Use `GET /users/{id}` to fetch a user.")
        .html("/deep", "deep")
        .serve()
        .await?;
    let cfg = DiscoveryConfig {
        max_crawl_pages: 3,
        ..fast_config()
    };
    let root = Url::parse(&site.url("/"))?;

    let pages = crawl(&fetcher(&cfg), &root, &cfg).await;
    let paths: Vec<String> = pages
        .iter()
        .map(|p| Url::parse(&p.url).unwrap().path().to_string())
        .collect();
    assert_eq!(paths, vec!["/", "/guide", "/api"]);
    assert!(pages.iter().all(|p| p.source == PageSource::Crawl));
    assert_eq!(site.hit_count("/"), 1);
    assert_eq!(site.hit_count("/deep"), 0);
    Ok(())
}

#[tokio::test]
async fn discover_pages_falls_back_to_crawl_without_sitemap() -> anyhow::Result<()> {
    let site = SiteBuilder::new().html("/", "no links").serve().await?;
    let cfg = fast_config();
    let root = Url::parse(site.base_url())?;

    let pages = discover_pages(&fetcher(&cfg), &root, &cfg).await;
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].source, PageSource::Crawl);
    assert_eq!(site.hit_count("/sitemap.xml"), 1);
    Ok(())
}

#[tokio::test]
async fn url_discovery_extracts_regex_endpoints() -> anyhow::Result<()> {
    let site = SiteBuilder::new()
        .html(
            "/",
            "<p>GET /api/users lists users.</p><p>Call `POST /v1/orders?dry_run=true`.</p>\
             <p>post /v1/orders creates one.</p>",
        )
        .serve()
        .await?;
    let cfg = fast_config();
    let ctx = DiscoveryContext {
        fetcher: Arc::new(fetcher(&cfg)),
        extractor: Arc::new(NoExtraction),
        config: cfg,
    };
    let pipeline = DiscoveryPipeline::new(ctx, Arc::new(InMemoryCheckpointStore::new()))?;

    let outcome = pipeline
        .run(
            "web",
            DiscoveryInput {
                root_url: Some(site.url("/")),
                server_url: "https://api.shop.example".to_string(),
                ..DiscoveryInput::default()
            },
        )
        .await?;
    let RunOutcome::Suspended { snapshot, .. } = outcome else {
        panic!("discovery should park for selection");
    };
    let eps = &snapshot.state.endpoints_normalized;
    let pairs: Vec<(&str, &str)> = eps
        .iter()
        .map(|e| (e.method.as_str(), e.path.as_str()))
        .collect();
    assert_eq!(pairs, vec![("GET", "/api/users"), ("POST", "/v1/orders")]);
    assert!(eps.iter().all(|e| e.source == EndpointSource::Regex));
    assert!(eps.iter().all(|e| e.server == "https://api.shop.example"));
    Ok(())
}
