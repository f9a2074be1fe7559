//! Local HTTP fixtures for toolforge tests.

use anyhow::Context as _;
use axum::Router;
use axum::http::{StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Replaced by the site's base URL in every body when the site starts serving.
pub const BASE_PLACEHOLDER: &str = "{{BASE}}";

#[derive(Debug, Clone)]
struct Route {
    content_type: &'static str,
    body: String,
    /// Requests answered with 503 before the body is served.
    failures_left: u32,
}

#[derive(Default)]
struct SiteState {
    routes: Mutex<HashMap<String, Route>>,
    hits: Mutex<Vec<String>>,
}

/// Builder for a [`StaticSite`].
#[derive(Default)]
pub struct SiteBuilder {
    routes: HashMap<String, Route>,
}

impl SiteBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn html(self, path: &str, body: impl Into<String>) -> Self {
        self.route(path, "text/html; charset=utf-8", body, 0)
    }

    #[must_use]
    pub fn xml(self, path: &str, body: impl Into<String>) -> Self {
        self.route(path, "application/xml", body, 0)
    }

    #[must_use]
    pub fn text(self, path: &str, body: impl Into<String>) -> Self {
        self.route(path, "text/plain; charset=utf-8", body, 0)
    }

    /// Serve 503 for the first `failures` requests to `path`, then `body`.
    #[must_use]
    pub fn flaky(self, path: &str, failures: u32, body: impl Into<String>) -> Self {
        self.route(path, "text/plain; charset=utf-8", body, failures)
    }

    fn route(
        mut self,
        path: &str,
        content_type: &'static str,
        body: impl Into<String>,
        failures_left: u32,
    ) -> Self {
        self.routes.insert(
            path.to_string(),
            Route {
                content_type,
                body: body.into(),
                failures_left,
            },
        );
        self
    }

    /// Bind an ephemeral localhost port and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or its address cannot be read.
    pub async fn serve(self) -> anyhow::Result<StaticSite> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind ephemeral port")?;
        let addr = listener.local_addr().context("read local address")?;
        let base_url = format!("http://{addr}");

        let mut routes = self.routes;
        for route in routes.values_mut() {
            route.body = route.body.replace(BASE_PLACEHOLDER, &base_url);
        }
        let state = Arc::new(SiteState {
            routes: Mutex::new(routes),
            hits: Mutex::new(Vec::new()),
        });
        let app = Router::new().fallback({
            let state = Arc::clone(&state);
            move |uri: Uri| {
                let state = Arc::clone(&state);
                async move { respond(&state, &uri) }
            }
        });

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(StaticSite {
            base_url,
            state,
            handle,
        })
    }
}

fn respond(state: &SiteState, uri: &Uri) -> Response {
    let path = uri.path().to_string();
    state.hits.lock().push(path.clone());

    let mut routes = state.routes.lock();
    let Some(route) = routes.get_mut(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if route.failures_left > 0 {
        route.failures_left -= 1;
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ([(header::CONTENT_TYPE, route.content_type)], route.body.clone()).into_response()
}

/// A running local site. The server stops when this is dropped.
pub struct StaticSite {
    base_url: String,
    state: Arc<SiteState>,
    handle: JoinHandle<()>,
}

impl StaticSite {
    /// `http://127.0.0.1:<port>`, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Request paths in arrival order.
    #[must_use]
    pub fn hits(&self) -> Vec<String> {
        self.state.hits.lock().clone()
    }

    #[must_use]
    pub fn hit_count(&self, path: &str) -> usize {
        self.state.hits.lock().iter().filter(|p| *p == path).count()
    }
}

impl Drop for StaticSite {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
