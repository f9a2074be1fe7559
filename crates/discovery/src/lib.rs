//! Endpoint discovery for toolforge.
//!
//! Turns spec files or a documentation site into a deduplicated list of
//! [`NormalizedEndpoint`](model::NormalizedEndpoint)s plus a resource [`Catalog`](model::Catalog),
//! then parks for the caller to choose which endpoints to turn into tools.

pub mod config;
pub mod crawl;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod model;
pub mod normalize;
pub mod openapi;
pub mod oracle;
pub mod pipeline;
pub mod resolver;

pub use config::{DiscoveryConfig, FetchConfig, RetryPolicy};
pub use error::{DiscoveryError, FetchError, Result};
pub use fetch::{FetchedPage, HttpFetcher, WebFetcher};
pub use model::{Catalog, CatalogEntry, EndpointSource, NormalizedEndpoint, Page, RawEndpoint};
pub use oracle::{ContentExtractor, NoExtraction};
pub use pipeline::{
    DiscoveryContext, DiscoveryInput, DiscoveryPipeline, DiscoveryState, DiscoveryStep, Selection,
};
