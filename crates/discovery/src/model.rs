//! Endpoint records produced by discovery.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Where an endpoint record came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointSource {
    Openapi,
    Llm,
    Regex,
    Crawl,
    Sitemap,
    #[default]
    Unknown,
}

impl EndpointSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EndpointSource::Openapi => "openapi",
            EndpointSource::Llm => "llm",
            EndpointSource::Regex => "regex",
            EndpointSource::Crawl => "crawl",
            EndpointSource::Sitemap => "sitemap",
            EndpointSource::Unknown => "unknown",
        }
    }
}

/// Candidate endpoint as found, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEndpoint {
    #[serde(default, deserialize_with = "null_as_default")]
    pub method: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub server: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub parameters: Vec<Value>,
    #[serde(
        default,
        rename = "requestBody",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_body: Option<Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub source: EndpointSource,
}

/// Deduplicated endpoint with a stable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEndpoint {
    /// First 12 hex characters of a digest of `server|METHOD|path`.
    pub id: String,
    pub method: String,
    /// Canonical path: no query string, no whitespace.
    pub path: String,
    pub server: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<Value>,
    #[serde(
        default,
        rename = "requestBody",
        skip_serializing_if = "Option::is_none"
    )]
    pub request_body: Option<Value>,
    pub source: EndpointSource,
    pub confidence: f64,
}

impl NormalizedEndpoint {
    /// `METHOD path`, used wherever a description is missing.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// True if the endpoint declares a request body with any content.
    #[must_use]
    pub fn has_request_body(&self) -> bool {
        match &self.request_body {
            None | Some(Value::Null) => false,
            Some(Value::Object(o)) => !o.is_empty(),
            Some(_) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub method: String,
    pub path: String,
    pub description: String,
    pub confidence: f64,
}

/// Endpoints grouped by resource for review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub total_endpoints: usize,
    pub resource_count: usize,
    pub resources: BTreeMap<String, Vec<CatalogEntry>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSource {
    Sitemap,
    Crawl,
}

/// A fetched documentation page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub url: String,
    #[serde(default)]
    pub content: String,
    pub source: PageSource,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
