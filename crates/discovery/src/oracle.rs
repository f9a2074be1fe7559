//! Content-extraction oracle interface.

use crate::model::RawEndpoint;
use async_trait::async_trait;

/// Turns free text (docs pages, non-OpenAPI files) into candidate endpoints.
///
/// Implementations swallow their own failures and return an empty list; discovery treats the
/// answer as a hint, never as an error source.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Vec<RawEndpoint>;
}

/// Extractor that never finds anything. Used when no model endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExtraction;

#[async_trait]
impl ContentExtractor for NoExtraction {
    async fn extract(&self, _text: &str) -> Vec<RawEndpoint> {
        Vec::new()
    }
}
