//! Schema-synthesis and display-name oracle interfaces.

use crate::error::OracleError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use toolforge_discovery::NormalizedEndpoint;
use toolforge_schema::naming::fallback_display_name;

/// What a schema synthesizer is told about one endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub method: String,
    pub path: String,
    pub description: String,
    pub parameters: Vec<Value>,
    pub request_body: Option<Value>,
    /// Documentation text gathered for the endpoint, if any.
    pub docs: Option<String>,
}

impl SynthesisRequest {
    #[must_use]
    pub fn new(endpoint: &NormalizedEndpoint, docs: Option<String>) -> Self {
        Self {
            method: endpoint.method.clone(),
            path: endpoint.path.clone(),
            description: endpoint.description.clone(),
            parameters: endpoint.parameters.clone(),
            request_body: endpoint.request_body.clone(),
            docs,
        }
    }
}

/// Produces a draft parameter schema for an endpoint.
///
/// A failure must be reported as `Err`; `Ok` with an empty object is a valid (empty) schema.
#[async_trait]
pub trait SchemaSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Value, OracleError>;
}

/// Produces a short human label for an endpoint. An empty answer counts as a failure.
#[async_trait]
pub trait DisplayNamer: Send + Sync {
    async fn display_name(
        &self,
        method: &str,
        path: &str,
        description: &str,
    ) -> Result<String, OracleError>;
}

/// Namer that always fails, leaving every endpoint to the heuristic fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicNames;

#[async_trait]
impl DisplayNamer for HeuristicNames {
    async fn display_name(&self, _: &str, _: &str, _: &str) -> Result<String, OracleError> {
        Err(OracleError::Unavailable("no display-name model configured".to_string()))
    }
}

/// Ask `namer` for a label, falling back to [`fallback_display_name`] on error, timeout or an
/// empty answer.
pub async fn generate_display_name(
    namer: &dyn DisplayNamer,
    method: &str,
    path: &str,
    description: &str,
    timeout: Duration,
) -> String {
    let answer = tokio::time::timeout(timeout, namer.display_name(method, path, description)).await;
    let failure = match answer {
        Ok(Ok(name)) => {
            let cleaned = clean_label(&name);
            if !cleaned.is_empty() {
                return cleaned;
            }
            "empty display name".to_string()
        }
        Ok(Err(e)) => e.to_string(),
        Err(_) => format!("timed out after {timeout:?}"),
    };
    tracing::debug!(method, path, "Display name fallback: {}", failure);
    fallback_display_name(method, path, description)
}

/// Trim whitespace and surrounding quotes.
fn clean_label(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}
