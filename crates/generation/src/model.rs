//! Work items, tool records and error records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use toolforge_discovery::{EndpointSource, NormalizedEndpoint};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Pending,
    SchemaGenerated,
    Composed,
    Error,
}

/// One selected endpoint moving through generation. Items are never removed; failed ones stay
/// with status `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub endpoint: NormalizedEndpoint,
    #[serde(default)]
    pub status: WorkStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_docs: Option<String>,
}

impl WorkItem {
    #[must_use]
    pub fn new(endpoint: NormalizedEndpoint) -> Self {
        Self {
            id: endpoint.id.clone(),
            endpoint,
            status: WorkStatus::Pending,
            schema: None,
            full_docs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolData {
    pub method: String,
    pub path: String,
    pub server_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub source: EndpointSource,
    pub confidence: f64,
}

/// A callable tool definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// `[vendor, method, version]`.
    pub tags: Vec<String>,
    pub visibility: String,
    pub active: bool,
    pub protocol: String,
    pub protocol_data: ProtocolData,
    /// Augmented parameter schema, custom `visible` keys included.
    pub parameters: Value,
    pub metadata: ToolMetadata,
    #[serde(default)]
    pub validated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStage {
    SchemaSynthesis,
    ComposeTool,
    Validation,
}

/// A per-item failure recorded during generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub error: String,
    pub stage: ErrorStage,
}

impl GenerationError {
    #[must_use]
    pub fn for_endpoint(endpoint_id: &str, stage: ErrorStage, error: impl Into<String>) -> Self {
        Self {
            endpoint_id: Some(endpoint_id.to_string()),
            tool_name: None,
            error: error.into(),
            stage,
        }
    }

    #[must_use]
    pub fn for_tool(tool_name: &str, stage: ErrorStage, error: impl Into<String>) -> Self {
        Self {
            endpoint_id: None,
            tool_name: Some(tool_name.to_string()),
            error: error.into(),
            stage,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    #[default]
    InProgress,
    Completed,
}
