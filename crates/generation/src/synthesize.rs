//! Deterministic schema synthesis from declared OpenAPI parameters.
//!
//! Used when no model is configured, and as a sanity baseline in tests. The output follows the
//! grouped layout the model is asked for: `header`, `path`, `query` and `body` objects.

use crate::error::OracleError;
use crate::oracle::{SchemaSynthesizer, SynthesisRequest};
use async_trait::async_trait;
use serde_json::{Map, Value, json};

const PARAMETER_GROUPS: [&str; 3] = ["header", "path", "query"];

/// Builds parameter schemas straight from the endpoint's parameter list and request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredParameters;

#[async_trait]
impl SchemaSynthesizer for DeclaredParameters {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Value, OracleError> {
        Ok(schema_from_parameters(
            &request.parameters,
            request.request_body.as_ref(),
        ))
    }
}

/// Group OpenAPI parameters by location into one object schema.
///
/// Path parameters are always required. Parameters with a default are never required.
#[must_use]
pub fn schema_from_parameters(parameters: &[Value], request_body: Option<&Value>) -> Value {
    let mut groups: Map<String, Value> = Map::new();
    let mut required_groups: Vec<String> = Vec::new();

    for group in PARAMETER_GROUPS {
        let mut properties = Map::new();
        let mut required: Vec<String> = Vec::new();

        for param in parameters {
            let (Some(name), Some(location)) = (
                param.get("name").and_then(Value::as_str),
                param.get("in").and_then(Value::as_str),
            ) else {
                continue;
            };
            if location != group {
                continue;
            }

            let mut prop = param
                .get("schema")
                .filter(|s| s.is_object())
                .cloned()
                .unwrap_or_else(|| json!({"type": "string"}));
            if let Some(desc) = param.get("description").and_then(Value::as_str)
                && prop.get("description").is_none()
            {
                prop["description"] = json!(desc);
            }

            let is_required = location == "path"
                || param.get("required").and_then(Value::as_bool) == Some(true);
            if is_required && prop.get("default").is_none() {
                required.push(name.to_string());
            }
            properties.insert(name.to_string(), prop);
        }

        if properties.is_empty() {
            continue;
        }
        if !required.is_empty() {
            required_groups.push(group.to_string());
        }
        groups.insert(
            group.to_string(),
            json!({"type": "object", "properties": properties, "required": required}),
        );
    }

    if let Some(body) = request_body.and_then(body_schema) {
        if request_body.and_then(|b| b.get("required")).and_then(Value::as_bool) == Some(true) {
            required_groups.push("body".to_string());
        }
        groups.insert("body".to_string(), body);
    }

    let mut schema = json!({"type": "object", "properties": groups});
    if !required_groups.is_empty() {
        schema["required"] = json!(required_groups);
    }
    schema
}

/// JSON media type schema if present, else the first declared media type's schema.
fn body_schema(request_body: &Value) -> Option<Value> {
    let content = request_body.get("content")?.as_object()?;
    let media = content
        .get("application/json")
        .or_else(|| content.values().next())?;
    media.get("schema").filter(|s| s.is_object()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_are_grouped_by_location() {
        let params = vec![
            json!({"name": "id", "in": "path", "schema": {"type": "integer"}}),
            json!({"name": "limit", "in": "query", "schema": {"type": "integer", "default": 10}, "required": true}),
            json!({"name": "q", "in": "query", "description": "Search text", "required": true}),
            json!({"name": "X-Trace", "in": "header"}),
            json!({"name": "session", "in": "cookie"}),
        ];
        let schema = schema_from_parameters(&params, None);

        assert_eq!(schema["required"], json!(["path", "query"]));
        assert_eq!(schema["properties"]["path"]["required"], json!(["id"]));
        assert_eq!(schema["properties"]["query"]["required"], json!(["q"]));
        assert_eq!(
            schema["properties"]["query"]["properties"]["q"],
            json!({"type": "string", "description": "Search text"})
        );
        assert_eq!(
            schema["properties"]["header"]["properties"]["X-Trace"]["type"],
            "string"
        );
        assert!(schema["properties"].get("cookie").is_none());
    }

    #[test]
    fn json_body_is_preferred() {
        let body = json!({
            "required": true,
            "content": {
                "text/plain": {"schema": {"type": "string"}},
                "application/json": {"schema": {"type": "object", "properties": {"name": {"type": "string"}}}}
            }
        });
        let schema = schema_from_parameters(&[], Some(&body));
        assert_eq!(schema["required"], json!(["body"]));
        assert_eq!(schema["properties"]["body"]["properties"]["name"]["type"], "string");
    }

    #[test]
    fn no_inputs_give_an_empty_object() {
        assert_eq!(
            schema_from_parameters(&[], None),
            json!({"type": "object", "properties": {}})
        );
    }
}
