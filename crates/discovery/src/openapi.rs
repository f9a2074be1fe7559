//! Endpoint enumeration for OpenAPI-like documents.
//!
//! Works on plain JSON values rather than a typed model so that partial or slightly invalid specs
//! still yield endpoints. OpenAPI 3 (`servers`) and Swagger 2 (`host`/`basePath`) are both read.

use crate::model::{EndpointSource, RawEndpoint};
use crate::resolver::RefResolver;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Operation keys enumerated under each path item.
pub const OPENAPI_METHODS: [&str; 7] = ["get", "post", "put", "delete", "patch", "head", "options"];

/// A document is treated as OpenAPI-like when it has a top-level `paths` key.
#[must_use]
pub fn is_openapi_document(doc: &Value) -> bool {
    doc.get("paths").is_some()
}

/// First declared server URL, or an empty string.
#[must_use]
pub fn server_url(doc: &Value) -> String {
    if let Some(url) = doc
        .get("servers")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(|s| s.get("url"))
        .and_then(Value::as_str)
    {
        return url.to_string();
    }

    let Some(host) = doc.get("host").and_then(Value::as_str) else {
        return String::new();
    };
    let scheme = doc
        .get("schemes")
        .and_then(Value::as_array)
        .and_then(|s| s.first())
        .and_then(Value::as_str)
        .unwrap_or("https");
    let base_path = doc.get("basePath").and_then(Value::as_str).unwrap_or("");
    format!("{scheme}://{host}{}", base_path.trim_end_matches('/'))
}

/// Enumerate every `path x method` pair of the resolver's root document.
#[must_use]
pub fn extract_endpoints(resolver: &RefResolver) -> Vec<RawEndpoint> {
    let doc = resolver.root_document();
    let root = resolver.root().to_path_buf();
    let server = server_url(&doc);
    let mut endpoints = Vec::new();

    let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
        return endpoints;
    };

    for (path, item) in paths {
        let (item_doc, item) = match resolver.resolve(&root, item) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!("Skipping path '{}': {}", path, e);
                continue;
            }
        };
        let Some(item_obj) = item.as_object() else {
            tracing::warn!("Skipping path '{}': path item is not an object", path);
            continue;
        };

        let shared_params = item_obj
            .get("parameters")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for (key, op) in item_obj {
            let method = key.to_ascii_lowercase();
            if !OPENAPI_METHODS.contains(&method.as_str()) {
                continue;
            }
            let Some(op_obj) = op.as_object() else {
                tracing::warn!("Skipping {} {}: operation is not an object", key, path);
                continue;
            };

            let op_params = op_obj
                .get("parameters")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let parameters = merge_parameters(resolver, &item_doc, shared_params, op_params);

            let request_body = op_obj
                .get("requestBody")
                .map(|body| resolver.inline(&item_doc, body));

            endpoints.push(RawEndpoint {
                method: method.to_ascii_uppercase(),
                path: path.clone(),
                server: server.clone(),
                description: operation_description(op),
                parameters,
                request_body,
                source: EndpointSource::Openapi,
            });
        }
    }

    endpoints
}

/// `summary` when present and non-empty, else `description`.
fn operation_description(op: &Value) -> String {
    let text = |key: &str| {
        op.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    };
    text("summary")
        .or_else(|| text("description"))
        .unwrap_or_default()
}

/// Path-item parameters overridden by operation parameters with the same `(name, in)`.
fn merge_parameters(
    resolver: &RefResolver,
    current_doc: &Path,
    path_item_params: &[Value],
    operation_params: &[Value],
) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for p in path_item_params.iter().chain(operation_params) {
        let resolved = resolve_parameter(resolver, current_doc, p);
        match parameter_key(&resolved) {
            Some(key) => {
                if let Some(i) = index.get(&key).copied() {
                    merged[i] = resolved;
                } else {
                    index.insert(key, merged.len());
                    merged.push(resolved);
                }
            }
            None => merged.push(resolved),
        }
    }

    merged
}

fn resolve_parameter(resolver: &RefResolver, current_doc: &Path, param: &Value) -> Value {
    match resolver.resolve(current_doc, param) {
        Ok((doc, value)) => resolver.inline(&doc, &value),
        Err(e) => {
            tracing::warn!("Keeping unresolved parameter: {}", e);
            param.clone()
        }
    }
}

fn parameter_key(param: &Value) -> Option<(String, String)> {
    let name = param.get("name")?.as_str()?;
    let location = param.get("in")?.as_str()?;
    Some((location.to_string(), name.to_string()))
}

/// Convenience wrapper: parse `doc` located at `path` and enumerate its endpoints.
#[must_use]
pub fn endpoints_from_document(path: impl Into<PathBuf>, doc: Value) -> Vec<RawEndpoint> {
    let resolver = RefResolver::new(path, doc);
    extract_endpoints(&resolver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn endpoints(yaml: &str) -> Vec<RawEndpoint> {
        let doc: Value = serde_yaml::from_str(yaml).unwrap();
        endpoints_from_document("/nonexistent/openapi.yaml", doc)
    }

    #[test]
    fn enumerates_methods_with_server_and_summary() {
        let eps = endpoints(
            r"
openapi: 3.0.0
servers:
  - url: https://api.x.com
paths:
  /users:
    get:
      summary: List users
      description: Long description
    post:
      description: Create a user
      requestBody:
        content:
          application/json:
            schema:
              type: object
    trace:
      summary: ignored
    x-internal: true
",
        );
        assert_eq!(eps.len(), 2);
        let get = eps.iter().find(|e| e.method == "GET").unwrap();
        assert_eq!(get.path, "/users");
        assert_eq!(get.server, "https://api.x.com");
        assert_eq!(get.description, "List users");
        assert_eq!(get.source, EndpointSource::Openapi);
        assert!(get.request_body.is_none());

        let post = eps.iter().find(|e| e.method == "POST").unwrap();
        assert_eq!(post.description, "Create a user");
        assert!(post.request_body.as_ref().unwrap()["content"].is_object());
    }

    #[test]
    fn operation_parameters_override_path_level_ones() {
        let eps = endpoints(
            r"
paths:
  /users/{id}:
    parameters:
      - name: id
        in: path
        description: shared
      - $ref: '#/components/parameters/Trace'
    get:
      parameters:
        - name: id
          in: path
          description: specific
        - name: expand
          in: query
components:
  parameters:
    Trace:
      name: X-Trace
      in: header
",
        );
        assert_eq!(eps.len(), 1);
        let params = &eps[0].parameters;
        assert_eq!(params.len(), 3);
        assert_eq!(params[0]["description"], "specific");
        assert_eq!(params[1]["name"], "X-Trace");
        assert_eq!(params[2]["name"], "expand");
        assert_eq!(eps[0].server, "");
    }

    #[test]
    fn swagger2_server_from_host_and_base_path() {
        let doc = json!({
            "swagger": "2.0",
            "host": "petstore.example.com",
            "basePath": "/v2/",
            "schemes": ["http"],
            "paths": {}
        });
        assert_eq!(server_url(&doc), "http://petstore.example.com/v2");
        assert!(is_openapi_document(&doc));
        assert!(!is_openapi_document(&json!({"info": {}})));
    }

    #[test]
    fn request_body_refs_are_inlined() {
        let eps = endpoints(
            r"
paths:
  /pets:
    post:
      requestBody:
        $ref: '#/components/requestBodies/Pet'
components:
  requestBodies:
    Pet:
      content:
        application/json:
          schema:
            $ref: '#/components/schemas/Pet'
  schemas:
    Pet:
      type: object
      properties:
        name:
          type: string
",
        );
        let body = eps[0].request_body.as_ref().unwrap();
        assert_eq!(
            body["content"]["application/json"]["schema"]["properties"]["name"]["type"],
            "string"
        );
    }
}
