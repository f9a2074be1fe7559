//! Endpoint canonicalization, deduplication, scoring and catalog building.

use crate::model::{Catalog, CatalogEntry, EndpointSource, NormalizedEndpoint, RawEndpoint};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};
use toolforge_schema::naming::extract_resource;

/// Hex characters kept from the key digest.
pub const ENDPOINT_ID_LEN: usize = 12;

pub const BASE_CONFIDENCE: f64 = 0.5;
pub const DESCRIPTION_BONUS: f64 = 0.2;
pub const PARAMETERS_BONUS: f64 = 0.15;
pub const OPENAPI_BONUS: f64 = 0.15;

/// Path with the query string cut off and all whitespace removed. `None` if nothing remains.
#[must_use]
pub fn canonical_path(path: &str) -> Option<String> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return None;
    }
    let without_query = trimmed.split('?').next().unwrap_or_default();
    let canonical: String = without_query.chars().filter(|c| !c.is_whitespace()).collect();
    (!canonical.is_empty()).then_some(canonical)
}

/// `server|METHOD|path`.
#[must_use]
pub fn dedup_key(server: &str, method: &str, canonical_path: &str) -> String {
    format!("{server}|{method}|{canonical_path}")
}

#[must_use]
pub fn endpoint_id(key: &str) -> String {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    digest[..ENDPOINT_ID_LEN].to_string()
}

/// Heuristic trust score in `[0.5, 1.0]`.
#[must_use]
pub fn confidence(description: &str, parameters: &[Value], source: EndpointSource) -> f64 {
    let mut score = BASE_CONFIDENCE;
    if !description.is_empty() {
        score += DESCRIPTION_BONUS;
    }
    if !parameters.is_empty() {
        score += PARAMETERS_BONUS;
    }
    if source == EndpointSource::Openapi {
        score += OPENAPI_BONUS;
    }
    score.min(1.0)
}

/// Canonicalize and deduplicate `raw`, keeping the first occurrence of each key in input order.
///
/// `server_url` is the server every endpoint is attributed to; when it is empty each endpoint's
/// own discovered server is used instead.
#[must_use]
pub fn normalize(raw: &[RawEndpoint], server_url: &str) -> Vec<NormalizedEndpoint> {
    let supplied = server_url.trim();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for ep in raw {
        let Some(path) = canonical_path(&ep.path) else {
            tracing::debug!("Skipping endpoint with empty path");
            continue;
        };
        let method = match ep.method.trim() {
            "" => "GET".to_string(),
            m => m.to_ascii_uppercase(),
        };
        let server = if supplied.is_empty() {
            ep.server.trim()
        } else {
            supplied
        };

        let key = dedup_key(server, &method, &path);
        if !seen.insert(key.clone()) {
            continue;
        }

        let description = ep.description.trim().to_string();
        let confidence = confidence(&description, &ep.parameters, ep.source);
        out.push(NormalizedEndpoint {
            id: endpoint_id(&key),
            method,
            path,
            server: server.to_string(),
            description,
            parameters: ep.parameters.clone(),
            request_body: ep.request_body.clone(),
            source: ep.source,
            confidence,
        });
    }

    tracing::info!(
        raw = raw.len(),
        unique = out.len(),
        "Normalized endpoints"
    );
    out
}

/// Group endpoints by resource, preserving discovery order within each group.
#[must_use]
pub fn build_catalog(endpoints: &[NormalizedEndpoint]) -> Catalog {
    let mut resources: BTreeMap<String, Vec<CatalogEntry>> = BTreeMap::new();
    for ep in endpoints {
        let description = if ep.description.is_empty() {
            ep.label()
        } else {
            ep.description.clone()
        };
        resources
            .entry(extract_resource(&ep.path))
            .or_default()
            .push(CatalogEntry {
                id: ep.id.clone(),
                method: ep.method.clone(),
                path: ep.path.clone(),
                description,
                confidence: ep.confidence,
            });
    }

    Catalog {
        total_endpoints: endpoints.len(),
        resource_count: resources.len(),
        resources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(method: &str, path: &str, description: &str) -> RawEndpoint {
        RawEndpoint {
            method: method.to_string(),
            path: path.to_string(),
            description: description.to_string(),
            ..RawEndpoint::default()
        }
    }

    #[test]
    fn whitespace_and_query_variants_collapse() {
        let eps = normalize(
            &[
                raw("get", "/users ", ""),
                raw("GET", "/users?limit=10", ""),
                raw("GET", " / users", ""),
            ],
            "https://api.example.com",
        );
        assert_eq!(eps.len(), 1);
        assert_eq!(eps[0].path, "/users");
        assert_eq!(eps[0].method, "GET");
        assert_eq!(eps[0].id.len(), ENDPOINT_ID_LEN);
    }

    #[test]
    fn first_occurrence_wins_and_order_is_kept() {
        let eps = normalize(
            &[
                raw("GET", "/b", "first"),
                raw("GET", "/a", ""),
                raw("GET", "/b", "second"),
                raw("POST", "/b", ""),
            ],
            "s",
        );
        let summary: Vec<(&str, &str, &str)> = eps
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str(), e.description.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![("GET", "/b", "first"), ("GET", "/a", ""), ("POST", "/b", "")]
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let input = vec![
            raw("GET", "/users/{id}", "Get a user"),
            raw("", "/health", ""),
            raw("DELETE", "   ", "skipped"),
        ];
        let a = normalize(&input, "https://api.example.com");
        let b = normalize(&input, "https://api.example.com");
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a[1].method, "GET");
        assert_ne!(a[0].id, a[1].id);
    }

    #[test]
    fn ids_depend_on_server() {
        let input = vec![raw("GET", "/users", "")];
        let a = normalize(&input, "https://a.example.com");
        let b = normalize(&input, "https://b.example.com");
        assert_ne!(a[0].id, b[0].id);
        assert_eq!(a[0].id, endpoint_id("https://a.example.com|GET|/users"));
    }

    #[test]
    fn empty_supplied_server_falls_back_to_discovered() {
        let mut ep = raw("GET", "/users", "");
        ep.server = "https://api.x.com".to_string();
        let eps = normalize(&[ep], "");
        assert_eq!(eps[0].server, "https://api.x.com");
    }

    #[test]
    fn confidence_stays_in_bounds() {
        let params = vec![json!({"name": "id"})];
        for description in ["", "desc"] {
            for parameters in [&[][..], &params[..]] {
                for source in [
                    EndpointSource::Openapi,
                    EndpointSource::Llm,
                    EndpointSource::Regex,
                    EndpointSource::Unknown,
                ] {
                    let c = confidence(description, parameters, source);
                    assert!((0.5..=1.0).contains(&c), "{c}");
                }
            }
        }
        assert!((confidence("d", &params, EndpointSource::Openapi) - 1.0).abs() < 1e-9);
        assert!((confidence("", &[], EndpointSource::Regex) - 0.5).abs() < 1e-9);
        assert!((confidence("d", &[], EndpointSource::Llm) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn catalog_groups_by_resource() {
        let eps = normalize(
            &[
                raw("GET", "/api/v1/users", "List users"),
                raw("GET", "/api/v1/users/{id}", ""),
                raw("GET", "/v1/orders", ""),
                raw("GET", "/{id}", ""),
            ],
            "s",
        );
        let catalog = build_catalog(&eps);
        assert_eq!(catalog.total_endpoints, 4);
        assert_eq!(catalog.resource_count, 3);
        let users = &catalog.resources["users"];
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].description, "List users");
        assert_eq!(users[1].description, "GET /api/v1/users/{id}");
        assert!(catalog.resources.contains_key("orders"));
        assert!(catalog.resources.contains_key("resource"));
    }
}
