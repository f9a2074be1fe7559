//! Endpoint extraction from free text: fixed regex patterns plus the content-extraction oracle.

use crate::model::{EndpointSource, RawEndpoint};
use crate::oracle::ContentExtractor;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Patterns matched case-insensitively against page text, in this order. Group 1 is the method,
/// group 2 the path.
pub const ENDPOINT_PATTERNS: [&str; 3] = [
    r"(GET|POST|PUT|DELETE|PATCH)\s+(/api/[\w\-/{}]+)",
    r"(GET|POST|PUT|DELETE|PATCH)\s+(/v\d+/[\w\-/{}]+)",
    r"`(GET|POST|PUT|DELETE|PATCH)\s+([^`]+)`",
];

static COMPILED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ENDPOINT_PATTERNS
        .iter()
        .map(|p| Regex::new(&format!("(?i){p}")).expect("valid regex"))
        .collect()
});

/// Every match of every pattern, tagged `regex` and attributed to `server_url`.
///
/// Overlapping patterns may report the same endpoint more than once; normalization dedups.
#[must_use]
pub fn regex_endpoints(content: &str, server_url: &str) -> Vec<RawEndpoint> {
    let mut out = Vec::new();
    for re in COMPILED_PATTERNS.iter() {
        for caps in re.captures_iter(content) {
            let (Some(method), Some(path)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            out.push(RawEndpoint {
                method: method.as_str().to_ascii_uppercase(),
                path: path.as_str().to_string(),
                server: server_url.to_string(),
                source: EndpointSource::Regex,
                ..RawEndpoint::default()
            });
        }
    }
    out
}

/// Longest prefix of `text` with at most `max_chars` characters.
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Ask the oracle about (a prefix of) `text` and tag the answers as `llm`.
///
/// A call that runs past `timeout` is abandoned and yields nothing.
pub async fn oracle_endpoints(
    oracle: &dyn ContentExtractor,
    text: &str,
    max_chars: usize,
    timeout: Duration,
) -> Vec<RawEndpoint> {
    let call = oracle.extract(truncate_chars(text, max_chars));
    let Ok(found) = tokio::time::timeout(timeout, call).await else {
        tracing::warn!("Endpoint extraction timed out after {:?}", timeout);
        return Vec::new();
    };
    found
        .into_iter()
        .map(|mut ep| {
            let method = ep.method.trim().to_ascii_uppercase();
            ep.method = if method.is_empty() {
                "GET".to_string()
            } else {
                method
            };
            ep.source = EndpointSource::Llm;
            ep
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[test]
    fn patterns_match_in_order() {
        let text = "Use get /api/users to list.\nThen POST /v2/orders/{id}/items.\n\
                    Or `DELETE /sessions/current`.";
        let eps = regex_endpoints(text, "https://api.example.com");
        let pairs: Vec<(&str, &str)> = eps
            .iter()
            .map(|e| (e.method.as_str(), e.path.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("GET", "/api/users"),
                ("POST", "/v2/orders/{id}/items"),
                ("DELETE", "/sessions/current"),
            ]
        );
        assert!(eps.iter().all(|e| e.source == EndpointSource::Regex));
        assert!(eps.iter().all(|e| e.server == "https://api.example.com"));
        assert!(eps.iter().all(|e| e.description.is_empty()));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContentExtractor for Recording {
        async fn extract(&self, text: &str) -> Vec<RawEndpoint> {
            self.seen.lock().push(text.to_string());
            vec![RawEndpoint {
                method: " post ".to_string(),
                path: "/things".to_string(),
                ..RawEndpoint::default()
            }, RawEndpoint {
                path: "/other".to_string(),
                source: EndpointSource::Openapi,
                ..RawEndpoint::default()
            }]
        }
    }

    #[tokio::test]
    async fn oracle_answers_are_truncated_and_tagged() {
        let oracle = Recording {
            seen: Mutex::new(Vec::new()),
        };
        let eps = oracle_endpoints(&oracle, "abcdef", 3, Duration::from_secs(5)).await;
        assert_eq!(oracle.seen.lock().as_slice(), ["abc".to_string()]);
        assert_eq!(eps[0].method, "POST");
        assert_eq!(eps[1].method, "GET");
        assert!(eps.iter().all(|e| e.source == EndpointSource::Llm));
    }

    struct Stalled;

    #[async_trait]
    impl ContentExtractor for Stalled {
        async fn extract(&self, _text: &str) -> Vec<RawEndpoint> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn stalled_oracle_times_out_empty() {
        let eps = oracle_endpoints(&Stalled, "GET /x", 100, Duration::from_millis(20)).await;
        assert!(eps.is_empty());
    }
}
