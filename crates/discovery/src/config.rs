use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Discovery settings. Every field has a default so partial config files work.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscoveryConfig {
    /// Page cap for the breadth-first crawl fallback.
    pub max_crawl_pages: usize,

    /// Maximum number of `<loc>` entries taken from a sitemap.
    pub sitemap_url_limit: usize,

    /// Delay before every crawl request.
    pub crawl_throttle_ms: u64,

    /// Text sent to the content-extraction oracle is cut to this many characters.
    pub extraction_truncate_chars: usize,

    /// Upper bound for one content-extraction oracle call. A call that runs over yields no
    /// endpoints.
    pub oracle_timeout_ms: u64,

    /// Outbound HTTP settings.
    pub fetch: FetchConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_crawl_pages: 10,
            sitemap_url_limit: 50,
            crawl_throttle_ms: 500,
            extraction_truncate_chars: 8000,
            oracle_timeout_ms: 60_000,
            fetch: FetchConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    #[must_use]
    pub fn crawl_throttle(&self) -> Duration {
        Duration::from_millis(self.crawl_throttle_ms)
    }

    #[must_use]
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchConfig {
    /// Per-request timeout.
    pub timeout_ms: u64,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,

    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: concat!("toolforge/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Retry policy for fetches (exponential backoff, optionally capped).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub maximum_attempts: u32,
    pub initial_interval_ms: u64,
    pub backoff_coefficient: f64,
    pub maximum_interval_ms: Option<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            maximum_attempts: 3,
            initial_interval_ms: 500,
            backoff_coefficient: 2.0,
            maximum_interval_ms: Some(5_000),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exp = attempt.saturating_sub(1).min(30);
        let coeff = self.backoff_coefficient;
        if !coeff.is_finite() || coeff <= 0.0 {
            return Duration::ZERO;
        }
        let mult = coeff.powi(i32::try_from(exp).unwrap_or(30));
        if !mult.is_finite() || mult <= 0.0 {
            return Duration::ZERO;
        }

        let mut d = Duration::from_millis(self.initial_interval_ms).mul_f64(mult);
        if let Some(max_ms) = self.maximum_interval_ms {
            d = d.min(Duration::from_millis(max_ms));
        }
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: DiscoveryConfig = serde_yaml::from_str(
            r"
maxCrawlPages: 3
fetch:
  retry:
    maximumAttempts: 5
",
        )
        .unwrap();
        assert_eq!(cfg.max_crawl_pages, 3);
        assert_eq!(cfg.sitemap_url_limit, 50);
        assert_eq!(cfg.oracle_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.fetch.timeout_ms, 10_000);
        assert_eq!(cfg.fetch.retry.maximum_attempts, 5);
        assert_eq!(cfg.fetch.retry.initial_interval_ms, 500);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            maximum_attempts: 5,
            initial_interval_ms: 100,
            backoff_coefficient: 2.0,
            maximum_interval_ms: Some(300),
        };
        assert_eq!(policy.delay_after(0), Duration::ZERO);
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));
        assert_eq!(policy.delay_after(10), Duration::from_millis(300));
    }
}
