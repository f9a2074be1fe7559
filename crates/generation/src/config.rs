use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolforge_discovery::FetchConfig;
use toolforge_schema::NamingScheme;

/// Generation settings. Every field has a default so partial config files work.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    /// How the last segment of a tool name is formed.
    pub naming: NamingScheme,

    /// Bound on every oracle call. An elapsed call counts as a failure of that item.
    pub oracle_timeout_ms: u64,

    /// Fetch the server's landing page as extra context for schema synthesis.
    pub fetch_docs: bool,

    /// Fetched documentation is cut to this many characters.
    pub docs_truncate_chars: usize,

    pub fetch: FetchConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            naming: NamingScheme::default(),
            oracle_timeout_ms: 60_000,
            fetch_docs: true,
            docs_truncate_chars: 8000,
            fetch: FetchConfig::default(),
        }
    }
}

impl GenerationConfig {
    #[must_use]
    pub fn oracle_timeout(&self) -> Duration {
        Duration::from_millis(self.oracle_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_scheme_from_json() {
        let cfg: GenerationConfig =
            serde_json::from_str(r#"{"naming": "displayName", "oracleTimeoutMs": 5}"#).unwrap();
        assert_eq!(cfg.naming, NamingScheme::DisplayName);
        assert_eq!(cfg.oracle_timeout(), Duration::from_millis(5));
        assert!(cfg.fetch_docs);
        assert_eq!(cfg.docs_truncate_chars, 8000);
    }
}
