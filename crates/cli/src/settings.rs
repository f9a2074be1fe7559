use crate::cli::Cli;
use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use toolforge_discovery::DiscoveryConfig;
use toolforge_generation::GenerationConfig;

/// Pipeline settings as read from `--config`.
///
/// ```yaml
/// discovery:
///   maxCrawlPages: 20
/// generation:
///   naming: displayName
///   oracleTimeoutMs: 30000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub discovery: DiscoveryConfig,
    pub generation: GenerationConfig,
}

/// Read a settings file. YAML is a superset of JSON, so both parse the same way.
pub async fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read config {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

/// File settings (or defaults) with command-line overrides applied.
pub async fn resolve_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => load_settings(path).await?,
        None => Settings::default(),
    };
    if let Some(naming) = cli.naming {
        settings.generation.naming = naming;
    }
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::tempdir;
    use toolforge_schema::NamingScheme;

    #[tokio::test]
    async fn yaml_and_json_files_load() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("toolforge.yaml");
        std::fs::write(
            &yaml,
            "discovery:\n  maxCrawlPages: 3\ngeneration:\n  naming: displayName\n",
        )
        .unwrap();
        let s = load_settings(&yaml).await.unwrap();
        assert_eq!(s.discovery.max_crawl_pages, 3);
        assert_eq!(s.discovery.sitemap_url_limit, 50);
        assert_eq!(s.generation.naming, NamingScheme::DisplayName);

        let json = dir.path().join("toolforge.json");
        std::fs::write(&json, r#"{"generation": {"oracleTimeoutMs": 1000}}"#).unwrap();
        let s = load_settings(&json).await.unwrap();
        assert_eq!(s.generation.oracle_timeout_ms, 1000);
        assert_eq!(s.discovery, DiscoveryConfig::default());
    }

    #[tokio::test]
    async fn flags_override_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.yaml");
        std::fs::write(&path, "generation:\n  naming: displayName\n").unwrap();
        let config = path.to_string_lossy().to_string();

        let cli = Cli::try_parse_from([
            "toolforge",
            "--url",
            "https://docs.example.com",
            "--config",
            config.as_str(),
            "--naming",
            "verb",
        ])
        .unwrap();
        assert_eq!(
            resolve_settings(&cli).await.unwrap().generation.naming,
            NamingScheme::Verb
        );
    }

    #[tokio::test]
    async fn missing_config_is_an_error() {
        let err = load_settings(Path::new("/definitely/not/here.yaml"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("read config"));
    }
}
