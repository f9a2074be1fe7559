use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use toolforge_schema::NamingScheme;

/// Discover an HTTP API's endpoints and turn the chosen ones into tool definitions.
#[derive(Parser, Debug)]
#[command(name = "toolforge", version, about, long_about = None)]
pub struct Cli {
    /// Vendor name used as the first segment of tool names (derived from the server host if
    /// omitted)
    #[arg(long, env = "TOOLFORGE_VENDOR")]
    pub name: Option<String>,

    /// Base server URL every tool calls; overrides servers found in the input
    #[arg(long, env = "TOOLFORGE_SERVER_URL")]
    pub server_url: Option<String>,

    /// API specification file(s) (OpenAPI JSON/YAML or free text)
    #[arg(short, long, num_args = 1.., conflicts_with = "url")]
    pub files: Vec<PathBuf>,

    /// Documentation root URL to crawl
    #[arg(short, long)]
    pub url: Option<String>,

    /// Where to write the JSON array of tools
    #[arg(short, long, default_value = "mcp_tools.json")]
    pub output: PathBuf,

    /// Select every endpoint and approve every tool without prompting
    #[arg(long)]
    pub auto_approve: bool,

    /// Pipeline settings file (YAML or JSON)
    #[arg(long, env = "TOOLFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Tool naming scheme: `verb` or `display-name`
    #[arg(long)]
    pub naming: Option<NamingScheme>,

    /// Persist workflow checkpoints as JSON files in this directory
    #[arg(long, env = "TOOLFORGE_CHECKPOINT_DIR")]
    pub checkpoint_dir: Option<PathBuf>,

    /// Log filter used when `RUST_LOG` is not set
    #[arg(long, env = "TOOLFORGE_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(flatten)]
    pub llm: LlmArgs,
}

/// OpenAI-compatible chat-completions endpoint used for the oracles. Without a base URL the
/// run is fully offline: no text extraction, declared parameters only, heuristic names.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct LlmArgs {
    #[arg(long = "llm-base-url", env = "TOOLFORGE_LLM_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long = "llm-api-key", env = "TOOLFORGE_LLM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long = "llm-model", env = "TOOLFORGE_LLM_MODEL", default_value = "gpt-4.1")]
    pub model: String,

    /// Smaller model for display names (defaults to `--llm-model`)
    #[arg(long = "llm-naming-model", env = "TOOLFORGE_LLM_NAMING_MODEL")]
    pub naming_model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}
