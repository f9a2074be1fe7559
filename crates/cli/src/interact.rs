//! Terminal prompts and output.

use anyhow::Context as _;
use dialoguer::{Confirm, MultiSelect};
use std::path::Path;
use toolforge_discovery::{Catalog, NormalizedEndpoint};
use toolforge_generation::Tool;

pub fn print_catalog(catalog: &Catalog) {
    println!(
        "\nDiscovered {} endpoint(s) in {} resource group(s)",
        catalog.total_endpoints, catalog.resource_count
    );
    for (resource, entries) in &catalog.resources {
        println!("  {resource}");
        for e in entries {
            println!("    [{:<6}] {}  ({:.2})", e.method, e.path, e.confidence);
        }
    }
}

/// Let the user tick the endpoints to generate tools for. At least one must be chosen.
pub fn select_endpoints(endpoints: &[NormalizedEndpoint]) -> anyhow::Result<Vec<String>> {
    let items: Vec<String> = endpoints
        .iter()
        .map(|e| format!("[{:<6}] {}", e.method, e.path))
        .collect();
    let picked = MultiSelect::new()
        .with_prompt("Select endpoints to generate tools from (Space toggles, Enter confirms)")
        .items(&items)
        .interact()
        .context("Failed to read endpoint selection")?;
    if picked.is_empty() {
        anyhow::bail!("no endpoints selected");
    }
    Ok(picked.into_iter().map(|i| endpoints[i].id.clone()).collect())
}

pub fn print_tools(tools: &[Tool]) {
    println!("\nGenerated {} tool(s)", tools.len());
    for t in tools {
        println!("  {}  {}", t.name, preview(&t.description, 60));
    }
}

pub fn confirm_tools(count: usize, output: &Path) -> anyhow::Result<bool> {
    Confirm::new()
        .with_prompt(format!("Write {count} tool(s) to {}?", output.display()))
        .default(true)
        .interact()
        .context("Failed to get confirmation")
}

/// Write the tool list as a pretty-printed JSON array.
pub async fn write_tools(path: &Path, tools: &[Tool]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create dir {}", parent.display()))?;
    }
    let bytes = serde_json::to_vec_pretty(tools).context("serialize tools as json")?;
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("write {}", path.display()))
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
