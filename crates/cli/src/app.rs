//! Discovery, selection, generation and review, end to end.

use crate::cli::{Cli, LlmArgs};
use crate::interact;
use crate::llm::{ChatModel, LlmOracles};
use crate::settings::{Settings, resolve_settings};
use anyhow::Context as _;
use std::sync::Arc;
use toolforge_discovery::{
    ContentExtractor, DiscoveryContext, DiscoveryInput, DiscoveryPipeline, HttpFetcher,
    NoExtraction,
};
use toolforge_generation::{
    DeclaredParameters, DisplayNamer, GenerationContext, GenerationPipeline, GenerationRequest,
    HeuristicNames, Review, SchemaSynthesizer,
};
use toolforge_workflow::{
    CheckpointStore, InMemoryCheckpointStore, JsonDirCheckpointStore, WorkflowError,
};

struct Oracles {
    extractor: Arc<dyn ContentExtractor>,
    synthesizer: Arc<dyn SchemaSynthesizer>,
    namer: Arc<dyn DisplayNamer>,
}

fn build_oracles(llm: &LlmArgs, settings: &Settings) -> anyhow::Result<Oracles> {
    let Some(base_url) = llm.base_url.as_deref().filter(|u| !u.trim().is_empty()) else {
        tracing::info!("No model endpoint configured; running offline");
        return Ok(Oracles {
            extractor: Arc::new(NoExtraction),
            synthesizer: Arc::new(DeclaredParameters),
            namer: Arc::new(HeuristicNames),
        });
    };

    let timeout = settings.generation.oracle_timeout();
    let main = ChatModel::new(base_url, llm.api_key.clone(), llm.model.clone(), timeout)
        .context("build model client")?;
    let naming_model = llm.naming_model.clone().unwrap_or_else(|| llm.model.clone());
    let naming = ChatModel::new(base_url, llm.api_key.clone(), naming_model, timeout)
        .context("build naming model client")?;
    let oracles = Arc::new(LlmOracles { main, naming });
    tracing::info!(model = %llm.model, "Using model endpoint {}", base_url);
    Ok(Oracles {
        extractor: oracles.clone(),
        synthesizer: oracles.clone(),
        namer: oracles,
    })
}

fn checkpoint_store(cli: &Cli) -> Arc<dyn CheckpointStore> {
    match &cli.checkpoint_dir {
        Some(dir) => Arc::new(JsonDirCheckpointStore::new(dir.clone())),
        None => Arc::new(InMemoryCheckpointStore::new()),
    }
}

/// True when `err` stems from bad input rather than a runtime failure.
pub fn is_input_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<WorkflowError>()
        .is_some_and(WorkflowError::is_input_error)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = resolve_settings(&cli).await?;
    let oracles = build_oracles(&cli.llm, &settings)?;
    let store = checkpoint_store(&cli);
    let run_id = uuid::Uuid::new_v4();
    let discovery_thread = format!("discovery-{run_id}");
    let generation_thread = format!("generation-{run_id}");

    let discovery = DiscoveryPipeline::new(
        DiscoveryContext {
            fetcher: Arc::new(HttpFetcher::new(settings.discovery.fetch.clone())?),
            extractor: oracles.extractor,
            config: settings.discovery.clone(),
        },
        Arc::clone(&store),
    )?;
    let input = DiscoveryInput {
        files: cli.files.clone(),
        root_url: cli.url.clone(),
        server_url: cli.server_url.clone().unwrap_or_default(),
    };
    let found = discovery.run(&discovery_thread, input).await?;
    let found = found.into_state();
    if found.endpoints_normalized.is_empty() {
        anyhow::bail!("no endpoints discovered");
    }
    interact::print_catalog(&found.catalog);

    let selected_ids = if cli.auto_approve {
        found
            .endpoints_normalized
            .iter()
            .map(|e| e.id.clone())
            .collect()
    } else {
        interact::select_endpoints(&found.endpoints_normalized)?
    };
    tracing::info!(selected = selected_ids.len(), "Endpoints selected");
    let discovered = discovery
        .select(&discovery_thread, selected_ids.clone())
        .await?
        .into_state();

    let generation = GenerationPipeline::new(
        GenerationContext {
            fetcher: Arc::new(HttpFetcher::new(settings.generation.fetch.clone())?),
            synthesizer: oracles.synthesizer,
            namer: oracles.namer,
            config: settings.generation.clone(),
        },
        store,
    )?;
    let request = GenerationRequest {
        endpoint_ids: selected_ids,
        endpoints: discovered.endpoints_normalized,
        vendor: cli.name.clone(),
        server_url: cli.server_url.clone(),
    };
    let proposed = generation
        .run(&generation_thread, request)
        .await?
        .into_state();
    interact::print_tools(&proposed.tools);

    if !cli.auto_approve && !interact::confirm_tools(proposed.tools.len(), &cli.output)? {
        anyhow::bail!("tools were not approved; nothing written");
    }
    let done = generation
        .review(&generation_thread, Review::Approve)
        .await?
        .into_state();

    for e in &done.errors {
        let subject = e
            .tool_name
            .as_deref()
            .or(e.endpoint_id.as_deref())
            .unwrap_or("?");
        tracing::warn!(stage = ?e.stage, "{}: {}", subject, e.error);
    }
    interact::write_tools(&cli.output, &done.tools).await?;
    println!(
        "\nWrote {} tool(s) to {}",
        done.final_count.unwrap_or(done.tools.len()),
        cli.output.display()
    );
    Ok(())
}
