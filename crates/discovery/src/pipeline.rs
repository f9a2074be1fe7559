//! The discovery graph.
//!
//! ```text
//! classify_input -> files? parse_files : discover_from_web
//!                -> endpoint_extractor -> normalize_and_dedup -> summarize_for_ui
//!                -> [interrupt] interrupt_for_selection -> END
//! ```

use crate::config::DiscoveryConfig;
use crate::crawl::{discover_pages, parse_root_url};
use crate::extract::{oracle_endpoints, regex_endpoints};
use crate::fetch::WebFetcher;
use crate::model::{Catalog, NormalizedEndpoint, Page, RawEndpoint};
use crate::normalize::{build_catalog, normalize};
use crate::openapi::{endpoints_from_document, is_openapi_document};
use crate::oracle::ContentExtractor;
use crate::resolver::parse_document;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use toolforge_workflow::{
    CheckpointStore, FnStep, Graph, Next, RunOutcome, StepError, StepHandler, StepId, Workflow,
    WorkflowError, WorkflowState,
};

pub const GRAPH_NAME: &str = "discovery";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryStep {
    ClassifyInput,
    ParseFiles,
    DiscoverFromWeb,
    EndpointExtractor,
    NormalizeAndDedup,
    SummarizeForUi,
    InterruptForSelection,
}

impl StepId for DiscoveryStep {
    fn name(self) -> &'static str {
        match self {
            DiscoveryStep::ClassifyInput => "classify_input",
            DiscoveryStep::ParseFiles => "parse_files",
            DiscoveryStep::DiscoverFromWeb => "discover_from_web",
            DiscoveryStep::EndpointExtractor => "endpoint_extractor",
            DiscoveryStep::NormalizeAndDedup => "normalize_and_dedup",
            DiscoveryStep::SummarizeForUi => "summarize_for_ui",
            DiscoveryStep::InterruptForSelection => "interrupt_for_selection",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "classify_input" => DiscoveryStep::ClassifyInput,
            "parse_files" => DiscoveryStep::ParseFiles,
            "discover_from_web" => DiscoveryStep::DiscoverFromWeb,
            "endpoint_extractor" => DiscoveryStep::EndpointExtractor,
            "normalize_and_dedup" => DiscoveryStep::NormalizeAndDedup,
            "summarize_for_ui" => DiscoveryStep::SummarizeForUi,
            "interrupt_for_selection" => DiscoveryStep::InterruptForSelection,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    File,
    Url,
}

/// Caller-supplied input: spec files or a documentation root URL, never both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryInput {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub root_url: Option<String>,
    /// Server every discovered endpoint is attributed to.
    #[serde(default)]
    pub server_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryState {
    pub input: DiscoveryInput,
    #[serde(default)]
    pub input_type: Option<InputType>,
    #[serde(default)]
    pub pages: Vec<Page>,
    #[serde(default)]
    pub endpoints_raw: Vec<RawEndpoint>,
    #[serde(default)]
    pub endpoints_normalized: Vec<NormalizedEndpoint>,
    #[serde(default)]
    pub catalog: Catalog,
    /// Set when the thread is resumed past the selection interrupt.
    #[serde(default)]
    pub selected_ids: Option<Vec<String>>,
}

impl DiscoveryState {
    #[must_use]
    pub fn new(input: DiscoveryInput) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    /// Selected endpoints in discovery order.
    #[must_use]
    pub fn selected_endpoints(&self) -> Vec<NormalizedEndpoint> {
        let Some(ids) = &self.selected_ids else {
            return Vec::new();
        };
        self.endpoints_normalized
            .iter()
            .filter(|e| ids.contains(&e.id))
            .cloned()
            .collect()
    }
}

/// Resume payload for the selection interrupt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub endpoint_ids: Vec<String>,
}

impl WorkflowState for DiscoveryState {
    type Update = Selection;

    fn apply(&mut self, update: Selection) {
        self.selected_ids = Some(update.endpoint_ids);
    }
}

/// Collaborators shared by the discovery steps.
pub struct DiscoveryContext {
    pub config: DiscoveryConfig,
    pub fetcher: Arc<dyn WebFetcher>,
    pub extractor: Arc<dyn ContentExtractor>,
}

fn with_ctx<F, Fut>(ctx: &Arc<DiscoveryContext>, f: F) -> impl StepHandler<DiscoveryState> + 'static
where
    F: Fn(Arc<DiscoveryContext>, DiscoveryState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<DiscoveryState, StepError>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    FnStep(move |state| f(Arc::clone(&ctx), state))
}

fn route_input(state: &DiscoveryState) -> &'static str {
    match state.input_type {
        Some(InputType::File) => "file",
        _ => "url",
    }
}

/// Build the discovery step table.
///
/// # Errors
///
/// Only fails if the table itself is inconsistent.
pub fn build_graph(
    ctx: Arc<DiscoveryContext>,
) -> Result<Graph<DiscoveryStep, DiscoveryState>, WorkflowError> {
    use DiscoveryStep::{
        ClassifyInput, DiscoverFromWeb, EndpointExtractor, InterruptForSelection,
        NormalizeAndDedup, ParseFiles, SummarizeForUi,
    };

    Graph::builder(GRAPH_NAME, ClassifyInput)
        .step(ClassifyInput, FnStep(classify_input))
        .step(ParseFiles, with_ctx(&ctx, parse_files))
        .step(DiscoverFromWeb, with_ctx(&ctx, discover_from_web))
        .step(EndpointExtractor, with_ctx(&ctx, endpoint_extractor))
        .step(NormalizeAndDedup, FnStep(normalize_and_dedup))
        .step(SummarizeForUi, FnStep(summarize_for_ui))
        .step(InterruptForSelection, FnStep(interrupt_for_selection))
        .branch(
            ClassifyInput,
            route_input,
            [
                ("file", Next::Step(ParseFiles)),
                ("url", Next::Step(DiscoverFromWeb)),
            ],
        )
        .edge(ParseFiles, Next::Step(EndpointExtractor))
        .edge(DiscoverFromWeb, Next::Step(EndpointExtractor))
        .edge(EndpointExtractor, Next::Step(NormalizeAndDedup))
        .edge(NormalizeAndDedup, Next::Step(SummarizeForUi))
        .edge(SummarizeForUi, Next::Step(InterruptForSelection))
        .edge(InterruptForSelection, Next::End)
        .interrupt_before(InterruptForSelection)
        .build()
}

async fn classify_input(mut state: DiscoveryState) -> Result<DiscoveryState, StepError> {
    let has_files = !state.input.files.is_empty();
    let root_url = state
        .input
        .root_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());

    let input_type = match (has_files, root_url) {
        (true, None) => InputType::File,
        (false, Some(url)) => {
            parse_root_url(url).map_err(|e| StepError::Input(e.to_string()))?;
            InputType::Url
        }
        (false, None) => {
            return Err(StepError::Input(
                "either spec files or a root URL is required".to_string(),
            ));
        }
        (true, Some(_)) => {
            return Err(StepError::Input(
                "spec files and a root URL are mutually exclusive".to_string(),
            ));
        }
    };

    tracing::info!(input_type = ?input_type, "Input classified");
    state.input_type = Some(input_type);
    state.pages.clear();
    state.endpoints_raw.clear();
    state.endpoints_normalized.clear();
    state.catalog = Catalog::default();
    state.selected_ids = None;
    Ok(state)
}

async fn parse_files(
    ctx: Arc<DiscoveryContext>,
    mut state: DiscoveryState,
) -> Result<DiscoveryState, StepError> {
    for path in &state.input.files {
        let location = path.display().to_string();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Error reading {}: {}", location, e);
                continue;
            }
        };

        match parse_document(&content, &location) {
            Ok(doc) if is_openapi_document(&doc) => {
                let file = path.clone();
                let found = match tokio::task::spawn_blocking(move || {
                    endpoints_from_document(file, doc)
                })
                .await
                {
                    Ok(found) => found,
                    Err(e) => {
                        tracing::warn!("Error parsing {}: {}", location, e);
                        continue;
                    }
                };
                tracing::info!(file = %location, endpoints = found.len(), "Parsed OpenAPI spec");
                state.endpoints_raw.extend(found);
            }
            parsed => {
                if let Err(e) = parsed {
                    tracing::debug!("{} is not structured data: {}", location, e);
                }
                let found = oracle_endpoints(
                    ctx.extractor.as_ref(),
                    &content,
                    ctx.config.extraction_truncate_chars,
                    ctx.config.oracle_timeout(),
                )
                .await;
                tracing::info!(file = %location, endpoints = found.len(), "Extracted endpoints from text");
                state.endpoints_raw.extend(found);
            }
        }
    }
    Ok(state)
}

async fn discover_from_web(
    ctx: Arc<DiscoveryContext>,
    mut state: DiscoveryState,
) -> Result<DiscoveryState, StepError> {
    let Some(root_url) = state.input.root_url.as_deref() else {
        return Ok(state);
    };
    let root = parse_root_url(root_url).map_err(|e| StepError::Input(e.to_string()))?;

    tracing::info!("Discovering from URL: {}", root);
    state.pages = discover_pages(ctx.fetcher.as_ref(), &root, &ctx.config).await;
    tracing::info!(pages = state.pages.len(), "Discovered pages");
    Ok(state)
}

async fn endpoint_extractor(
    ctx: Arc<DiscoveryContext>,
    mut state: DiscoveryState,
) -> Result<DiscoveryState, StepError> {
    if state.pages.is_empty() {
        return Ok(state);
    }

    let server_url = state.input.server_url.clone();
    for page in &state.pages {
        if page.content.is_empty() {
            continue;
        }
        tracing::debug!(url = %page.url, "Extracting endpoints from page");
        state
            .endpoints_raw
            .extend(regex_endpoints(&page.content, &server_url));
        state.endpoints_raw.extend(
            oracle_endpoints(
                ctx.extractor.as_ref(),
                &page.content,
                ctx.config.extraction_truncate_chars,
                ctx.config.oracle_timeout(),
            )
            .await,
        );
    }

    tracing::info!(raw = state.endpoints_raw.len(), "Extracted raw endpoints");
    Ok(state)
}

async fn normalize_and_dedup(mut state: DiscoveryState) -> Result<DiscoveryState, StepError> {
    state.endpoints_normalized = normalize(&state.endpoints_raw, &state.input.server_url);
    Ok(state)
}

async fn summarize_for_ui(mut state: DiscoveryState) -> Result<DiscoveryState, StepError> {
    state.catalog = build_catalog(&state.endpoints_normalized);
    tracing::info!(
        endpoints = state.catalog.total_endpoints,
        resources = state.catalog.resource_count,
        "Created catalog"
    );
    Ok(state)
}

async fn interrupt_for_selection(state: DiscoveryState) -> Result<DiscoveryState, StepError> {
    let selected = state.selected_ids.as_deref().unwrap_or_default();
    let unknown = selected
        .iter()
        .filter(|id| !state.endpoints_normalized.iter().any(|e| &e.id == *id))
        .count();
    if unknown > 0 {
        tracing::warn!(unknown, "Selection contains ids that were not discovered");
    }
    tracing::info!(selected = selected.len(), "Selection received");
    Ok(state)
}

/// Discovery graph bound to a checkpoint store.
pub struct DiscoveryPipeline {
    workflow: Workflow<DiscoveryStep, DiscoveryState>,
}

impl DiscoveryPipeline {
    /// # Errors
    ///
    /// Returns an error if the graph table is inconsistent.
    pub fn new(
        ctx: DiscoveryContext,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self, WorkflowError> {
        let graph = build_graph(Arc::new(ctx))?;
        Ok(Self {
            workflow: Workflow::new(graph, store),
        })
    }

    #[must_use]
    pub fn workflow(&self) -> &Workflow<DiscoveryStep, DiscoveryState> {
        &self.workflow
    }

    /// Run discovery until the selection interrupt.
    ///
    /// # Errors
    ///
    /// Input errors, step failures and checkpoint failures.
    pub async fn run(
        &self,
        thread_id: &str,
        input: DiscoveryInput,
    ) -> Result<RunOutcome<DiscoveryStep, DiscoveryState>, WorkflowError> {
        self.workflow
            .start(thread_id, DiscoveryState::new(input))
            .await
    }

    /// Resume a suspended thread with the chosen endpoint ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread is unknown or a checkpoint cannot be written.
    pub async fn select(
        &self,
        thread_id: &str,
        endpoint_ids: Vec<String>,
    ) -> Result<RunOutcome<DiscoveryStep, DiscoveryState>, WorkflowError> {
        self.workflow
            .resume(thread_id, Some(Selection { endpoint_ids }))
            .await
    }
}
