//! The generation graph.
//!
//! ```text
//! plan_work -> fetch_docs -> schema_synthesis -> compose_tool -> validate -> aggregate_tools
//!           -> [interrupt] interrupt_for_review -> finalize -> END
//! ```

use crate::config::GenerationConfig;
use crate::model::{
    ErrorStage, GenerationError, GenerationStatus, ProtocolData, Tool, ToolMetadata, WorkItem,
    WorkStatus,
};
use crate::oracle::{DisplayNamer, SchemaSynthesizer, SynthesisRequest, generate_display_name};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use toolforge_discovery::extract::truncate_chars;
use toolforge_discovery::{EndpointSource, NormalizedEndpoint, WebFetcher};
use toolforge_schema::naming::{
    compose_tool_name, compose_tool_name_from_display, determine_verb, extract_resource,
    extract_vendor, extract_version,
};
use toolforge_schema::{NamingScheme, augment_schema, is_flexible, validate_parameters};
use toolforge_workflow::{
    CheckpointStore, FnStep, Graph, Next, RunOutcome, StepError, StepHandler, StepId, TaskError,
    Workflow, WorkflowError, WorkflowState, fan_out,
};

pub const GRAPH_NAME: &str = "generation";

/// Extra time a compose task gets on top of the display-name oracle timeout.
const COMPOSE_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenerationStep {
    PlanWork,
    FetchDocs,
    SchemaSynthesis,
    ComposeTool,
    Validate,
    AggregateTools,
    InterruptForReview,
    Finalize,
}

impl StepId for GenerationStep {
    fn name(self) -> &'static str {
        match self {
            GenerationStep::PlanWork => "plan_work",
            GenerationStep::FetchDocs => "fetch_docs",
            GenerationStep::SchemaSynthesis => "schema_synthesis",
            GenerationStep::ComposeTool => "compose_tool",
            GenerationStep::Validate => "validate",
            GenerationStep::AggregateTools => "aggregate_tools",
            GenerationStep::InterruptForReview => "interrupt_for_review",
            GenerationStep::Finalize => "finalize",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "plan_work" => GenerationStep::PlanWork,
            "fetch_docs" => GenerationStep::FetchDocs,
            "schema_synthesis" => GenerationStep::SchemaSynthesis,
            "compose_tool" => GenerationStep::ComposeTool,
            "validate" => GenerationStep::Validate,
            "aggregate_tools" => GenerationStep::AggregateTools,
            "interrupt_for_review" => GenerationStep::InterruptForReview,
            "finalize" => GenerationStep::Finalize,
            _ => return None,
        })
    }
}

/// What the caller hands over after discovery.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub endpoint_ids: Vec<String>,
    pub endpoints: Vec<NormalizedEndpoint>,
    /// Vendor segment of tool names. Derived from the server host when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// Overrides every endpoint's own server when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,
}

impl GenerationRequest {
    /// Server a tool for `endpoint` will call.
    #[must_use]
    pub fn effective_server<'a>(&'a self, endpoint: &'a NormalizedEndpoint) -> &'a str {
        match self.server_url.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => endpoint.server.trim(),
        }
    }

    fn vendor_for(&self, server: &str) -> String {
        match self.vendor.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => extract_vendor(server),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationState {
    pub request: GenerationRequest,
    #[serde(default)]
    pub work_items: Vec<WorkItem>,
    #[serde(default)]
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub errors: Vec<GenerationError>,
    /// Set when the thread is resumed past the review interrupt.
    #[serde(default)]
    pub approved: Option<bool>,
    #[serde(default)]
    pub status: GenerationStatus,
    #[serde(default)]
    pub final_count: Option<usize>,
}

impl GenerationState {
    #[must_use]
    pub fn new(request: GenerationRequest) -> Self {
        Self {
            request,
            ..Self::default()
        }
    }
}

/// Resume payload for the review interrupt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "tools")]
pub enum Review {
    Approve,
    /// Replaces the tool list verbatim.
    Edit(Vec<Tool>),
}

impl WorkflowState for GenerationState {
    type Update = Review;

    fn apply(&mut self, update: Review) {
        if let Review::Edit(tools) = update {
            self.tools = tools;
        }
        self.approved = Some(true);
    }
}

/// Collaborators shared by the generation steps.
pub struct GenerationContext {
    pub config: GenerationConfig,
    pub fetcher: Arc<dyn WebFetcher>,
    pub synthesizer: Arc<dyn SchemaSynthesizer>,
    pub namer: Arc<dyn DisplayNamer>,
}

fn with_ctx<F, Fut>(
    ctx: &Arc<GenerationContext>,
    f: F,
) -> impl StepHandler<GenerationState> + 'static
where
    F: Fn(Arc<GenerationContext>, GenerationState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<GenerationState, StepError>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    FnStep(move |state| f(Arc::clone(&ctx), state))
}

/// Build the generation step table.
///
/// # Errors
///
/// Only fails if the table itself is inconsistent.
pub fn build_graph(
    ctx: Arc<GenerationContext>,
) -> Result<Graph<GenerationStep, GenerationState>, WorkflowError> {
    use GenerationStep::{
        AggregateTools, ComposeTool, FetchDocs, Finalize, InterruptForReview, PlanWork,
        SchemaSynthesis, Validate,
    };

    Graph::builder(GRAPH_NAME, PlanWork)
        .step(PlanWork, FnStep(plan_work))
        .step(FetchDocs, with_ctx(&ctx, fetch_docs))
        .step(SchemaSynthesis, with_ctx(&ctx, schema_synthesis))
        .step(ComposeTool, with_ctx(&ctx, compose_tool))
        .step(Validate, FnStep(validate))
        .step(AggregateTools, FnStep(aggregate_tools))
        .step(InterruptForReview, FnStep(interrupt_for_review))
        .step(Finalize, FnStep(finalize))
        .edge(PlanWork, Next::Step(FetchDocs))
        .edge(FetchDocs, Next::Step(SchemaSynthesis))
        .edge(SchemaSynthesis, Next::Step(ComposeTool))
        .edge(ComposeTool, Next::Step(Validate))
        .edge(Validate, Next::Step(AggregateTools))
        .edge(AggregateTools, Next::Step(InterruptForReview))
        .edge(InterruptForReview, Next::Step(Finalize))
        .edge(Finalize, Next::End)
        .interrupt_before(InterruptForReview)
        .build()
}

async fn plan_work(mut state: GenerationState) -> Result<GenerationState, StepError> {
    let selected = &state.request.endpoint_ids;
    state.work_items = state
        .request
        .endpoints
        .iter()
        .filter(|e| selected.contains(&e.id))
        .cloned()
        .map(WorkItem::new)
        .collect();
    state.tools.clear();
    state.errors.clear();
    state.approved = None;
    state.status = GenerationStatus::InProgress;
    state.final_count = None;

    tracing::info!(work_items = state.work_items.len(), "Created work items");
    Ok(state)
}

async fn fetch_docs(
    ctx: Arc<GenerationContext>,
    mut state: GenerationState,
) -> Result<GenerationState, StepError> {
    let mut cache: HashMap<String, Option<String>> = HashMap::new();
    let mut fetched = 0usize;

    for item in &mut state.work_items {
        if item.full_docs.is_some() {
            continue;
        }
        let endpoint = &item.endpoint;
        let copy_through = endpoint.source == EndpointSource::Openapi
            && endpoint.has_request_body();
        let server = state.request.effective_server(endpoint).to_string();

        let docs = if copy_through || !ctx.config.fetch_docs || server.is_empty() {
            None
        } else if let Some(cached) = cache.get(&server) {
            cached.clone()
        } else {
            let text = match ctx.fetcher.fetch(&server).await {
                Ok(page) => {
                    fetched += 1;
                    Some(truncate_chars(&page.body, ctx.config.docs_truncate_chars).to_string())
                }
                Err(e) => {
                    tracing::warn!("No documentation from {}: {}", server, e);
                    None
                }
            };
            cache.insert(server, text.clone());
            text
        };

        item.full_docs = Some(match docs {
            Some(text) => text,
            None => serde_json::to_string_pretty(endpoint)
                .map_err(|e| StepError::Failed(format!("failed to encode endpoint: {e}")))?,
        });
    }

    tracing::info!(
        work_items = state.work_items.len(),
        fetched,
        "Collected documentation"
    );
    Ok(state)
}

async fn schema_synthesis(
    ctx: Arc<GenerationContext>,
    mut state: GenerationState,
) -> Result<GenerationState, StepError> {
    let timeout = ctx.config.oracle_timeout();
    let pending: Vec<usize> = state
        .work_items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.status == WorkStatus::Pending)
        .map(|(i, _)| i)
        .collect();

    let requests: Vec<SynthesisRequest> = pending
        .iter()
        .map(|&i| {
            let item = &state.work_items[i];
            SynthesisRequest::new(&item.endpoint, item.full_docs.clone())
        })
        .collect();
    let synthesizer = ctx.synthesizer.as_ref();
    let results = fan_out(requests.iter(), timeout, |request| {
        synthesizer.synthesize(request)
    })
    .await;

    let mut generated = 0usize;
    for (i, result) in pending.into_iter().zip(results) {
        let item = &mut state.work_items[i];
        let outcome = result.map_err(|e| e.to_string()).and_then(|schema| {
            if schema.is_object() {
                Ok(schema)
            } else {
                Err("schema is not a JSON object".to_string())
            }
        });
        match outcome {
            Ok(mut schema) => {
                augment_schema(&mut schema, is_flexible(item.endpoint.request_body.as_ref()));
                item.schema = Some(schema);
                item.status = WorkStatus::SchemaGenerated;
                generated += 1;
            }
            Err(error) => {
                tracing::warn!(endpoint = %item.id, "Schema generation failed: {}", error);
                state.errors.push(GenerationError::for_endpoint(
                    &item.id,
                    ErrorStage::SchemaSynthesis,
                    error,
                ));
                item.status = WorkStatus::Error;
            }
        }
    }

    tracing::info!(generated, "Schema synthesis finished");
    Ok(state)
}

async fn compose_tool(
    ctx: Arc<GenerationContext>,
    mut state: GenerationState,
) -> Result<GenerationState, StepError> {
    let naming_timeout = ctx.config.oracle_timeout();
    let ready: Vec<usize> = state
        .work_items
        .iter()
        .enumerate()
        .filter(|(_, item)| item.status == WorkStatus::SchemaGenerated)
        .map(|(i, _)| i)
        .collect();

    let namer = ctx.namer.as_ref();
    let items = &state.work_items;
    let names = fan_out(
        ready.iter(),
        naming_timeout + COMPOSE_GRACE,
        |&i| async move {
            let ep = &items[i].endpoint;
            let description = description_or_label(ep);
            Ok::<_, Infallible>(
                generate_display_name(namer, &ep.method, &ep.path, &description, naming_timeout)
                    .await,
            )
        },
    )
    .await;

    let mut tools = Vec::new();
    for (i, name) in ready.into_iter().zip(names) {
        let item = &mut state.work_items[i];
        let display_name = match name {
            Ok(name) => name,
            Err(TaskError::Timeout(d)) => {
                let error = format!("display naming timed out after {d:?}");
                tracing::warn!(endpoint = %item.id, "{}", error);
                state.errors.push(GenerationError::for_endpoint(
                    &item.id,
                    ErrorStage::ComposeTool,
                    error,
                ));
                item.status = WorkStatus::Error;
                continue;
            }
            Err(TaskError::Failed(never)) => match never {},
        };
        let Some(schema) = item.schema.clone() else {
            state.errors.push(GenerationError::for_endpoint(
                &item.id,
                ErrorStage::ComposeTool,
                "no parameter schema",
            ));
            item.status = WorkStatus::Error;
            continue;
        };

        let tool = build_tool(
            &state.request,
            &item.endpoint,
            display_name,
            schema,
            ctx.config.naming,
        );
        tracing::debug!(endpoint = %item.id, tool = %tool.name, "Composed tool");
        item.status = WorkStatus::Composed;
        tools.push(tool);
    }

    tracing::info!(tools = tools.len(), "Composed tools");
    state.tools = tools;
    Ok(state)
}

fn description_or_label(endpoint: &NormalizedEndpoint) -> String {
    if endpoint.description.is_empty() {
        endpoint.label()
    } else {
        endpoint.description.clone()
    }
}

/// Assemble the tool record for one endpoint.
#[must_use]
pub fn build_tool(
    request: &GenerationRequest,
    endpoint: &NormalizedEndpoint,
    display_name: String,
    parameters: Value,
    naming: NamingScheme,
) -> Tool {
    let server = request.effective_server(endpoint).to_string();
    let vendor = request.vendor_for(&server);
    let resource = extract_resource(&endpoint.path);
    let verb = determine_verb(&endpoint.method, &endpoint.path);
    let version = extract_version(&endpoint.path);

    let name = match naming {
        NamingScheme::Verb => compose_tool_name(&vendor, &resource, verb),
        NamingScheme::DisplayName => {
            compose_tool_name_from_display(&vendor, &resource, &display_name, verb)
        }
    };

    Tool {
        name,
        display_name,
        description: description_or_label(endpoint),
        tags: vec![vendor, endpoint.method.to_lowercase(), version],
        visibility: "public".to_string(),
        active: true,
        protocol: "rest".to_string(),
        protocol_data: ProtocolData {
            method: endpoint.method.clone(),
            path: endpoint.path.clone(),
            server_url: server,
        },
        parameters,
        metadata: ToolMetadata {
            source: endpoint.source,
            confidence: endpoint.confidence,
        },
        validated: false,
    }
}

async fn validate(mut state: GenerationState) -> Result<GenerationState, StepError> {
    let mut valid = Vec::with_capacity(state.tools.len());
    for mut tool in std::mem::take(&mut state.tools) {
        match validate_parameters(&tool.name, &tool.parameters) {
            Ok(()) => {
                tool.validated = true;
                valid.push(tool);
            }
            Err(e) => {
                tracing::warn!("{}", e);
                state.errors.push(GenerationError::for_tool(
                    &tool.name,
                    ErrorStage::Validation,
                    e.to_string(),
                ));
            }
        }
    }

    tracing::info!(validated = valid.len(), "Validated tools");
    state.tools = valid;
    Ok(state)
}

async fn aggregate_tools(mut state: GenerationState) -> Result<GenerationState, StepError> {
    state.tools.sort_by(|a, b| a.name.cmp(&b.name));
    tracing::info!(tools = state.tools.len(), "Aggregated tools");
    Ok(state)
}

async fn interrupt_for_review(state: GenerationState) -> Result<GenerationState, StepError> {
    tracing::info!(
        tools = state.tools.len(),
        approved = state.approved.unwrap_or(false),
        "Review received"
    );
    Ok(state)
}

async fn finalize(mut state: GenerationState) -> Result<GenerationState, StepError> {
    state.status = GenerationStatus::Completed;
    state.final_count = Some(state.tools.len());
    if state.errors.is_empty() {
        tracing::info!(tools = state.tools.len(), "Generation finalized");
    } else {
        tracing::warn!(
            tools = state.tools.len(),
            errors = state.errors.len(),
            "Generation finalized with errors"
        );
    }
    Ok(state)
}

/// Generation graph bound to a checkpoint store.
pub struct GenerationPipeline {
    workflow: Workflow<GenerationStep, GenerationState>,
}

impl GenerationPipeline {
    /// # Errors
    ///
    /// Returns an error if the graph table is inconsistent.
    pub fn new(
        ctx: GenerationContext,
        store: Arc<dyn CheckpointStore>,
    ) -> Result<Self, WorkflowError> {
        let graph = build_graph(Arc::new(ctx))?;
        Ok(Self {
            workflow: Workflow::new(graph, store),
        })
    }

    #[must_use]
    pub fn workflow(&self) -> &Workflow<GenerationStep, GenerationState> {
        &self.workflow
    }

    /// Run generation until the review interrupt.
    ///
    /// # Errors
    ///
    /// Step failures and checkpoint failures.
    pub async fn run(
        &self,
        thread_id: &str,
        request: GenerationRequest,
    ) -> Result<RunOutcome<GenerationStep, GenerationState>, WorkflowError> {
        self.workflow
            .start(thread_id, GenerationState::new(request))
            .await
    }

    /// Resume a thread parked for review.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread is unknown or a checkpoint cannot be written.
    pub async fn review(
        &self,
        thread_id: &str,
        review: Review,
    ) -> Result<RunOutcome<GenerationStep, GenerationState>, WorkflowError> {
        self.workflow.resume(thread_id, Some(review)).await
    }
}
