//! Tool generation for toolforge.
//!
//! Takes the endpoints chosen after discovery, asks the schema-synthesis and display-name
//! oracles about each one, and produces a sorted, validated list of [`Tool`]s that parks for
//! review before it is finalized.

pub mod config;
pub mod error;
pub mod model;
pub mod oracle;
pub mod pipeline;
pub mod synthesize;

pub use config::GenerationConfig;
pub use error::OracleError;
pub use model::{
    ErrorStage, GenerationError, GenerationStatus, ProtocolData, Tool, ToolMetadata, WorkItem,
    WorkStatus,
};
pub use oracle::{
    DisplayNamer, HeuristicNames, SchemaSynthesizer, SynthesisRequest, generate_display_name,
};
pub use pipeline::{
    GenerationContext, GenerationPipeline, GenerationRequest, GenerationState, GenerationStep,
    Review,
};
pub use synthesize::DeclaredParameters;
