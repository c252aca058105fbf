//! Batch enrichment core for brandlex.
//!
//! This crate ties together record sources, prompt construction, the
//! completion client, and output sinks into the enrichment pipeline
//! (e.g., [`pipeline::Pipeline::run_dir`]).

pub mod client;
pub mod output;
pub mod pipeline;
pub mod prompt;
pub mod source;

pub use client::{ChatCompletionClient, EnrichmentClient};
pub use output::{
    MetricEntry, OutputUnit, UnitReport, write_brand_units, write_json, write_output,
};
pub use pipeline::{
    EnrichMode, OutputShape, Pipeline, PipelineConfig, PipelineProgress, RunSummary,
    SilentProgress, UnitRun,
};
pub use prompt::{PromptBuilder, SuffixTable};
pub use source::{Discovered, InputFormat, Unit, discover_units};
