//! incidentmedic -- incident root-cause inference, remediation planning and
//! postmortem generation.
//!
//! An alert goes in; the collector gathers a time-windowed telemetry
//! context, the inference engine ranks candidate root causes, the insight
//! synthesizer and remediation planner turn them into a narrative and a
//! runbook, and the assembler writes a Markdown postmortem before the
//! notification channels are told.

pub mod collector;
pub mod config;
pub mod detect;
pub mod insight;
pub mod notify;
pub mod pipeline;
pub mod postmortem;
pub mod remediation;
pub mod storage;
pub mod telemetry;

use anyhow::Result;

use crate::config::AppConfig;
use crate::pipeline::{AnalysisRequest, Pipeline, PipelineResult};

/// Build a pipeline from `config` and analyze one alert with it.
pub async fn analyze(config: &AppConfig, request: AnalysisRequest) -> Result<PipelineResult> {
    tracing::info!(
        reports_dir = %config.reports.reports_dir.display(),
        channels = config.notify.channels.len(),
        history = config.storage.history_db.is_some(),
        "Starting analysis"
    );
    let pipeline = Pipeline::from_config(config)?;
    Ok(pipeline.run(request).await?)
}
