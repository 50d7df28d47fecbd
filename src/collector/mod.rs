//! Telemetry context collection.
//!
//! The collector fans out to one source adapter per record kind, waits for
//! all of them, and merges whatever came back into an [`IncidentContext`].
//! A failing, hanging or panicking adapter only empties its own list.

pub mod file;
pub mod http;

use crate::config::{CollectorConfig, SourceConfig, MAX_WINDOW_MINUTES};
use crate::telemetry::{
    AlertPayload, DeploymentEvent, IncidentContext, LogSignature, MetricAnomaly, SystemEvent,
    TelemetryRecord, TraceOutlier,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use file::FileSource;
pub use http::HttpSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source {source_name} answered with status {status}")]
    Status { source_name: String, status: u16 },

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode records: {0}")]
    Decode(#[from] serde_json::Error),
}

/// A telemetry backend returning typed records for a time window.
#[async_trait::async_trait]
pub trait SourceAdapter<T>: Send + Sync {
    /// Fetch every record in `[start, end]`.
    async fn fetch(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<T>, SourceError>;

    /// Name used in logs.
    fn name(&self) -> &str;
}

type Source<T> = Option<Arc<dyn SourceAdapter<T>>>;

/// Gathers an [`IncidentContext`] from the five telemetry sources.
pub struct Collector {
    source_timeout: Duration,
    metrics: Source<MetricAnomaly>,
    traces: Source<TraceOutlier>,
    logs: Source<LogSignature>,
    deployments: Source<DeploymentEvent>,
    events: Source<SystemEvent>,
}

impl Collector {
    /// A collector with no sources; every kind collects as empty.
    pub fn new(source_timeout: Duration) -> Self {
        Self {
            source_timeout,
            metrics: None,
            traces: None,
            logs: None,
            deployments: None,
            events: None,
        }
    }

    /// Build adapters from configuration. Unconfigured kinds stay empty.
    pub fn from_config(config: &CollectorConfig) -> Result<Self, SourceError> {
        let timeout = Duration::from_secs(config.source_timeout_secs);
        Ok(Self {
            source_timeout: timeout,
            metrics: build_source("metrics", config.metrics.as_ref(), timeout)?,
            traces: build_source("traces", config.traces.as_ref(), timeout)?,
            logs: build_source("logs", config.logs.as_ref(), timeout)?,
            deployments: build_source("deployments", config.deployments.as_ref(), timeout)?,
            events: build_source("events", config.events.as_ref(), timeout)?,
        })
    }

    pub fn with_metrics(mut self, source: impl SourceAdapter<MetricAnomaly> + 'static) -> Self {
        self.metrics = Some(Arc::new(source));
        self
    }

    pub fn with_traces(mut self, source: impl SourceAdapter<TraceOutlier> + 'static) -> Self {
        self.traces = Some(Arc::new(source));
        self
    }

    pub fn with_logs(mut self, source: impl SourceAdapter<LogSignature> + 'static) -> Self {
        self.logs = Some(Arc::new(source));
        self
    }

    pub fn with_deployments(mut self, source: impl SourceAdapter<DeploymentEvent> + 'static) -> Self {
        self.deployments = Some(Arc::new(source));
        self
    }

    pub fn with_events(mut self, source: impl SourceAdapter<SystemEvent> + 'static) -> Self {
        self.events = Some(Arc::new(source));
        self
    }

    /// Collect the context for `[alert - window, alert + window]`.
    ///
    /// Never fails: with every source down the context is simply empty.
    pub async fn collect(
        &self,
        incident_id: &str,
        alert: &AlertPayload,
        window_minutes: i64,
    ) -> IncidentContext {
        let alert_time = alert.alert_time();
        let window_minutes = clamp_window(window_minutes);
        let window = chrono::Duration::minutes(window_minutes);
        let (start, end) = (alert_time - window, alert_time + window);

        info!(
            %incident_id,
            alert_time = %alert_time,
            window_minutes,
            "Collecting incident context"
        );

        let timeout = self.source_timeout;
        let (metrics, traces, logs, deployments, events) = tokio::join!(
            fetch_guarded("metrics", self.metrics.clone(), start, end, timeout),
            fetch_guarded("traces", self.traces.clone(), start, end, timeout),
            fetch_guarded("logs", self.logs.clone(), start, end, timeout),
            fetch_guarded("deployments", self.deployments.clone(), start, end, timeout),
            fetch_guarded("events", self.events.clone(), start, end, timeout),
        );

        let context = IncidentContext {
            incident_id: incident_id.to_string(),
            alert_timestamp: alert_time,
            time_window_minutes: window_minutes,
            metrics_anomalies: metrics,
            trace_outliers: traces,
            log_signatures: logs.into_iter().map(LogSignature::bounded).collect(),
            deployment_events: deployments,
            system_events: events,
            alert_payload: alert.clone(),
        };

        info!(%incident_id, records = context.record_count(), "Context collected");
        context
    }
}

fn build_source<T>(
    kind: &str,
    config: Option<&SourceConfig>,
    timeout: Duration,
) -> Result<Source<T>, SourceError>
where
    T: TelemetryRecord + DeserializeOwned + Send + 'static,
{
    let source: Arc<dyn SourceAdapter<T>> = match config {
        None => return Ok(None),
        Some(SourceConfig::Http { url }) => Arc::new(HttpSource::new(kind, url, timeout)?),
        Some(SourceConfig::File { path }) => Arc::new(FileSource::new(kind, path)),
    };
    Ok(Some(source))
}

/// Keep the window positive and within `MAX_WINDOW_MINUTES`.
fn clamp_window(window_minutes: i64) -> i64 {
    let clamped = window_minutes.clamp(1, MAX_WINDOW_MINUTES);
    if clamped != window_minutes {
        warn!(requested = window_minutes, using = clamped, "Analysis window out of range, clamped");
    }
    clamped
}

/// Run one adapter as its own task. Errors, timeouts and panics all come
/// back as an empty list.
async fn fetch_guarded<T: Send + 'static>(
    kind: &'static str,
    source: Source<T>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timeout: Duration,
) -> Vec<T> {
    let Some(source) = source else {
        debug!(kind, "No source configured");
        return Vec::new();
    };

    let task = tokio::spawn(async move {
        let name = source.name().to_string();
        (name, tokio::time::timeout(timeout, source.fetch(start, end)).await)
    });

    match task.await {
        Ok((name, Ok(Ok(records)))) => {
            debug!(kind, source = %name, count = records.len(), "Source fetched");
            records
        }
        Ok((name, Ok(Err(e)))) => {
            warn!(kind, source = %name, error = %e, "Source fetch failed, continuing without it");
            Vec::new()
        }
        Ok((name, Err(_))) => {
            warn!(kind, source = %name, timeout_secs = timeout.as_secs(), "Source fetch timed out");
            Vec::new()
        }
        Err(e) => {
            warn!(kind, error = %e, "Source task aborted");
            Vec::new()
        }
    }
}
