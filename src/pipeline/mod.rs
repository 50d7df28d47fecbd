//! End-to-end orchestration of one incident analysis.
//!
//! collect -> infer -> synthesize -> plan -> write postmortem -> notify.
//! Only the postmortem write (and an exceeded deadline, when one is set)
//! fails the run. Notification and history failures are logged and recorded.

pub mod result;

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::collector::Collector;
use crate::config::AppConfig;
use crate::detect::InferenceEngine;
use crate::insight::synthesize;
use crate::notify::{build_notification, Dispatcher};
use crate::postmortem::{Assembler, ReportError};
use crate::remediation::plan;
use crate::storage::IncidentStore;
use crate::telemetry::AlertPayload;

pub use result::{ActionSummary, InsightSummary, PipelineResult, PostmortemMeta, RootCauseSummary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Report(#[from] ReportError),

    #[error("postmortem writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("analysis did not finish within {0:?}")]
    DeadlineExceeded(Duration),
}

/// Input for one run.
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    pub alert: AlertPayload,
    /// Generated when absent.
    pub incident_id: Option<String>,
    pub resolution_notes: Option<String>,
    pub engineer_notes: Option<String>,
}

impl AnalysisRequest {
    pub fn new(alert: AlertPayload) -> Self {
        Self {
            alert,
            ..Self::default()
        }
    }
}

/// `INC-<yyyymmdd>-<8 hex>`.
pub fn new_incident_id(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("INC-{}-{}", at.format("%Y%m%d"), &suffix[..8])
}

pub struct Pipeline {
    collector: Collector,
    engine: InferenceEngine,
    assembler: Assembler,
    dispatcher: Dispatcher,
    store: Option<IncidentStore>,
    window_minutes: i64,
    deadline: Option<Duration>,
}

impl Pipeline {
    pub fn new(collector: Collector, engine: InferenceEngine, assembler: Assembler) -> Self {
        Self {
            collector,
            engine,
            assembler,
            dispatcher: Dispatcher::empty(),
            store: None,
            window_minutes: 30,
            deadline: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let collector = Collector::from_config(&config.collector)
            .context("failed to build telemetry sources")?;
        let dispatcher = Dispatcher::from_config(&config.notify)
            .context("failed to build notification channels")?;
        let store = config
            .storage
            .history_db
            .as_deref()
            .map(IncidentStore::open)
            .transpose()?;

        let mut pipeline = Self::new(
            collector,
            InferenceEngine::new(config.analysis.confidence_threshold),
            Assembler::new(&config.reports.reports_dir),
        )
        .with_dispatcher(dispatcher)
        .with_window_minutes(config.analysis.analysis_window_minutes);
        pipeline.store = store;
        pipeline.deadline = config.analysis.deadline_secs.map(Duration::from_secs);
        Ok(pipeline)
    }

    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_store(mut self, store: IncidentStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_window_minutes(mut self, minutes: i64) -> Self {
        self.window_minutes = minutes;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Analyze one alert, bounded by the deadline if one is configured.
    pub async fn run(&self, request: AnalysisRequest) -> Result<PipelineResult, PipelineError> {
        match self.deadline {
            None => self.execute(request).await,
            Some(limit) => tokio::time::timeout(limit, self.execute(request))
                .await
                .map_err(|_| PipelineError::DeadlineExceeded(limit))?,
        }
    }

    async fn execute(&self, request: AnalysisRequest) -> Result<PipelineResult, PipelineError> {
        let AnalysisRequest {
            alert,
            incident_id,
            resolution_notes,
            engineer_notes,
        } = request;
        let incident_id = incident_id.unwrap_or_else(|| new_incident_id(alert.alert_time()));

        let context = self
            .collector
            .collect(&incident_id, &alert, self.window_minutes)
            .await;
        let causes = self.engine.analyze(&context);
        let insight = synthesize(&context, &causes);
        let actions = plan(&insight);

        let report = self.assembler.build(
            &insight,
            &actions,
            resolution_notes.as_deref(),
            engineer_notes.as_deref(),
        );
        let assembler = self.assembler.clone();
        let report = tokio::task::spawn_blocking(move || assembler.persist(&report).map(|()| report))
            .await??;

        let notification = build_notification(&insight, &actions, Some(&report.file_path));
        let notifications = self
            .dispatcher
            .dispatch(&notification, insight.impact_analysis.business_impact)
            .await;

        let result = PipelineResult::new(context, &insight, &actions, &report, notifications);

        if let Some(store) = &self.store {
            if let Err(e) = store.record(&result) {
                warn!(incident_id = %incident_id, error = %e, "Failed to record analysis history");
            }
        }

        info!(
            incident_id = %incident_id,
            causes = result.root_causes.len(),
            business_impact = %result.insight.business_impact,
            actions = result.remediation_actions.len(),
            postmortem = %report.file_path.display(),
            "Analysis complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{SourceAdapter, SourceError};
    use crate::insight::BusinessImpact;
    use crate::notify::tests::MockNotifier;
    use crate::telemetry::{AlertEntry, MetricAnomaly};
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    struct SlowMetrics;

    #[async_trait::async_trait]
    impl SourceAdapter<MetricAnomaly> for SlowMetrics {
        async fn fetch(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<MetricAnomaly>, SourceError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn alert() -> AlertPayload {
        AlertPayload {
            alerts: vec![AlertEntry {
                status: "firing".to_string(),
                labels: BTreeMap::from([("alertname".to_string(), "HighLatency".to_string())]),
                annotations: BTreeMap::new(),
                starts_at: Some("2024-03-01T12:30:00Z".to_string()),
            }],
        }
    }

    fn pipeline(reports: &std::path::Path) -> Pipeline {
        Pipeline::new(
            Collector::new(Duration::from_secs(30)),
            InferenceEngine::new(0.3),
            Assembler::new(reports),
        )
    }

    #[test]
    fn test_incident_id_format() {
        let id = new_incident_id(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        assert!(id.starts_with("INC-20240301-"));
        let suffix = id.trim_start_matches("INC-20240301-");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_no_telemetry_still_produces_postmortem() {
        let dir = tempfile::tempdir().unwrap();
        let (chat, count) = MockNotifier::new("chat", false);
        let dispatcher = Dispatcher::empty()
            .with_channel(BusinessImpact::Low, Box::new(chat))
            .unwrap();
        let p = pipeline(dir.path()).with_dispatcher(dispatcher);

        let mut request = AnalysisRequest::new(alert());
        request.incident_id = Some("INC-EMPTY".to_string());
        let result = p.run(request).await.unwrap();

        assert!(result.root_causes.is_empty());
        assert_eq!(result.remediation_actions.len(), 1);
        assert_eq!(result.insight.business_impact, BusinessImpact::Low);
        assert_eq!(result.postmortem.sections_count, 9);
        assert!(result.postmortem.file_path.ends_with("2024-03-01-incident-INC-EMPTY.md"));
        assert!(result.postmortem.file_path.exists());
        assert!(result.notifications["chat"].success);
        assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_postmortem_write_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("reports");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = pipeline(&blocker).run(AnalysisRequest::new(alert())).await.unwrap_err();
        assert!(matches!(err, PipelineError::Report(ReportError::CreateDir { .. })));
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let p = Pipeline::new(
            Collector::new(Duration::from_secs(30)).with_metrics(SlowMetrics),
            InferenceEngine::new(0.3),
            Assembler::new(dir.path()),
        )
        .with_deadline(Duration::from_millis(100));

        let err = p.run(AnalysisRequest::new(alert())).await.unwrap_err();
        assert!(matches!(err, PipelineError::DeadlineExceeded(_)));
    }

    #[tokio::test]
    async fn test_history_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let store = IncidentStore::open(&dir.path().join("history.db")).unwrap();
        let p = pipeline(&dir.path().join("reports")).with_store(store.clone());

        let mut request = AnalysisRequest::new(alert());
        request.incident_id = Some("INC-HIST".to_string());
        request.engineer_notes = Some("Paged at 12:31".to_string());
        let result = p.run(request).await.unwrap();

        assert_eq!(result.postmortem.sections_count, 10);
        let rows = store.list_recent(5).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].incident_id, "INC-HIST");
    }
}
