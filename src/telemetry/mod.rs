//! Telemetry data model: the typed records gathered around an alert and the
//! per-incident context that bundles them.

pub mod alert;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use alert::{AlertEntry, AlertPayload};

/// Severity shared by anomalies, log signatures, system events and timeline entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// True for the levels that make a log signature timeline-worthy.
    pub fn is_error_or_worse(self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Success,
    Failure,
    RollingBack,
}

/// A metric that crossed its threshold inside the analysis window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAnomaly {
    pub metric_name: String,
    pub value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub description: String,
}

/// A span that was slow or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceOutlier {
    pub trace_id: String,
    pub span_id: String,
    pub operation_name: String,
    pub duration_ms: f64,
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub service_name: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl TraceOutlier {
    pub fn is_error(&self) -> bool {
        self.error_message.is_some() || self.status.eq_ignore_ascii_case("error")
    }
}

/// Maximum number of sample messages kept per log signature.
pub const MAX_LOG_SAMPLES: usize = 5;

/// A clustered error pattern seen in logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSignature {
    pub pattern: String,
    pub count: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub severity: Severity,
    pub service: String,
    pub log_level: String,
    #[serde(default)]
    pub sample_messages: Vec<String>,
}

impl LogSignature {
    /// Cap the sample list at [`MAX_LOG_SAMPLES`].
    pub fn bounded(mut self) -> Self {
        self.sample_messages.truncate(MAX_LOG_SAMPLES);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    pub deployment_id: String,
    pub version: String,
    pub commit_hash: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub status: DeploymentStatus,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub change_request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub affected_components: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Records that can be placed on the time axis of an analysis window.
pub trait TelemetryRecord {
    fn timestamp(&self) -> DateTime<Utc>;

    /// Whether the record belongs to `[start, end]`.
    fn within(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let ts = self.timestamp();
        ts >= start && ts <= end
    }
}

impl TelemetryRecord for MetricAnomaly {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl TelemetryRecord for TraceOutlier {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl TelemetryRecord for LogSignature {
    fn timestamp(&self) -> DateTime<Utc> {
        self.first_seen
    }

    // A signature counts when its active span overlaps the window.
    fn within(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.first_seen <= end && self.last_seen >= start
    }
}

impl TelemetryRecord for DeploymentEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl TelemetryRecord for SystemEvent {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Everything gathered for one incident. Built once by the collector and
/// only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentContext {
    pub incident_id: String,
    pub alert_timestamp: DateTime<Utc>,
    pub time_window_minutes: i64,
    pub metrics_anomalies: Vec<MetricAnomaly>,
    pub trace_outliers: Vec<TraceOutlier>,
    pub log_signatures: Vec<LogSignature>,
    pub deployment_events: Vec<DeploymentEvent>,
    pub system_events: Vec<SystemEvent>,
    pub alert_payload: AlertPayload,
}

impl IncidentContext {
    /// An empty context for the given alert time; every list is empty.
    pub fn empty(incident_id: &str, alert_timestamp: DateTime<Utc>, window_minutes: i64) -> Self {
        Self {
            incident_id: incident_id.to_string(),
            alert_timestamp,
            time_window_minutes: window_minutes,
            metrics_anomalies: Vec::new(),
            trace_outliers: Vec::new(),
            log_signatures: Vec::new(),
            deployment_events: Vec::new(),
            system_events: Vec::new(),
            alert_payload: AlertPayload::default(),
        }
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.alert_timestamp - chrono::Duration::minutes(self.time_window_minutes)
    }

    pub fn window_end(&self) -> DateTime<Utc> {
        self.alert_timestamp + chrono::Duration::minutes(self.time_window_minutes)
    }

    pub fn record_count(&self) -> usize {
        self.metrics_anomalies.len()
            + self.trace_outliers.len()
            + self.log_signatures.len()
            + self.deployment_events.len()
            + self.system_events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, min, 0).unwrap()
    }

    #[test]
    fn test_log_signature_overlap_window() {
        let sig = LogSignature {
            pattern: "connection reset".to_string(),
            count: 12,
            first_seen: at(0),
            last_seen: at(20),
            severity: Severity::Error,
            service: "api".to_string(),
            log_level: "ERROR".to_string(),
            sample_messages: vec![],
        };
        // Starts before the window but is still active inside it.
        assert!(sig.within(at(10), at(30)));
        assert!(!sig.within(at(21), at(30)));
    }

    #[test]
    fn test_bounded_samples() {
        let sig = LogSignature {
            pattern: "timeout".to_string(),
            count: 100,
            first_seen: at(0),
            last_seen: at(1),
            severity: Severity::Error,
            service: "api".to_string(),
            log_level: "ERROR".to_string(),
            sample_messages: (0..20).map(|i| format!("msg {}", i)).collect(),
        }
        .bounded();
        assert_eq!(sig.sample_messages.len(), MAX_LOG_SAMPLES);
    }

    #[test]
    fn test_severity_serde_lowercase() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
        let parsed: Severity = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(parsed, Severity::Warning);
    }

    #[test]
    fn test_context_window() {
        let ctx = IncidentContext::empty("INC-1", at(30), 30);
        assert_eq!(ctx.window_start(), at(0));
        assert_eq!(ctx.window_end(), Utc.with_ymd_and_hms(2024, 3, 1, 13, 0, 0).unwrap());
        assert_eq!(ctx.record_count(), 0);
    }
}
