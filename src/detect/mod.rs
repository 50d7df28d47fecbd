//! Root-cause inference: scored hypotheses over an incident context.

pub mod detectors;
pub mod engine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::telemetry::IncidentContext;

pub use engine::InferenceEngine;

/// Upper bound on any confidence score.
pub const MAX_CONFIDENCE: f64 = 0.95;

/// A detector only reports a candidate scoring strictly above this.
pub const EMISSION_FLOOR: f64 = 0.6;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("detector {detector} failed: {reason}")]
    Internal { detector: &'static str, reason: String },
}

/// Closed set of root-cause categories, in detector invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseCategory {
    DeploymentRegression,
    DatabaseIssues,
    InfrastructureDegradation,
    DependencyFailure,
    ResourceExhaustion,
    ConfigurationError,
}

impl CauseCategory {
    pub const ALL: [CauseCategory; 6] = [
        CauseCategory::DeploymentRegression,
        CauseCategory::DatabaseIssues,
        CauseCategory::InfrastructureDegradation,
        CauseCategory::DependencyFailure,
        CauseCategory::ResourceExhaustion,
        CauseCategory::ConfigurationError,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CauseCategory::DeploymentRegression => "deployment_regression",
            CauseCategory::DatabaseIssues => "database_issues",
            CauseCategory::InfrastructureDegradation => "infrastructure_degradation",
            CauseCategory::DependencyFailure => "dependency_failure",
            CauseCategory::ResourceExhaustion => "resource_exhaustion",
            CauseCategory::ConfigurationError => "configuration_error",
        }
    }

    /// Title-cased name used in reports and notifications.
    pub fn display_name(self) -> &'static str {
        match self {
            CauseCategory::DeploymentRegression => "Deployment Regression",
            CauseCategory::DatabaseIssues => "Database Issues",
            CauseCategory::InfrastructureDegradation => "Infrastructure Degradation",
            CauseCategory::DependencyFailure => "Dependency Failure",
            CauseCategory::ResourceExhaustion => "Resource Exhaustion",
            CauseCategory::ConfigurationError => "Configuration Error",
        }
    }
}

impl std::fmt::Display for CauseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A scored explanation for an incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCause {
    #[serde(rename = "type")]
    pub category: CauseCategory,
    pub confidence: f64,
    pub description: String,
    pub evidence: Vec<String>,
    pub affected_services: Vec<String>,
    pub time_range: TimeRange,
    pub remediation_hints: Vec<String>,
    #[serde(default)]
    pub related_metrics: Vec<String>,
    #[serde(default)]
    pub related_logs: Vec<String>,
    #[serde(default)]
    pub related_traces: Vec<String>,
}

/// One heuristic per cause category.
///
/// `Ok(None)` means no (or not enough) evidence. Errors are swallowed by the
/// engine and count as no evidence too.
pub trait Detector: Send + Sync {
    fn category(&self) -> CauseCategory;

    fn detect(&self, ctx: &IncidentContext) -> Result<Option<RootCause>, DetectError>;
}

/// Accumulates evidence and confidence for one candidate.
pub(crate) struct Candidate {
    category: CauseCategory,
    confidence: f64,
    evidence: Vec<String>,
    services: BTreeSet<String>,
    related_metrics: BTreeSet<String>,
    related_logs: BTreeSet<String>,
    related_traces: BTreeSet<String>,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
}

impl Candidate {
    pub(crate) fn new(category: CauseCategory, base: f64) -> Self {
        Self {
            category,
            confidence: base,
            evidence: Vec::new(),
            services: BTreeSet::new(),
            related_metrics: BTreeSet::new(),
            related_logs: BTreeSet::new(),
            related_traces: BTreeSet::new(),
            earliest: None,
            latest: None,
        }
    }

    pub(crate) fn add(&mut self, increment: f64, evidence: String) {
        self.confidence += increment;
        self.evidence.push(evidence);
    }

    pub(crate) fn note(&mut self, evidence: String) {
        self.evidence.push(evidence);
    }

    pub(crate) fn service(&mut self, service: &str) {
        if !service.is_empty() {
            self.services.insert(service.to_string());
        }
    }

    pub(crate) fn metric(&mut self, name: &str) {
        self.related_metrics.insert(name.to_string());
    }

    pub(crate) fn log(&mut self, pattern: &str) {
        self.related_logs.insert(pattern.to_string());
    }

    pub(crate) fn trace(&mut self, trace_id: &str) {
        self.related_traces.insert(trace_id.to_string());
    }

    pub(crate) fn seen_at(&mut self, ts: DateTime<Utc>) {
        self.earliest = Some(self.earliest.map_or(ts, |e| e.min(ts)));
        self.latest = Some(self.latest.map_or(ts, |l| l.max(ts)));
    }

    /// Clip, apply the emission floor and build the cause.
    pub(crate) fn finish(
        self,
        ctx: &IncidentContext,
        description: String,
        hints: Vec<String>,
    ) -> Option<RootCause> {
        // Rounded so that 0.4 + 0.2 lands on the floor instead of just above it.
        let confidence = ((self.confidence * 100.0).round() / 100.0).min(MAX_CONFIDENCE);
        if confidence <= EMISSION_FLOOR {
            return None;
        }

        let start = self.earliest.unwrap_or_else(|| ctx.window_start());
        let end = self.latest.unwrap_or(ctx.alert_timestamp).max(ctx.alert_timestamp);

        Some(RootCause {
            category: self.category,
            confidence,
            description,
            evidence: self.evidence,
            affected_services: self.services.into_iter().collect(),
            time_range: TimeRange { start, end },
            remediation_hints: hints,
            related_metrics: self.related_metrics.into_iter().collect(),
            related_logs: self.related_logs.into_iter().collect(),
            related_traces: self.related_traces.into_iter().collect(),
        })
    }
}

/// Case-insensitive substring match against any keyword.
pub(crate) fn matches_any(haystack: &str, keywords: &[&str]) -> bool {
    let lower = haystack.to_lowercase();
    keywords.iter().any(|k| lower.contains(k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ctx() -> IncidentContext {
        IncidentContext::empty("INC-1", Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(), 30)
    }

    #[test]
    fn test_candidate_clips_at_max() {
        let mut c = Candidate::new(CauseCategory::DatabaseIssues, 0.4);
        c.add(0.3, "logs".to_string());
        c.add(0.2, "metrics".to_string());
        c.add(0.2, "traces".to_string());
        let cause = c.finish(&ctx(), "db".to_string(), vec![]).unwrap();
        assert_eq!(cause.confidence, MAX_CONFIDENCE);
        assert_eq!(cause.evidence.len(), 3);
    }

    #[test]
    fn test_candidate_at_floor_is_not_emitted() {
        let mut c = Candidate::new(CauseCategory::DatabaseIssues, 0.4);
        c.add(0.2, "metrics".to_string());
        assert!(c.finish(&ctx(), "db".to_string(), vec![]).is_none());
    }

    #[test]
    fn test_time_range_defaults_to_window() {
        let mut c = Candidate::new(CauseCategory::ConfigurationError, 0.45);
        c.add(0.3, "config".to_string());
        let cause = c.finish(&ctx(), "cfg".to_string(), vec![]).unwrap();
        assert_eq!(cause.time_range.start, ctx().window_start());
        assert_eq!(cause.time_range.end, ctx().alert_timestamp);
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&CauseCategory::DeploymentRegression).unwrap();
        assert_eq!(json, "\"deployment_regression\"");
        assert_eq!(CauseCategory::ResourceExhaustion.display_name(), "Resource Exhaustion");
        assert_eq!(CauseCategory::ALL.len(), 6);
    }

    #[test]
    fn test_matches_any_case_insensitive() {
        assert!(matches_any("Deadlock detected in TX", &["deadlock"]));
        assert!(!matches_any("all good", &["deadlock", "sql"]));
    }
}
