//! Insight synthesis: timeline, impact, narrative and an aggregate
//! confidence built from the context and the ranked causes.

pub mod impact;
pub mod narrative;
pub mod timeline;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::detect::RootCause;
use crate::telemetry::{IncidentContext, Severity};

/// Four-tier business impact, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessImpact {
    Low,
    Medium,
    High,
    Critical,
}

impl BusinessImpact {
    /// Tier for a user-impact fraction in `[0, 1]`.
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction > 0.8 {
            BusinessImpact::Critical
        } else if fraction > 0.6 {
            BusinessImpact::High
        } else if fraction > 0.3 {
            BusinessImpact::Medium
        } else {
            BusinessImpact::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BusinessImpact::Low => "low",
            BusinessImpact::Medium => "medium",
            BusinessImpact::High => "high",
            BusinessImpact::Critical => "critical",
        }
    }
}

impl std::fmt::Display for BusinessImpact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub affected_services: Vec<String>,
    pub affected_endpoints: Vec<String>,
    pub user_impact_percentage: f64,
    pub estimated_users_affected: u64,
    pub sla_breach_duration_minutes: i64,
    pub business_impact: BusinessImpact,
}

/// The analysis handed to remediation planning and the postmortem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentInsight {
    pub incident_id: String,
    pub summary: String,
    pub timeline: Vec<TimelineEntry>,
    pub root_causes: Vec<RootCause>,
    pub impact_analysis: ImpactAnalysis,
    pub next_steps: Vec<String>,
    pub confidence_score: f64,
    pub timestamp: DateTime<Utc>,
    pub alert_timestamp: DateTime<Utc>,
}

impl IncidentInsight {
    pub fn primary_cause(&self) -> Option<&RootCause> {
        self.root_causes.first()
    }
}

/// Build the insight, stamped with the current time.
pub fn synthesize(ctx: &IncidentContext, causes: &[RootCause]) -> IncidentInsight {
    synthesize_at(ctx, causes, Utc::now())
}

/// Build the insight with an explicit generation time.
pub fn synthesize_at(
    ctx: &IncidentContext,
    causes: &[RootCause],
    generated_at: DateTime<Utc>,
) -> IncidentInsight {
    let timeline = timeline::build(ctx);
    let impact = impact::analyze(ctx, causes);
    let summary = narrative::summary(ctx, causes, &impact);
    let next_steps = narrative::next_steps(causes.first().map(|c| c.category));
    let confidence_score = aggregate_confidence(causes);

    info!(
        incident_id = %ctx.incident_id,
        timeline_events = timeline.len(),
        business_impact = %impact.business_impact,
        confidence = confidence_score,
        "Insight synthesized"
    );

    IncidentInsight {
        incident_id: ctx.incident_id.clone(),
        summary,
        timeline,
        root_causes: causes.to_vec(),
        impact_analysis: impact,
        next_steps,
        confidence_score,
        timestamp: generated_at,
        alert_timestamp: ctx.alert_timestamp,
    }
}

/// Rank-weighted mean: the cause at rank `i` (0-based) weighs `1/(i+1)`.
pub fn aggregate_confidence(causes: &[RootCause]) -> f64 {
    if causes.is_empty() {
        return 0.0;
    }
    let (weighted, total) = causes
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, weights), (rank, cause)| {
            let w = 1.0 / (rank as f64 + 1.0);
            (sum + cause.confidence * w, weights + w)
        });
    weighted / total
}
