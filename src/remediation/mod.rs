//! Remediation planning: turns ranked causes into prioritized runbooks.

pub mod templates;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::insight::IncidentInsight;

/// Action priority. Declaration order is the sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Immediate,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Immediate => "immediate",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Rollback,
    Investigation,
    HealthCheck,
    QueryOptimization,
    Restart,
    Scaling,
    CircuitBreaker,
    RetryLogic,
    ResourceIncrease,
    LeakInvestigation,
    ConfigFix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// A self-contained runbook entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationAction {
    pub action_type: ActionType,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub steps: Vec<String>,
    pub expected_duration_minutes: u32,
    pub risk_level: RiskLevel,
    pub prerequisites: Vec<String>,
    pub rollback_steps: Vec<String>,
    pub monitoring_metrics: Vec<String>,
    pub documentation_link: Option<String>,
    pub automation_possible: bool,
}

/// Actions for every ranked cause, sorted by priority then duration.
pub fn plan(insight: &IncidentInsight) -> Vec<RemediationAction> {
    let mut actions: Vec<RemediationAction> = if insight.root_causes.is_empty() {
        vec![templates::unknown_cause(insight)]
    } else {
        insight
            .root_causes
            .iter()
            .flat_map(templates::for_cause)
            .collect()
    };

    actions.sort_by_key(|a| (a.priority, a.expected_duration_minutes));

    info!(
        incident_id = %insight.incident_id,
        actions = actions.len(),
        immediate = actions.iter().filter(|a| a.priority == Priority::Immediate).count(),
        "Remediation plan ready"
    );
    actions
}
