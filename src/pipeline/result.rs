//! Serialized outcome of one pipeline run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::{CauseCategory, RootCause};
use crate::insight::{BusinessImpact, IncidentInsight, TimelineEntry};
use crate::notify::ChannelOutcome;
use crate::postmortem::PostmortemReport;
use crate::remediation::{Priority, RemediationAction, RiskLevel};
use crate::telemetry::IncidentContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseSummary {
    #[serde(rename = "type")]
    pub category: CauseCategory,
    pub confidence: f64,
    pub description: String,
    pub evidence: Vec<String>,
    pub affected_services: Vec<String>,
}

impl From<&RootCause> for RootCauseSummary {
    fn from(c: &RootCause) -> Self {
        Self {
            category: c.category,
            confidence: c.confidence,
            description: c.description.clone(),
            evidence: c.evidence.clone(),
            affected_services: c.affected_services.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSummary {
    pub summary: String,
    pub confidence_score: f64,
    pub business_impact: BusinessImpact,
    pub users_affected: u64,
    pub timeline: Vec<TimelineEntry>,
}

impl From<&IncidentInsight> for InsightSummary {
    fn from(i: &IncidentInsight) -> Self {
        Self {
            summary: i.summary.clone(),
            confidence_score: i.confidence_score,
            business_impact: i.impact_analysis.business_impact,
            users_affected: i.impact_analysis.estimated_users_affected,
            timeline: i.timeline.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSummary {
    pub title: String,
    pub priority: Priority,
    pub duration_minutes: u32,
    pub risk_level: RiskLevel,
    pub automation_possible: bool,
}

impl From<&RemediationAction> for ActionSummary {
    fn from(a: &RemediationAction) -> Self {
        Self {
            title: a.title.clone(),
            priority: a.priority,
            duration_minutes: a.expected_duration_minutes,
            risk_level: a.risk_level,
            automation_possible: a.automation_possible,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostmortemMeta {
    pub file_path: PathBuf,
    pub sections_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub incident_id: String,
    pub analysis_timestamp: DateTime<Utc>,
    pub context: IncidentContext,
    pub root_causes: Vec<RootCauseSummary>,
    pub insight: InsightSummary,
    pub remediation_actions: Vec<ActionSummary>,
    pub reports_generated: usize,
    pub notifications: BTreeMap<String, ChannelOutcome>,
    pub postmortem: PostmortemMeta,
}

impl PipelineResult {
    pub fn new(
        context: IncidentContext,
        insight: &IncidentInsight,
        actions: &[RemediationAction],
        report: &PostmortemReport,
        notifications: BTreeMap<String, ChannelOutcome>,
    ) -> Self {
        Self {
            incident_id: insight.incident_id.clone(),
            analysis_timestamp: insight.timestamp,
            context,
            root_causes: insight.root_causes.iter().map(RootCauseSummary::from).collect(),
            insight: InsightSummary::from(insight),
            remediation_actions: actions.iter().map(ActionSummary::from).collect(),
            reports_generated: 1,
            notifications,
            postmortem: PostmortemMeta {
                file_path: report.file_path.clone(),
                sections_count: report.sections.len(),
            },
        }
    }

    pub fn primary_cause(&self) -> Option<&RootCauseSummary> {
        self.root_causes.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::synthesize;
    use crate::insight::tests::cause;
    use crate::postmortem::Assembler;
    use crate::remediation::plan;
    use chrono::TimeZone;

    #[test]
    fn test_result_roundtrip_preserves_fields() {
        let ctx = IncidentContext::empty("INC-RT", Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(), 30);
        let insight = synthesize(
            &ctx,
            &[
                cause(CauseCategory::DatabaseIssues, 0.83, &["orders"]),
                cause(CauseCategory::ConfigurationError, 0.61, &["orders", "billing"]),
            ],
        );
        let actions = plan(&insight);
        let report = Assembler::new("reports").build(&insight, &actions, None, None);
        let notifications = BTreeMap::from([(
            "slack".to_string(),
            ChannelOutcome {
                success: false,
                error: Some("timeout".to_string()),
                duration_ms: 10_000,
            },
        )]);
        let result = PipelineResult::new(ctx, &insight, &actions, &report, notifications);

        let json = serde_json::to_string(&result).unwrap();
        let back: PipelineResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
        assert_eq!(back.root_causes.len(), 2);
        assert_eq!(back.remediation_actions.len(), actions.len());
        assert_eq!(back.postmortem.sections_count, 9);
        assert_eq!(back.primary_cause().unwrap().category, CauseCategory::DatabaseIssues);

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["root_causes"][0]["type"], "database_issues");
        assert_eq!(value["insight"]["business_impact"], "high");
        assert_eq!(value["remediation_actions"][0]["priority"], "immediate");
    }
}
