//! Renders the analysis into a channel-neutral notification.

use std::collections::BTreeMap;
use std::path::Path;

use super::Notification;
use crate::insight::IncidentInsight;
use crate::remediation::{Priority, RemediationAction};

/// Causes listed in a notification body.
pub const TOP_CAUSES: usize = 3;

pub fn build_notification(
    insight: &IncidentInsight,
    actions: &[RemediationAction],
    postmortem_path: Option<&Path>,
) -> Notification {
    let impact = &insight.impact_analysis;
    let primary = insight
        .primary_cause()
        .map(|c| c.category.display_name())
        .unwrap_or("Unknown root cause");

    let subject = format!(
        "[{}] {}: {}",
        impact.business_impact.as_str().to_uppercase(),
        insight.incident_id,
        primary
    );

    let mut body = format!(
        "{}\n\nBusiness impact: {} (~{} users affected)\n",
        insight.summary, impact.business_impact, impact.estimated_users_affected
    );

    if !insight.root_causes.is_empty() {
        body.push_str("\nLikely causes:\n");
        for (rank, cause) in insight.root_causes.iter().take(TOP_CAUSES).enumerate() {
            body.push_str(&format!(
                "{}. {} ({:.0}%): {}\n",
                rank + 1,
                cause.category.display_name(),
                cause.confidence * 100.0,
                cause.description
            ));
        }
    }

    let immediate: Vec<&RemediationAction> = actions
        .iter()
        .filter(|a| a.priority == Priority::Immediate)
        .collect();
    if !immediate.is_empty() {
        body.push_str("\nImmediate actions:\n");
        for action in immediate {
            body.push_str(&format!(
                "- {} (~{} min)\n",
                action.title, action.expected_duration_minutes
            ));
        }
    }

    if let Some(path) = postmortem_path {
        body.push_str(&format!("\nPostmortem: {}\n", path.display()));
    }

    let mut metadata = BTreeMap::from([
        ("incident_id".to_string(), insight.incident_id.clone()),
        ("business_impact".to_string(), impact.business_impact.to_string()),
        ("confidence".to_string(), format!("{:.2}", insight.confidence_score)),
    ]);
    if let Some(cause) = insight.primary_cause() {
        metadata.insert("primary_cause".to_string(), cause.category.as_str().to_string());
    }

    Notification {
        subject,
        body,
        metadata,
    }
}
