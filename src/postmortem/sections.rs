//! Section renderers, in canonical document order.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::insight::IncidentInsight;
use crate::remediation::{Priority, RemediationAction};

/// Everything a section may read.
pub struct SectionInput<'a> {
    pub insight: &'a IncidentInsight,
    pub actions: &'a [RemediationAction],
    pub resolution_notes: Option<&'a str>,
    pub engineer_notes: Option<&'a str>,
}

pub struct SectionTemplate {
    pub order: u8,
    pub title: &'static str,
    pub render: fn(&SectionInput) -> String,
    /// `None` for sections that are always present.
    pub include: Option<fn(&SectionInput) -> bool>,
}

impl SectionTemplate {
    pub fn applies(&self, input: &SectionInput) -> bool {
        self.include.map_or(true, |f| f(input))
    }
}

pub const CANONICAL: [SectionTemplate; 10] = [
    SectionTemplate { order: 1, title: "Summary", render: summary, include: None },
    SectionTemplate { order: 2, title: "Timeline", render: timeline, include: None },
    SectionTemplate { order: 3, title: "Root Causes", render: root_causes, include: None },
    SectionTemplate { order: 4, title: "Impact Analysis", render: impact, include: None },
    SectionTemplate { order: 5, title: "Detection", render: detection, include: None },
    SectionTemplate { order: 6, title: "Resolution", render: resolution, include: None },
    SectionTemplate { order: 7, title: "Lessons Learned", render: lessons, include: None },
    SectionTemplate { order: 8, title: "Action Items", render: action_items, include: None },
    SectionTemplate {
        order: 9,
        title: "Engineer Notes",
        render: engineer_notes,
        include: Some(has_engineer_notes),
    },
    SectionTemplate { order: 10, title: "Metrics & Monitoring", render: monitoring, include: None },
];

fn ts(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn pct(v: f64) -> String {
    format!("{:.0}%", v * 100.0)
}

fn bullets(items: &[String]) -> String {
    items.iter().map(|i| format!("- {}\n", i)).collect()
}

fn summary(input: &SectionInput) -> String {
    let i = input.insight;
    let primary = i
        .primary_cause()
        .map(|c| c.category.display_name())
        .unwrap_or("Unknown");
    format!(
        "{}\n\n\
         | Field | Value |\n|---|---|\n\
         | Incident ID | {} |\n\
         | Alert time | {} |\n\
         | Primary cause | {} |\n\
         | Analysis confidence | {} |\n\
         | Business impact | {} |\n\
         | Estimated users affected | {} |\n",
        i.summary,
        i.incident_id,
        ts(i.alert_timestamp),
        primary,
        pct(i.confidence_score),
        i.impact_analysis.business_impact,
        i.impact_analysis.estimated_users_affected,
    )
}

fn timeline(input: &SectionInput) -> String {
    let events = &input.insight.timeline;
    if events.is_empty() {
        return "_No timeline events were captured for this incident._\n".to_string();
    }
    let mut out = String::from("| Time | Event | Severity | Description |\n|---|---|---|---|\n");
    for e in events {
        out.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            ts(e.timestamp),
            e.event_type,
            e.severity,
            e.description.replace('|', "\\|")
        ));
    }
    out
}

fn root_causes(input: &SectionInput) -> String {
    let causes = &input.insight.root_causes;
    if causes.is_empty() {
        return "No root cause could be determined automatically. See the investigation action items.\n"
            .to_string();
    }
    let mut out = String::new();
    for (rank, c) in causes.iter().enumerate() {
        out.push_str(&format!(
            "### {}. {} (confidence {})\n\n{}\n\n",
            rank + 1,
            c.category.display_name(),
            pct(c.confidence),
            c.description
        ));
        out.push_str(&format!(
            "**Window:** {} to {}\n\n",
            ts(c.time_range.start),
            ts(c.time_range.end)
        ));
        if !c.affected_services.is_empty() {
            out.push_str(&format!("**Affected services:** {}\n\n", c.affected_services.join(", ")));
        }
        if !c.evidence.is_empty() {
            out.push_str("**Evidence:**\n\n");
            out.push_str(&bullets(&c.evidence));
            out.push('\n');
        }
        if !c.remediation_hints.is_empty() {
            out.push_str("**Suggested remediation:**\n\n");
            out.push_str(&bullets(&c.remediation_hints));
            out.push('\n');
        }
    }
    out
}

fn impact(input: &SectionInput) -> String {
    let a = &input.insight.impact_analysis;
    let list = |items: &[String]| {
        if items.is_empty() {
            "none identified".to_string()
        } else {
            items.join(", ")
        }
    };
    format!(
        "- **Business impact:** {}\n\
         - **User impact:** {} (~{} users)\n\
         - **SLA breach duration:** {} minutes\n\
         - **Affected services:** {}\n\
         - **Affected endpoints:** {}\n",
        a.business_impact,
        pct(a.user_impact_percentage),
        a.estimated_users_affected,
        a.sla_breach_duration_minutes,
        list(&a.affected_services),
        list(&a.affected_endpoints),
    )
}

/// Minutes from the earliest timeline event to the analysis, never negative.
pub fn detection_minutes(insight: &IncidentInsight) -> i64 {
    insight
        .timeline
        .iter()
        .map(|e| e.timestamp)
        .min()
        .map(|first| (insight.timestamp - first).num_minutes().max(0))
        .unwrap_or(0)
}

fn detection(input: &SectionInput) -> String {
    let i = input.insight;
    let first = i.timeline.first().map(|e| ts(e.timestamp));
    format!(
        "- **Alert fired:** {}\n\
         - **First recorded signal:** {}\n\
         - **Analysis completed:** {}\n\
         - **Time to detection:** {} minutes\n",
        ts(i.alert_timestamp),
        first.unwrap_or_else(|| "none recorded".to_string()),
        ts(i.timestamp),
        detection_minutes(i),
    )
}

fn resolution(input: &SectionInput) -> String {
    if let Some(notes) = input.resolution_notes.filter(|n| !n.trim().is_empty()) {
        return format!("{}\n", notes.trim());
    }
    let immediate: Vec<String> = input
        .actions
        .iter()
        .filter(|a| a.priority == Priority::Immediate)
        .map(|a| format!("{} (~{} min)", a.title, a.expected_duration_minutes))
        .collect();
    let mut out = String::from("_Resolution pending._ Immediate actions planned:\n\n");
    out.push_str(&bullets(&immediate));
    out
}

fn lessons(input: &SectionInput) -> String {
    let i = input.insight;
    let mut well = vec!["Automated alerting detected the incident".to_string()];
    if let Some(c) = i.primary_cause() {
        well.push(format!(
            "Automated analysis pointed at {} with {} confidence",
            c.category.display_name(),
            pct(c.confidence)
        ));
    }
    let automatable = input.actions.iter().filter(|a| a.automation_possible).count();
    if automatable > 0 {
        well.push(format!("{} remediation action(s) can be automated", automatable));
    }

    let mut improve = Vec::new();
    if i.root_causes.is_empty() {
        improve.push("Telemetry was not sufficient to identify a cause automatically".to_string());
    }
    if i.confidence_score < 0.7 {
        improve.push(format!(
            "Analysis confidence was only {}; richer telemetry would sharpen it",
            pct(i.confidence_score)
        ));
    }
    improve.extend(i.next_steps.iter().cloned());

    format!(
        "### What went well\n\n{}\n### What could be improved\n\n{}",
        bullets(&well),
        bullets(&improve)
    )
}

fn action_items(input: &SectionInput) -> String {
    let mut out = String::from(
        "| # | Priority | Action | Duration | Risk | Automatable |\n|---|---|---|---|---|---|\n",
    );
    for (n, a) in input.actions.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} | {} min | {} | {} |\n",
            n + 1,
            a.priority,
            a.title,
            a.expected_duration_minutes,
            a.risk_level,
            if a.automation_possible { "yes" } else { "no" }
        ));
    }
    for (n, a) in input.actions.iter().enumerate() {
        out.push_str(&format!("\n### {}. {}\n\n{}\n\n", n + 1, a.title, a.description));
        out.push_str("**Prerequisites:**\n\n");
        out.push_str(&bullets(&a.prerequisites));
        out.push_str("\n**Steps:**\n\n");
        for (s, step) in a.steps.iter().enumerate() {
            out.push_str(&format!("{}. {}\n", s + 1, step));
        }
        out.push_str("\n**Rollback:**\n\n");
        out.push_str(&bullets(&a.rollback_steps));
        if let Some(link) = &a.documentation_link {
            out.push_str(&format!("\n**Runbook:** <{}>\n", link));
        }
    }
    out
}

fn has_engineer_notes(input: &SectionInput) -> bool {
    input.engineer_notes.is_some_and(|n| !n.trim().is_empty())
}

fn engineer_notes(input: &SectionInput) -> String {
    format!("{}\n", input.engineer_notes.unwrap_or_default().trim())
}

fn monitoring(input: &SectionInput) -> String {
    let mut metrics: BTreeSet<&str> = BTreeSet::new();
    for a in input.actions {
        metrics.extend(a.monitoring_metrics.iter().map(String::as_str));
    }
    for c in &input.insight.root_causes {
        metrics.extend(c.related_metrics.iter().map(String::as_str));
    }
    let mut out = String::from("Watch these metrics until the incident is closed:\n\n");
    for m in metrics {
        out.push_str(&format!("- `{}`\n", m));
    }
    out.push_str(&format!(
        "\nAggregate analysis confidence: {}.\n",
        pct(input.insight.confidence_score)
    ));
    out
}
