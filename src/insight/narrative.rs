//! Narrative summary and next-step checklists.

use super::ImpactAnalysis;
use crate::detect::{CauseCategory, RootCause};
use crate::telemetry::IncidentContext;

const SHOWN_SERVICES: usize = 3;

fn services_phrase(services: &[String]) -> String {
    if services.is_empty() {
        return "no identified services".to_string();
    }
    let shown = services
        .iter()
        .take(SHOWN_SERVICES)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if services.len() > SHOWN_SERVICES {
        format!("{} and {} more", shown, services.len() - SHOWN_SERVICES)
    } else {
        shown
    }
}

fn cause_clause(cause: &RootCause) -> String {
    match cause.category {
        CauseCategory::DeploymentRegression => {
            format!("a regression introduced by a recent deployment ({})", cause.description)
        }
        CauseCategory::DatabaseIssues => {
            "database problems such as connection exhaustion, slow queries or lock contention".to_string()
        }
        CauseCategory::InfrastructureDegradation => {
            "degraded infrastructure (unhealthy nodes, disks or network)".to_string()
        }
        CauseCategory::DependencyFailure => {
            "failures in an upstream dependency that propagated to its callers".to_string()
        }
        CauseCategory::ResourceExhaustion => {
            "resource exhaustion (memory, CPU, file descriptors or disk)".to_string()
        }
        CauseCategory::ConfigurationError => {
            "an invalid or missing configuration setting".to_string()
        }
    }
}

/// One-paragraph account of the incident keyed on the primary cause.
pub fn summary(ctx: &IncidentContext, causes: &[RootCause], impact: &ImpactAnalysis) -> String {
    let alert_time = ctx.alert_timestamp.format("%Y-%m-%d %H:%M:%S UTC");
    let services = services_phrase(&impact.affected_services);

    match causes.first() {
        Some(primary) => format!(
            "At {} an incident was detected that was most likely caused by {}. \
             The incident lasted approximately {} minutes and affected {}. \
             Primary cause confidence is {:.0}% across {} candidate cause(s).",
            alert_time,
            cause_clause(primary),
            impact.sla_breach_duration_minutes,
            services,
            primary.confidence * 100.0,
            causes.len()
        ),
        None => format!(
            "At {} an incident was detected, but automated analysis could not determine \
             its cause (unknown root cause). The incident lasted approximately {} minutes and \
             affected {}; {} telemetry record(s) were examined and manual investigation is required.",
            alert_time,
            impact.sla_breach_duration_minutes,
            services,
            ctx.record_count()
        ),
    }
}

fn category_steps(category: CauseCategory) -> [&'static str; 4] {
    match category {
        CauseCategory::DeploymentRegression => [
            "Confirm the suspect deployment and roll it back if errors persist",
            "Compare error rates and latency before and after the rollout",
            "Review the change set and its test coverage",
            "Add a canary or progressive rollout gate for the affected services",
        ],
        CauseCategory::DatabaseIssues => [
            "Check connection pool usage and database server health",
            "Identify and kill or optimize long-running queries",
            "Review lock waits and deadlocks around the incident window",
            "Verify replication lag and failover readiness",
        ],
        CauseCategory::InfrastructureDegradation => [
            "Identify unhealthy nodes and cordon or replace them",
            "Check cloud provider status for the affected region or zone",
            "Verify disk, network and kernel health on affected hosts",
            "Confirm workloads rescheduled onto healthy capacity",
        ],
        CauseCategory::DependencyFailure => [
            "Check the health and status page of the failing dependency",
            "Enable circuit breaking or fallbacks for the failing calls",
            "Review timeout and retry settings for outbound requests",
            "Contact the dependency owner with the collected evidence",
        ],
        CauseCategory::ResourceExhaustion => [
            "Increase resource limits or scale out the affected service",
            "Capture heap or resource profiles before restarting",
            "Look for leaks in recently changed code paths",
            "Review capacity planning against current traffic",
        ],
        CauseCategory::ConfigurationError => [
            "Identify the configuration change and revert it",
            "Validate configuration against its schema before rollout",
            "Audit secrets, certificates and feature flags for the service",
            "Add configuration drift detection",
        ],
    }
}

const GENERAL_STEPS: [&str; 4] = [
    "Keep stakeholders and the status page updated until resolution",
    "Schedule a postmortem review within 48 hours",
    "Add or tune alerts for the signals that preceded this incident",
    "Track every remediation action item to completion",
];

const INVESTIGATION_STEPS: [&str; 4] = [
    "Review recent deployments and configuration changes",
    "Inspect error logs of the alerting service and its neighbours",
    "Check dashboards for upstream dependencies and infrastructure",
    "Escalate to the owning team for manual triage",
];

/// Category checklist plus general follow-ups, or a generic investigation
/// list when no cause was found.
pub fn next_steps(primary: Option<CauseCategory>) -> Vec<String> {
    match primary {
        Some(category) => category_steps(category)
            .iter()
            .chain(GENERAL_STEPS.iter())
            .map(|s| s.to_string())
            .collect(),
        None => INVESTIGATION_STEPS.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::tests::cause;
    use crate::insight::BusinessImpact;
    use chrono::{TimeZone, Utc};

    fn impact(services: &[&str]) -> ImpactAnalysis {
        ImpactAnalysis {
            affected_services: services.iter().map(|s| s.to_string()).collect(),
            affected_endpoints: vec![],
            user_impact_percentage: 0.6,
            estimated_users_affected: 750,
            sla_breach_duration_minutes: 30,
            business_impact: BusinessImpact::Medium,
        }
    }

    fn ctx() -> IncidentContext {
        IncidentContext::empty("INC-N", Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(), 30)
    }

    #[test]
    fn test_summary_truncates_services() {
        let causes = vec![cause(CauseCategory::DependencyFailure, 0.7, &[])];
        let text = summary(&ctx(), &causes, &impact(&["a", "b", "c", "d", "e"]));
        assert!(text.contains("2024-03-01 12:30:00 UTC"));
        assert!(text.contains("upstream dependency"));
        assert!(text.contains("30 minutes"));
        assert!(text.contains("a, b, c and 2 more"));
        assert!(!text.contains(", d"));
    }

    #[test]
    fn test_summary_unknown_cause() {
        let text = summary(&ctx(), &[], &impact(&[]));
        assert!(text.contains("unknown root cause"));
        assert!(text.contains("no identified services"));
    }

    #[test]
    fn test_next_steps_shapes() {
        assert_eq!(next_steps(None).len(), 4);
        let steps = next_steps(Some(CauseCategory::ResourceExhaustion));
        assert_eq!(steps.len(), 8);
        assert_eq!(steps[4], GENERAL_STEPS[0]);
    }
}
