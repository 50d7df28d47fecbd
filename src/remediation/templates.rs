//! Runbook templates, one set per cause category.

use super::{ActionType, Priority, RemediationAction, RiskLevel};
use crate::detect::{CauseCategory, RootCause};
use crate::insight::IncidentInsight;

const RUNBOOK_BASE: &str = "https://runbooks.internal/incident";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn services_label(cause: &RootCause) -> String {
    if cause.affected_services.is_empty() {
        "the affected services".to_string()
    } else {
        cause.affected_services.join(", ")
    }
}

/// Metrics to watch: the cause's own related metrics first, then defaults.
fn watch(cause: &RootCause, defaults: &[&str]) -> Vec<String> {
    let mut metrics = cause.related_metrics.clone();
    for d in defaults {
        if !metrics.iter().any(|m| m == d) {
            metrics.push(d.to_string());
        }
    }
    metrics
}

fn link(slug: &str) -> Option<String> {
    Some(format!("{}/{}", RUNBOOK_BASE, slug))
}

/// Fixed template for a cause's category.
pub fn for_cause(cause: &RootCause) -> Vec<RemediationAction> {
    match cause.category {
        CauseCategory::DeploymentRegression => vec![rollback(cause), investigate_deployment(cause)],
        CauseCategory::DatabaseIssues => vec![database_health_check(cause), optimize_queries(cause)],
        CauseCategory::InfrastructureDegradation => vec![restart_instances(cause), scale_out(cause)],
        CauseCategory::DependencyFailure => vec![circuit_breaker(cause), retry_logic(cause)],
        CauseCategory::ResourceExhaustion => vec![increase_resources(cause), investigate_leak(cause)],
        CauseCategory::ConfigurationError => vec![fix_configuration(cause)],
    }
}

/// Single action used when analysis produced no cause.
pub fn unknown_cause(insight: &IncidentInsight) -> RemediationAction {
    let services = if insight.impact_analysis.affected_services.is_empty() {
        "the alerting service".to_string()
    } else {
        insight.impact_analysis.affected_services.join(", ")
    };
    RemediationAction {
        action_type: ActionType::Investigation,
        priority: Priority::Immediate,
        title: "Investigate unknown root cause".to_string(),
        description: format!(
            "Automated analysis found no probable cause. Triage {} manually.",
            services
        ),
        steps: strings(&[
            "Open the service dashboards for the alert window",
            "Check for deployments or configuration changes not captured by telemetry",
            "Search logs for new error patterns around the alert time",
            "Page the owning team if the impact continues",
        ]),
        expected_duration_minutes: 30,
        risk_level: RiskLevel::Low,
        prerequisites: strings(&["Read access to dashboards, logs and traces"]),
        rollback_steps: strings(&["No changes are made by this action"]),
        monitoring_metrics: strings(&["error_rate", "request_latency_p99", "availability"]),
        documentation_link: link("manual-triage"),
        automation_possible: false,
    }
}

// ---------------------------------------------------------------------------
// Deployment regression
// ---------------------------------------------------------------------------

fn rollback(cause: &RootCause) -> RemediationAction {
    let services = services_label(cause);
    RemediationAction {
        action_type: ActionType::Rollback,
        priority: Priority::Immediate,
        title: "Roll back the suspect deployment".to_string(),
        description: format!("Revert {} to the last known good release.", services),
        steps: vec![
            format!("Identify the previous stable release for {}", services),
            "Announce the rollback in the incident channel".to_string(),
            "Trigger the rollback through the deployment pipeline".to_string(),
            "Wait for all replicas to report healthy".to_string(),
            "Confirm error rate and latency return to baseline".to_string(),
        ],
        expected_duration_minutes: 15,
        risk_level: RiskLevel::Medium,
        prerequisites: strings(&[
            "Previous release artifact is still available",
            "No irreversible schema migration shipped with the release",
        ]),
        rollback_steps: strings(&[
            "Redeploy the rolled-back release if the previous version misbehaves",
            "Re-enable the deployment pipeline after verification",
        ]),
        monitoring_metrics: watch(cause, &["error_rate", "request_latency_p99", "deployment_replicas_available"]),
        documentation_link: link("rollback"),
        automation_possible: true,
    }
}

fn investigate_deployment(cause: &RootCause) -> RemediationAction {
    RemediationAction {
        action_type: ActionType::Investigation,
        priority: Priority::High,
        title: "Investigate the deployment change set".to_string(),
        description: format!(
            "Find the change in the release that caused the regression in {}.",
            services_label(cause)
        ),
        steps: strings(&[
            "Diff the suspect release against the previous one",
            "Correlate new error signatures with changed code paths",
            "Reproduce the failure in staging",
            "Prepare a fix with a regression test",
        ]),
        expected_duration_minutes: 60,
        risk_level: RiskLevel::Low,
        prerequisites: strings(&["Access to the repository and CI history"]),
        rollback_steps: strings(&["No production changes are made by this action"]),
        monitoring_metrics: watch(cause, &["error_rate"]),
        documentation_link: link("deployment-investigation"),
        automation_possible: false,
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

fn database_health_check(cause: &RootCause) -> RemediationAction {
    RemediationAction {
        action_type: ActionType::HealthCheck,
        priority: Priority::Immediate,
        title: "Check database health".to_string(),
        description: format!(
            "Verify the database serving {} is accepting connections and keeping up.",
            services_label(cause)
        ),
        steps: strings(&[
            "Check primary and replica availability",
            "Inspect active connections against the pool limit",
            "List long-running queries and blocking locks",
            "Terminate runaway queries if they block production traffic",
        ]),
        expected_duration_minutes: 10,
        risk_level: RiskLevel::Low,
        prerequisites: strings(&["Database admin credentials", "Access to the database console"]),
        rollback_steps: strings(&["Terminated queries can be re-run by their owners"]),
        monitoring_metrics: watch(cause, &["db_connections_active", "db_query_duration_p99", "db_replication_lag"]),
        documentation_link: link("database-health"),
        automation_possible: true,
    }
}

fn optimize_queries(cause: &RootCause) -> RemediationAction {
    RemediationAction {
        action_type: ActionType::QueryOptimization,
        priority: Priority::High,
        title: "Optimize slow queries".to_string(),
        description: "Reduce load from the queries that degraded during the incident.".to_string(),
        steps: strings(&[
            "Collect slow query logs for the incident window",
            "Run EXPLAIN on the worst offenders",
            "Add missing indexes or rewrite the queries",
            "Tune connection pool sizes for the observed load",
        ]),
        expected_duration_minutes: 120,
        risk_level: RiskLevel::Medium,
        prerequisites: strings(&["Slow query logging enabled", "A staging database with representative data"]),
        rollback_steps: strings(&["Drop newly added indexes", "Restore previous pool settings"]),
        monitoring_metrics: watch(cause, &["db_query_duration_p99", "db_cpu_utilization"]),
        documentation_link: link("query-optimization"),
        automation_possible: false,
    }
}

// ---------------------------------------------------------------------------
// Infrastructure
// ---------------------------------------------------------------------------

fn restart_instances(cause: &RootCause) -> RemediationAction {
    let services = services_label(cause);
    RemediationAction {
        action_type: ActionType::Restart,
        priority: Priority::Immediate,
        title: "Restart or replace unhealthy instances".to_string(),
        description: format!("Move {} off degraded hosts.", services),
        steps: vec![
            "Identify unhealthy nodes from health checks".to_string(),
            "Cordon and drain the unhealthy nodes".to_string(),
            format!("Restart the workloads for {}", services),
            "Replace nodes that do not recover".to_string(),
        ],
        expected_duration_minutes: 10,
        risk_level: RiskLevel::Medium,
        prerequisites: strings(&["Spare capacity to absorb drained workloads"]),
        rollback_steps: strings(&["Uncordon nodes once they are healthy again"]),
        monitoring_metrics: watch(cause, &["node_ready", "pod_restarts_total", "error_rate"]),
        documentation_link: link("restart-instances"),
        automation_possible: true,
    }
}

fn scale_out(cause: &RootCause) -> RemediationAction {
    RemediationAction {
        action_type: ActionType::Scaling,
        priority: Priority::High,
        title: "Scale out capacity".to_string(),
        description: format!("Add headroom for {} while the infrastructure recovers.", services_label(cause)),
        steps: strings(&[
            "Increase replica counts for the affected services",
            "Spread replicas across healthy zones",
            "Review autoscaling thresholds",
        ]),
        expected_duration_minutes: 30,
        risk_level: RiskLevel::Low,
        prerequisites: strings(&["Available cluster or cloud quota"]),
        rollback_steps: strings(&["Return replica counts to their previous values"]),
        monitoring_metrics: watch(cause, &["cpu_utilization", "node_ready"]),
        documentation_link: link("scaling"),
        automation_possible: true,
    }
}

// ---------------------------------------------------------------------------
// Dependency
// ---------------------------------------------------------------------------

fn circuit_breaker(cause: &RootCause) -> RemediationAction {
    RemediationAction {
        action_type: ActionType::CircuitBreaker,
        priority: Priority::Immediate,
        title: "Enable circuit breaker for the failing dependency".to_string(),
        description: format!(
            "Stop {} from waiting on a failing upstream and serve fallbacks.",
            services_label(cause)
        ),
        steps: strings(&[
            "Identify the failing upstream from traces",
            "Open the circuit breaker or lower its failure threshold",
            "Enable cached or degraded responses",
            "Notify the dependency owner",
        ]),
        expected_duration_minutes: 20,
        risk_level: RiskLevel::Medium,
        prerequisites: strings(&["Circuit breaker support in the calling service", "A defined fallback behaviour"]),
        rollback_steps: strings(&["Close the circuit breaker once the upstream is healthy"]),
        monitoring_metrics: watch(cause, &["upstream_error_rate", "circuit_breaker_state", "request_latency_p99"]),
        documentation_link: link("circuit-breaker"),
        automation_possible: true,
    }
}

fn retry_logic(cause: &RootCause) -> RemediationAction {
    RemediationAction {
        action_type: ActionType::RetryLogic,
        priority: Priority::High,
        title: "Harden retry and timeout handling".to_string(),
        description: "Make outbound calls resilient to transient upstream failures.".to_string(),
        steps: strings(&[
            "Add exponential backoff with jitter to outbound retries",
            "Cap retries to avoid amplifying upstream load",
            "Set explicit per-call timeouts",
            "Load-test the new behaviour in staging",
        ]),
        expected_duration_minutes: 90,
        risk_level: RiskLevel::Low,
        prerequisites: strings(&["Client library supporting retry policies"]),
        rollback_steps: strings(&["Revert the retry policy change"]),
        monitoring_metrics: watch(cause, &["upstream_retry_total", "upstream_error_rate"]),
        documentation_link: link("retry-policy"),
        automation_possible: false,
    }
}

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

fn increase_resources(cause: &RootCause) -> RemediationAction {
    let services = services_label(cause);
    RemediationAction {
        action_type: ActionType::ResourceIncrease,
        priority: Priority::Immediate,
        title: "Increase resource limits".to_string(),
        description: format!("Give {} enough memory, CPU and file handles to recover.", services),
        steps: vec![
            format!("Raise memory and CPU limits for {}", services),
            "Raise file descriptor limits if they were exhausted".to_string(),
            "Roll the change out and watch for OOM kills".to_string(),
        ],
        expected_duration_minutes: 15,
        risk_level: RiskLevel::Low,
        prerequisites: strings(&["Node capacity for the larger limits"]),
        rollback_steps: strings(&["Restore the previous resource limits"]),
        monitoring_metrics: watch(cause, &["container_memory_usage_bytes", "container_cpu_usage", "oom_kills_total"]),
        documentation_link: link("resource-limits"),
        automation_possible: true,
    }
}

fn investigate_leak(cause: &RootCause) -> RemediationAction {
    RemediationAction {
        action_type: ActionType::LeakInvestigation,
        priority: Priority::High,
        title: "Investigate resource leak".to_string(),
        description: format!("Find why {} kept growing its resource usage.", services_label(cause)),
        steps: strings(&[
            "Capture heap and file descriptor snapshots",
            "Compare usage growth against traffic",
            "Bisect recent changes touching allocation or connection handling",
            "Ship a fix with a soak test",
        ]),
        expected_duration_minutes: 180,
        risk_level: RiskLevel::Low,
        prerequisites: strings(&["Profiling tools available in the runtime"]),
        rollback_steps: strings(&["No production changes are made by this action"]),
        monitoring_metrics: watch(cause, &["container_memory_usage_bytes", "process_open_fds"]),
        documentation_link: link("leak-investigation"),
        automation_possible: false,
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn fix_configuration(cause: &RootCause) -> RemediationAction {
    let services = services_label(cause);
    RemediationAction {
        action_type: ActionType::ConfigFix,
        priority: Priority::Immediate,
        title: "Revert the faulty configuration".to_string(),
        description: format!("Restore the last known good configuration for {}.", services),
        steps: vec![
            format!("Diff the current configuration of {} against the last good version", services),
            "Revert the offending keys, secrets or flags".to_string(),
            "Reload or restart the services to pick up the change".to_string(),
            "Validate the configuration with a smoke test".to_string(),
        ],
        expected_duration_minutes: 20,
        risk_level: RiskLevel::Medium,
        prerequisites: strings(&["Configuration history or version control", "Permission to change runtime configuration"]),
        rollback_steps: strings(&["Re-apply the reverted configuration if the old one fails validation"]),
        monitoring_metrics: watch(cause, &["error_rate", "config_reload_failures_total"]),
        documentation_link: link("configuration"),
        automation_possible: true,
    }
}
