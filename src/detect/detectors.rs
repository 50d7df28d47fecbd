//! The six category detectors.
//!
//! Each one starts from a base confidence and adds a fixed increment per
//! class of matching evidence (log signatures, metric anomalies, traces,
//! system events). Matching is plain keyword search over pattern, metric,
//! operation and event names.

use chrono::Duration;

use super::{matches_any, Candidate, CauseCategory, DetectError, Detector, RootCause};
use crate::telemetry::{DeploymentStatus, IncidentContext};

/// A deployment older than this before the alert is not a suspect.
pub const DEPLOYMENT_LOOKBACK_MINUTES: i64 = 30;

/// Evidence that points straight at the category.
const STRONG_INCREMENT: f64 = 0.3;
/// Evidence that corroborates the category.
const SUPPORTING_INCREMENT: f64 = 0.2;

/// Detectors in invocation order. Order breaks confidence ties.
pub fn default_detectors() -> Vec<Box<dyn Detector>> {
    vec![
        Box::new(DeploymentRegression),
        Box::new(DatabaseIssues),
        Box::new(InfrastructureDegradation),
        Box::new(DependencyFailure),
        Box::new(ResourceExhaustion),
        Box::new(ConfigurationError),
    ]
}

fn join_limited(items: &[String], limit: usize) -> String {
    let shown: Vec<&str> = items.iter().take(limit).map(String::as_str).collect();
    if items.len() > limit {
        format!("{} (+{} more)", shown.join(", "), items.len() - limit)
    } else {
        shown.join(", ")
    }
}

// ---------------------------------------------------------------------------
// Deployment regression
// ---------------------------------------------------------------------------

const REGRESSION_METRICS: &[&str] = &[
    "error",
    "latency",
    "duration",
    "5xx",
    "http_request",
    "response_time",
    "failure",
];

pub struct DeploymentRegression;

impl Detector for DeploymentRegression {
    fn category(&self) -> CauseCategory {
        CauseCategory::DeploymentRegression
    }

    fn detect(&self, ctx: &IncidentContext) -> Result<Option<RootCause>, DetectError> {
        let lookback = ctx.alert_timestamp - Duration::minutes(DEPLOYMENT_LOOKBACK_MINUTES);
        let Some(deploy) = ctx
            .deployment_events
            .iter()
            .filter(|d| d.timestamp >= lookback && d.timestamp <= ctx.alert_timestamp)
            .max_by_key(|d| d.timestamp)
        else {
            return Ok(None);
        };

        let minutes_before = (ctx.alert_timestamp - deploy.timestamp).num_minutes();
        let mut c = Candidate::new(self.category(), 0.5);
        c.note(format!(
            "Deployment {} ({}, commit {}) by {} finished {} minutes before the alert",
            deploy.deployment_id, deploy.version, deploy.commit_hash, deploy.author, minutes_before
        ));
        c.seen_at(deploy.timestamp);
        for s in &deploy.services {
            c.service(s);
        }

        if deploy.status != DeploymentStatus::Success {
            c.add(0.1, format!("Deployment status is {:?}", deploy.status));
        }

        let new_errors: Vec<_> = ctx
            .log_signatures
            .iter()
            .filter(|l| l.severity.is_error_or_worse() && l.first_seen >= deploy.timestamp)
            .collect();
        if !new_errors.is_empty() {
            let patterns: Vec<String> = new_errors.iter().map(|l| l.pattern.clone()).collect();
            c.add(
                STRONG_INCREMENT,
                format!(
                    "{} new error signature(s) after the deployment: {}",
                    new_errors.len(),
                    join_limited(&patterns, 3)
                ),
            );
            for l in new_errors {
                c.log(&l.pattern);
                c.service(&l.service);
                c.seen_at(l.first_seen);
            }
        }

        let anomalies: Vec<_> = ctx
            .metrics_anomalies
            .iter()
            .filter(|m| m.timestamp >= deploy.timestamp && matches_any(&m.metric_name, REGRESSION_METRICS))
            .collect();
        if !anomalies.is_empty() {
            let names: Vec<String> = anomalies.iter().map(|m| m.metric_name.clone()).collect();
            c.add(
                SUPPORTING_INCREMENT,
                format!("Error/latency metrics degraded after the deployment: {}", join_limited(&names, 3)),
            );
            for m in anomalies {
                c.metric(&m.metric_name);
                c.seen_at(m.timestamp);
                if let Some(svc) = m.labels.get("service") {
                    c.service(svc);
                }
            }
        }

        let failing: Vec<_> = ctx
            .trace_outliers
            .iter()
            .filter(|t| t.is_error() && t.timestamp >= deploy.timestamp)
            .collect();
        if !failing.is_empty() {
            c.add(
                SUPPORTING_INCREMENT,
                format!("{} failing trace(s) after the deployment", failing.len()),
            );
            for t in failing {
                c.trace(&t.trace_id);
                c.service(&t.service_name);
            }
        }

        let services = if deploy.services.is_empty() {
            "the deployed services".to_string()
        } else {
            deploy.services.join(", ")
        };
        let description = format!(
            "Deployment {} of version {} is the likely trigger: the alert fired {} minutes after it rolled out to {}",
            deploy.deployment_id, deploy.version, minutes_before, services
        );
        let hints = vec![
            format!("Roll back {} to the release before {}", services, deploy.version),
            format!("Review the diff of commit {}", deploy.commit_hash),
            "Freeze further deployments until the regression is understood".to_string(),
        ];
        Ok(c.finish(ctx, description, hints))
    }
}

// ---------------------------------------------------------------------------
// Database issues
// ---------------------------------------------------------------------------

const DB_LOG_KEYWORDS: &[&str] = &[
    "database",
    "sql",
    "postgres",
    "mysql",
    "deadlock",
    "connection pool",
    "query timeout",
    "too many connections",
    "lock wait",
];
const DB_METRIC_KEYWORDS: &[&str] = &["db_", "database", "sql", "query", "connection_pool", "pg_", "mysql_"];
const DB_TRACE_KEYWORDS: &[&str] = &["db.", "db_", "sql", "query", "select", "insert", "postgres", "mysql"];

pub struct DatabaseIssues;

impl Detector for DatabaseIssues {
    fn category(&self) -> CauseCategory {
        CauseCategory::DatabaseIssues
    }

    fn detect(&self, ctx: &IncidentContext) -> Result<Option<RootCause>, DetectError> {
        let mut c = Candidate::new(self.category(), 0.4);

        let logs: Vec<_> = ctx
            .log_signatures
            .iter()
            .filter(|l| matches_any(&l.pattern, DB_LOG_KEYWORDS))
            .collect();
        if !logs.is_empty() {
            let total: u64 = logs.iter().map(|l| l.count).sum();
            c.add(
                STRONG_INCREMENT,
                format!("{} database error signature(s), {} occurrences", logs.len(), total),
            );
            for l in logs {
                c.log(&l.pattern);
                c.service(&l.service);
                c.seen_at(l.first_seen);
            }
        }

        let metrics: Vec<_> = ctx
            .metrics_anomalies
            .iter()
            .filter(|m| matches_any(&m.metric_name, DB_METRIC_KEYWORDS))
            .collect();
        if !metrics.is_empty() {
            for m in &metrics {
                c.metric(&m.metric_name);
                c.seen_at(m.timestamp);
            }
            c.add(
                SUPPORTING_INCREMENT,
                format!(
                    "Database metrics anomalous: {}",
                    metrics
                        .iter()
                        .map(|m| format!("{}={:.2} (threshold {:.2})", m.metric_name, m.value, m.threshold))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            );
        }

        let traces: Vec<_> = ctx
            .trace_outliers
            .iter()
            .filter(|t| matches_any(&t.operation_name, DB_TRACE_KEYWORDS))
            .collect();
        if !traces.is_empty() {
            let slowest = traces.iter().map(|t| t.duration_ms).fold(0.0_f64, f64::max);
            c.add(
                SUPPORTING_INCREMENT,
                format!("{} slow or failing database span(s), slowest {:.0}ms", traces.len(), slowest),
            );
            for t in traces {
                c.trace(&t.trace_id);
                c.service(&t.service_name);
                c.seen_at(t.timestamp);
            }
        }

        let hints = vec![
            "Check database connection pool saturation and active connections".to_string(),
            "Look for long-running queries and lock contention".to_string(),
            "Verify replication lag and primary health".to_string(),
        ];
        Ok(c.finish(
            ctx,
            "Database degradation (connection, query or locking problems) is slowing or failing dependent requests"
                .to_string(),
            hints,
        ))
    }
}

// ---------------------------------------------------------------------------
// Infrastructure degradation
// ---------------------------------------------------------------------------

const INFRA_EVENT_KEYWORDS: &[&str] = &[
    "node", "host", "instance", "pod", "container", "disk", "network", "kernel", "hardware", "zone",
];
const INFRA_METRIC_KEYWORDS: &[&str] = &["cpu", "node_", "disk", "network", "load", "host_", "kube_node"];
const INFRA_LOG_KEYWORDS: &[&str] = &[
    "host unreachable",
    "no route to host",
    "node not ready",
    "i/o error",
    "network unreachable",
    "read-only file system",
];

pub struct InfrastructureDegradation;

impl Detector for InfrastructureDegradation {
    fn category(&self) -> CauseCategory {
        CauseCategory::InfrastructureDegradation
    }

    fn detect(&self, ctx: &IncidentContext) -> Result<Option<RootCause>, DetectError> {
        let mut c = Candidate::new(self.category(), 0.4);

        let events: Vec<_> = ctx
            .system_events
            .iter()
            .filter(|e| matches_any(&e.event_type, INFRA_EVENT_KEYWORDS))
            .collect();
        if !events.is_empty() {
            c.add(
                STRONG_INCREMENT,
                format!(
                    "Infrastructure events: {}",
                    events.iter().map(|e| e.event_type.as_str()).collect::<Vec<_>>().join(", ")
                ),
            );
            for e in events {
                c.seen_at(e.timestamp);
                for comp in &e.affected_components {
                    c.service(comp);
                }
            }
        }

        let metrics: Vec<_> = ctx
            .metrics_anomalies
            .iter()
            .filter(|m| matches_any(&m.metric_name, INFRA_METRIC_KEYWORDS))
            .collect();
        if !metrics.is_empty() {
            let names: Vec<String> = metrics.iter().map(|m| m.metric_name.clone()).collect();
            c.add(SUPPORTING_INCREMENT, format!("Host-level metrics anomalous: {}", join_limited(&names, 3)));
            for m in metrics {
                c.metric(&m.metric_name);
                c.seen_at(m.timestamp);
                if let Some(svc) = m.labels.get("service") {
                    c.service(svc);
                }
            }
        }

        let logs: Vec<_> = ctx
            .log_signatures
            .iter()
            .filter(|l| matches_any(&l.pattern, INFRA_LOG_KEYWORDS))
            .collect();
        if !logs.is_empty() {
            c.add(
                SUPPORTING_INCREMENT,
                format!("{} infrastructure error signature(s) in logs", logs.len()),
            );
            for l in logs {
                c.log(&l.pattern);
                c.service(&l.service);
                c.seen_at(l.first_seen);
            }
        }

        let hints = vec![
            "Check node and host health in the affected zone".to_string(),
            "Drain or replace unhealthy instances".to_string(),
            "Review recent cloud provider status notices".to_string(),
        ];
        Ok(c.finish(
            ctx,
            "Underlying infrastructure (nodes, disks or network) is degraded".to_string(),
            hints,
        ))
    }
}

// ---------------------------------------------------------------------------
// Dependency failure
// ---------------------------------------------------------------------------

const DEP_LOG_KEYWORDS: &[&str] = &[
    "upstream",
    "bad gateway",
    "service unavailable",
    "503",
    "502",
    "connection refused",
    "circuit breaker",
    "dependency",
    "remote call",
];
const DEP_TRACE_KEYWORDS: &[&str] = &["http", "grpc", "call", "client", "fetch", "external", "api"];
const DEP_ERROR_KEYWORDS: &[&str] = &["timeout", "timed out", "unavailable", "refused", "reset"];
const DEP_METRIC_KEYWORDS: &[&str] = &["upstream", "external", "dependency", "outbound", "client_request"];

pub struct DependencyFailure;

impl Detector for DependencyFailure {
    fn category(&self) -> CauseCategory {
        CauseCategory::DependencyFailure
    }

    fn detect(&self, ctx: &IncidentContext) -> Result<Option<RootCause>, DetectError> {
        let mut c = Candidate::new(self.category(), 0.4);

        let logs: Vec<_> = ctx
            .log_signatures
            .iter()
            .filter(|l| matches_any(&l.pattern, DEP_LOG_KEYWORDS))
            .collect();
        if !logs.is_empty() {
            let patterns: Vec<String> = logs.iter().map(|l| l.pattern.clone()).collect();
            c.add(
                STRONG_INCREMENT,
                format!("Upstream failure signatures: {}", join_limited(&patterns, 3)),
            );
            for l in logs {
                c.log(&l.pattern);
                c.service(&l.service);
                c.seen_at(l.first_seen);
            }
        }

        let traces: Vec<_> = ctx
            .trace_outliers
            .iter()
            .filter(|t| {
                t.is_error()
                    && (matches_any(&t.operation_name, DEP_TRACE_KEYWORDS)
                        || t.error_message
                            .as_deref()
                            .is_some_and(|msg| matches_any(msg, DEP_ERROR_KEYWORDS)))
            })
            .collect();
        if !traces.is_empty() {
            c.add(
                SUPPORTING_INCREMENT,
                format!("{} outbound call(s) failed or timed out", traces.len()),
            );
            for t in traces {
                c.trace(&t.trace_id);
                c.service(&t.service_name);
                c.seen_at(t.timestamp);
            }
        }

        let metrics: Vec<_> = ctx
            .metrics_anomalies
            .iter()
            .filter(|m| matches_any(&m.metric_name, DEP_METRIC_KEYWORDS))
            .collect();
        if !metrics.is_empty() {
            let names: Vec<String> = metrics.iter().map(|m| m.metric_name.clone()).collect();
            c.add(SUPPORTING_INCREMENT, format!("Dependency metrics anomalous: {}", join_limited(&names, 3)));
            for m in metrics {
                c.metric(&m.metric_name);
                c.seen_at(m.timestamp);
            }
        }

        let hints = vec![
            "Check the status of upstream services and third-party providers".to_string(),
            "Enable or tighten circuit breakers on failing calls".to_string(),
            "Serve cached or degraded responses where possible".to_string(),
        ];
        Ok(c.finish(
            ctx,
            "An upstream dependency is failing or timing out and the failures propagate to callers".to_string(),
            hints,
        ))
    }
}

// ---------------------------------------------------------------------------
// Resource exhaustion
// ---------------------------------------------------------------------------

const RES_LOG_KEYWORDS: &[&str] = &[
    "out of memory",
    "oom",
    "too many open files",
    "no space left",
    "resource exhausted",
    "heap",
    "memory limit",
    "thread pool",
];
const RES_METRIC_KEYWORDS: &[&str] = &[
    "memory",
    "heap",
    "cpu_throttl",
    "file_descriptor",
    "fd_",
    "threads",
    "disk_usage",
    "saturation",
    "gc_",
];
const RES_EVENT_KEYWORDS: &[&str] = &["oom", "evict", "throttl", "quota"];

pub struct ResourceExhaustion;

impl Detector for ResourceExhaustion {
    fn category(&self) -> CauseCategory {
        CauseCategory::ResourceExhaustion
    }

    fn detect(&self, ctx: &IncidentContext) -> Result<Option<RootCause>, DetectError> {
        let mut c = Candidate::new(self.category(), 0.45);

        let logs: Vec<_> = ctx
            .log_signatures
            .iter()
            .filter(|l| matches_any(&l.pattern, RES_LOG_KEYWORDS))
            .collect();
        if !logs.is_empty() {
            let patterns: Vec<String> = logs.iter().map(|l| l.pattern.clone()).collect();
            c.add(STRONG_INCREMENT, format!("Exhaustion errors in logs: {}", join_limited(&patterns, 3)));
            for l in logs {
                c.log(&l.pattern);
                c.service(&l.service);
                c.seen_at(l.first_seen);
            }
        }

        let metrics: Vec<_> = ctx
            .metrics_anomalies
            .iter()
            .filter(|m| matches_any(&m.metric_name, RES_METRIC_KEYWORDS))
            .collect();
        if !metrics.is_empty() {
            let worst = metrics
                .iter()
                .filter(|m| m.threshold > 0.0)
                .map(|m| m.value / m.threshold)
                .fold(0.0_f64, f64::max);
            c.add(
                SUPPORTING_INCREMENT,
                format!("{} resource metric(s) over threshold, worst at {:.0}% of limit", metrics.len(), worst * 100.0),
            );
            for m in metrics {
                c.metric(&m.metric_name);
                c.seen_at(m.timestamp);
                if let Some(svc) = m.labels.get("service") {
                    c.service(svc);
                }
            }
        }

        let events: Vec<_> = ctx
            .system_events
            .iter()
            .filter(|e| matches_any(&e.event_type, RES_EVENT_KEYWORDS) || matches_any(&e.description, RES_EVENT_KEYWORDS))
            .collect();
        if !events.is_empty() {
            c.add(SUPPORTING_INCREMENT, format!("{} OOM/eviction/throttling event(s)", events.len()));
            for e in events {
                c.seen_at(e.timestamp);
                for comp in &e.affected_components {
                    c.service(comp);
                }
            }
        }

        let hints = vec![
            "Raise memory/CPU limits or scale out the affected service".to_string(),
            "Profile for memory or file descriptor leaks".to_string(),
            "Check recent traffic growth against capacity".to_string(),
        ];
        Ok(c.finish(
            ctx,
            "A service ran out of a bounded resource (memory, CPU, file descriptors or disk)".to_string(),
            hints,
        ))
    }
}

// ---------------------------------------------------------------------------
// Configuration error
// ---------------------------------------------------------------------------

const CONFIG_LOG_KEYWORDS: &[&str] = &[
    "config",
    "invalid value",
    "missing required",
    "permission denied",
    "unauthorized",
    "certificate",
    "environment variable",
    "feature flag",
];
const CONFIG_EVENT_KEYWORDS: &[&str] = &["config", "feature_flag", "secret", "certificate"];

pub struct ConfigurationError;

impl Detector for ConfigurationError {
    fn category(&self) -> CauseCategory {
        CauseCategory::ConfigurationError
    }

    fn detect(&self, ctx: &IncidentContext) -> Result<Option<RootCause>, DetectError> {
        let mut c = Candidate::new(self.category(), 0.45);

        let logs: Vec<_> = ctx
            .log_signatures
            .iter()
            .filter(|l| matches_any(&l.pattern, CONFIG_LOG_KEYWORDS))
            .collect();
        if !logs.is_empty() {
            let patterns: Vec<String> = logs.iter().map(|l| l.pattern.clone()).collect();
            c.add(STRONG_INCREMENT, format!("Configuration errors in logs: {}", join_limited(&patterns, 3)));
            for l in logs {
                c.log(&l.pattern);
                c.service(&l.service);
                c.seen_at(l.first_seen);
            }
        }

        let events: Vec<_> = ctx
            .system_events
            .iter()
            .filter(|e| matches_any(&e.event_type, CONFIG_EVENT_KEYWORDS))
            .collect();
        if !events.is_empty() {
            c.add(
                SUPPORTING_INCREMENT,
                format!(
                    "Configuration changes: {}",
                    events.iter().map(|e| e.description.as_str()).collect::<Vec<_>>().join("; ")
                ),
            );
            for e in events {
                c.seen_at(e.timestamp);
                for comp in &e.affected_components {
                    c.service(comp);
                }
            }
        }

        let traces: Vec<_> = ctx
            .trace_outliers
            .iter()
            .filter(|t| {
                t.error_message
                    .as_deref()
                    .is_some_and(|msg| matches_any(msg, CONFIG_LOG_KEYWORDS))
            })
            .collect();
        if !traces.is_empty() {
            c.add(SUPPORTING_INCREMENT, format!("{} span(s) failed with configuration errors", traces.len()));
            for t in traces {
                c.trace(&t.trace_id);
                c.service(&t.service_name);
                c.seen_at(t.timestamp);
            }
        }

        let hints = vec![
            "Diff the running configuration against the last known good version".to_string(),
            "Validate secrets, certificates and feature flags".to_string(),
        ];
        Ok(c.finish(
            ctx,
            "A configuration change left a service with invalid or missing settings".to_string(),
            hints,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{EMISSION_FLOOR, MAX_CONFIDENCE};
    use crate::telemetry::{
        DeploymentEvent, LogSignature, MetricAnomaly, Severity, SystemEvent, TraceOutlier,
    };
    use chrono::{DateTime, TimeZone, Utc};

    fn alert() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap()
    }

    fn ctx() -> IncidentContext {
        IncidentContext::empty("INC-T", alert(), 30)
    }

    fn deploy(minutes_before: i64) -> DeploymentEvent {
        DeploymentEvent {
            deployment_id: "deploy-42".to_string(),
            version: "v1.8.0".to_string(),
            commit_hash: "9f2c1e".to_string(),
            author: "alice".to_string(),
            timestamp: alert() - Duration::minutes(minutes_before),
            status: DeploymentStatus::Success,
            services: vec!["checkout".to_string()],
            change_request_id: Some("CR-7".to_string()),
        }
    }

    fn metric(name: &str) -> MetricAnomaly {
        MetricAnomaly {
            metric_name: name.to_string(),
            value: 4.2,
            threshold: 2.0,
            severity: Severity::Critical,
            timestamp: alert(),
            labels: Default::default(),
            description: String::new(),
        }
    }

    fn log(pattern: &str, severity: Severity) -> LogSignature {
        LogSignature {
            pattern: pattern.to_string(),
            count: 40,
            first_seen: alert() - Duration::minutes(2),
            last_seen: alert(),
            severity,
            service: "checkout".to_string(),
            log_level: "ERROR".to_string(),
            sample_messages: vec![],
        }
    }

    fn trace(op: &str, err: Option<&str>) -> TraceOutlier {
        TraceOutlier {
            trace_id: format!("trace-{}", op),
            span_id: "span-1".to_string(),
            operation_name: op.to_string(),
            duration_ms: 2500.0,
            status: if err.is_some() { "error" } else { "ok" }.to_string(),
            error_message: err.map(str::to_string),
            timestamp: alert(),
            service_name: "checkout".to_string(),
            tags: Default::default(),
        }
    }

    fn event(kind: &str, description: &str) -> SystemEvent {
        SystemEvent {
            event_type: kind.to_string(),
            timestamp: alert() - Duration::minutes(3),
            description: description.to_string(),
            severity: Severity::Warning,
            affected_components: vec!["node-7".to_string()],
            metadata: Default::default(),
        }
    }

    #[test]
    fn test_deployment_with_latency_anomaly() {
        let mut c = ctx();
        c.deployment_events.push(deploy(5));
        c.metrics_anomalies.push(metric("http_request_duration_seconds"));

        let cause = DeploymentRegression.detect(&c).unwrap().expect("should emit");
        assert_eq!(cause.category, CauseCategory::DeploymentRegression);
        assert!((cause.confidence - 0.7).abs() < 1e-9);
        assert_eq!(cause.affected_services, vec!["checkout".to_string()]);
        assert_eq!(cause.related_metrics, vec!["http_request_duration_seconds".to_string()]);
    }

    #[test]
    fn test_deployment_outside_lookback_is_ignored() {
        let mut c = ctx();
        c.deployment_events.push(deploy(45));
        c.metrics_anomalies.push(metric("http_request_duration_seconds"));
        c.log_signatures.push(log("NullPointerException in CartService", Severity::Error));
        assert!(DeploymentRegression.detect(&c).unwrap().is_none());
    }

    #[test]
    fn test_deployment_alone_is_below_floor() {
        let mut c = ctx();
        c.deployment_events.push(deploy(5));
        assert!(DeploymentRegression.detect(&c).unwrap().is_none());
    }

    #[test]
    fn test_deployment_all_evidence_is_clipped() {
        let mut c = ctx();
        let mut d = deploy(10);
        d.status = DeploymentStatus::RollingBack;
        c.deployment_events.push(d);
        c.metrics_anomalies.push(metric("http_errors_total"));
        c.log_signatures.push(log("NullPointerException in CartService", Severity::Critical));
        c.trace_outliers.push(trace("POST /cart", Some("500 internal")));
        let cause = DeploymentRegression.detect(&c).unwrap().unwrap();
        assert_eq!(cause.confidence, MAX_CONFIDENCE);
    }

    #[test]
    fn test_database_logs_and_traces() {
        let mut c = ctx();
        c.log_signatures.push(log("deadlock detected while updating orders", Severity::Error));
        c.trace_outliers.push(trace("SELECT orders", None));
        let cause = DatabaseIssues.detect(&c).unwrap().unwrap();
        assert!((cause.confidence - 0.9).abs() < 1e-9);
        assert_eq!(cause.related_traces, vec!["trace-SELECT orders".to_string()]);
    }

    #[test]
    fn test_database_metric_alone_stays_at_floor() {
        let mut c = ctx();
        c.metrics_anomalies.push(metric("db_connections_active"));
        assert!(DatabaseIssues.detect(&c).unwrap().is_none());
    }

    #[test]
    fn test_infrastructure_events_and_metrics() {
        let mut c = ctx();
        c.system_events.push(event("node_not_ready", "node-7 stopped reporting"));
        c.metrics_anomalies.push(metric("node_cpu_seconds_total"));
        let cause = InfrastructureDegradation.detect(&c).unwrap().unwrap();
        assert!((cause.confidence - 0.9).abs() < 1e-9);
        assert!(cause.affected_services.contains(&"node-7".to_string()));
    }

    #[test]
    fn test_infrastructure_event_outweighs_log() {
        let mut events = ctx();
        events.system_events.push(event("node_not_ready", "node-7 stopped reporting"));
        let cause = InfrastructureDegradation.detect(&events).unwrap().unwrap();
        assert!((cause.confidence - 0.7).abs() < 1e-9);

        let mut logs = ctx();
        logs.log_signatures.push(log("node not ready on host-3", Severity::Error));
        assert!(InfrastructureDegradation.detect(&logs).unwrap().is_none());
    }

    #[test]
    fn test_dependency_failure_from_logs() {
        let mut c = ctx();
        c.log_signatures.push(log("upstream connect error: 503 from payments", Severity::Error));
        let cause = DependencyFailure.detect(&c).unwrap().unwrap();
        assert!((cause.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_dependency_trace_needs_error() {
        let mut c = ctx();
        c.log_signatures.push(log("upstream connect error", Severity::Error));
        c.trace_outliers.push(trace("http.client GET /payments", None));
        let cause = DependencyFailure.detect(&c).unwrap().unwrap();
        assert!((cause.confidence - 0.7).abs() < 1e-9);

        c.trace_outliers.push(trace("charge", Some("context deadline: timed out")));
        let cause = DependencyFailure.detect(&c).unwrap().unwrap();
        assert!((cause.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_resource_exhaustion() {
        let mut c = ctx();
        c.log_signatures.push(log("java.lang.OutOfMemoryError: Java heap space", Severity::Critical));
        c.system_events.push(event("oom_kill", "container killed"));
        let cause = ResourceExhaustion.detect(&c).unwrap().unwrap();
        assert!((cause.confidence - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_configuration_error() {
        let mut c = ctx();
        c.log_signatures.push(log("missing required environment variable DB_URL", Severity::Error));
        let cause = ConfigurationError.detect(&c).unwrap().unwrap();
        assert!((cause.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_empty_context_emits_nothing() {
        let c = ctx();
        for d in default_detectors() {
            assert!(d.detect(&c).unwrap().is_none(), "{:?} emitted on empty context", d.category());
        }
    }

    #[test]
    fn test_emitted_confidence_in_bounds() {
        let mut c = ctx();
        c.deployment_events.push(deploy(1));
        c.metrics_anomalies.push(metric("http_request_duration_seconds"));
        c.metrics_anomalies.push(metric("db_query_latency"));
        c.metrics_anomalies.push(metric("container_memory_usage"));
        c.log_signatures.push(log("sql deadlock", Severity::Error));
        c.log_signatures.push(log("out of memory", Severity::Critical));
        c.log_signatures.push(log("upstream 503", Severity::Error));
        c.log_signatures.push(log("invalid value in config", Severity::Error));
        c.system_events.push(event("node_pressure", "oom eviction"));
        c.trace_outliers.push(trace("db.query", Some("timeout")));

        let detectors = default_detectors();
        let order: Vec<CauseCategory> = detectors.iter().map(|d| d.category()).collect();
        assert_eq!(order, CauseCategory::ALL.to_vec());
        for d in detectors {
            if let Some(cause) = d.detect(&c).unwrap() {
                assert!(cause.confidence > EMISSION_FLOOR);
                assert!(cause.confidence <= MAX_CONFIDENCE);
                assert_eq!(cause.category, d.category());
            }
        }
    }
}
