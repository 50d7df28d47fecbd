//! Chronological incident timeline.

use std::collections::BTreeMap;

use serde_json::json;

use super::TimelineEntry;
use crate::telemetry::{IncidentContext, LogSignature, MetricAnomaly, Severity};

/// Merge deployments, system events, the first anomaly per
/// (metric, severity) and the first error-level occurrence per log pattern,
/// ordered by time.
pub fn build(ctx: &IncidentContext) -> Vec<TimelineEntry> {
    let mut entries = Vec::new();

    for d in &ctx.deployment_events {
        let severity = match d.status {
            crate::telemetry::DeploymentStatus::Success => Severity::Info,
            _ => Severity::Warning,
        };
        entries.push(TimelineEntry {
            timestamp: d.timestamp,
            event_type: "deployment".to_string(),
            description: format!(
                "Deployment {} of version {} by {}",
                d.deployment_id, d.version, d.author
            ),
            severity,
            details: BTreeMap::from([
                ("commit_hash".to_string(), json!(d.commit_hash)),
                ("status".to_string(), json!(d.status)),
                ("services".to_string(), json!(d.services)),
                ("change_request_id".to_string(), json!(d.change_request_id)),
            ]),
        });
    }

    for e in &ctx.system_events {
        let mut details = BTreeMap::from([(
            "affected_components".to_string(),
            json!(e.affected_components),
        )]);
        details.extend(e.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        entries.push(TimelineEntry {
            timestamp: e.timestamp,
            event_type: e.event_type.clone(),
            description: e.description.clone(),
            severity: e.severity,
            details,
        });
    }

    let mut first_anomaly: BTreeMap<(&str, Severity), &MetricAnomaly> = BTreeMap::new();
    for m in &ctx.metrics_anomalies {
        first_anomaly
            .entry((m.metric_name.as_str(), m.severity))
            .and_modify(|seen| {
                if m.timestamp < seen.timestamp {
                    *seen = m;
                }
            })
            .or_insert(m);
    }
    for m in first_anomaly.into_values() {
        entries.push(TimelineEntry {
            timestamp: m.timestamp,
            event_type: "metric_anomaly".to_string(),
            description: format!(
                "{} reached {:.2} (threshold {:.2})",
                m.metric_name, m.value, m.threshold
            ),
            severity: m.severity,
            details: BTreeMap::from([
                ("metric".to_string(), json!(m.metric_name)),
                ("value".to_string(), json!(m.value)),
                ("threshold".to_string(), json!(m.threshold)),
                ("labels".to_string(), json!(m.labels)),
            ]),
        });
    }

    let mut first_log: BTreeMap<&str, &LogSignature> = BTreeMap::new();
    for l in ctx.log_signatures.iter().filter(|l| l.severity.is_error_or_worse()) {
        first_log
            .entry(l.pattern.as_str())
            .and_modify(|seen| {
                if l.first_seen < seen.first_seen {
                    *seen = l;
                }
            })
            .or_insert(l);
    }
    for l in first_log.into_values() {
        entries.push(TimelineEntry {
            timestamp: l.first_seen,
            event_type: "log_pattern".to_string(),
            description: format!("First occurrence of \"{}\" in {}", l.pattern, l.service),
            severity: l.severity,
            details: BTreeMap::from([
                ("count".to_string(), json!(l.count)),
                ("service".to_string(), json!(l.service)),
                ("last_seen".to_string(), json!(l.last_seen)),
            ]),
        });
    }

    entries.sort_by_key(|e| e.timestamp);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{DeploymentEvent, DeploymentStatus, SystemEvent};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t(min: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::minutes(min)
    }

    fn anomaly(name: &str, severity: Severity, min: i64) -> MetricAnomaly {
        MetricAnomaly {
            metric_name: name.to_string(),
            value: 1.0,
            threshold: 0.5,
            severity,
            timestamp: t(min),
            labels: Default::default(),
            description: String::new(),
        }
    }

    fn sig(pattern: &str, severity: Severity, min: i64) -> LogSignature {
        LogSignature {
            pattern: pattern.to_string(),
            count: 3,
            first_seen: t(min),
            last_seen: t(min + 5),
            severity,
            service: "api".to_string(),
            log_level: "ERROR".to_string(),
            sample_messages: vec![],
        }
    }

    #[test]
    fn test_timeline_dedup_and_order() {
        let mut ctx = IncidentContext::empty("INC-TL", t(30), 30);
        ctx.metrics_anomalies = vec![
            anomaly("latency", Severity::Critical, 20),
            anomaly("latency", Severity::Critical, 12),
            anomaly("latency", Severity::Warning, 15),
        ];
        ctx.log_signatures = vec![
            sig("timeout", Severity::Error, 18),
            sig("timeout", Severity::Critical, 14),
            sig("retrying", Severity::Warning, 1),
        ];
        ctx.deployment_events.push(DeploymentEvent {
            deployment_id: "d".to_string(),
            version: "v2".to_string(),
            commit_hash: "c".to_string(),
            author: "a".to_string(),
            timestamp: t(10),
            status: DeploymentStatus::Success,
            services: vec![],
            change_request_id: None,
        });
        ctx.system_events.push(SystemEvent {
            event_type: "autoscale".to_string(),
            timestamp: t(25),
            description: "scaled to 6 replicas".to_string(),
            severity: Severity::Info,
            affected_components: vec![],
            metadata: Default::default(),
        });

        let timeline = build(&ctx);
        let kinds: Vec<(&str, i64)> = timeline
            .iter()
            .map(|e| (e.event_type.as_str(), (e.timestamp - t(0)).num_minutes()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("deployment", 10),
                ("metric_anomaly", 12),
                ("log_pattern", 14),
                ("metric_anomaly", 15),
                ("autoscale", 25),
            ]
        );
    }

    #[test]
    fn test_empty_context_empty_timeline() {
        assert!(build(&IncidentContext::empty("INC", t(0), 30)).is_empty());
    }
}
