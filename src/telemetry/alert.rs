//! Alertmanager-style alert payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    #[serde(default)]
    pub alerts: Vec<AlertEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertEntry {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(rename = "startsAt", default)]
    pub starts_at: Option<String>,
}

impl AlertEntry {
    pub fn alert_name(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }
}

impl AlertPayload {
    /// Start time of the first alert, if present and parseable.
    pub fn first_start(&self) -> Option<DateTime<Utc>> {
        let raw = self.alerts.first()?.starts_at.as_deref()?;
        match DateTime::parse_from_rfc3339(raw) {
            Ok(ts) => Some(ts.with_timezone(&Utc)),
            Err(e) => {
                warn!(starts_at = raw, error = %e, "Unparseable alert start time");
                None
            }
        }
    }

    /// Alert time used to anchor the analysis window; falls back to now.
    pub fn alert_time(&self) -> DateTime<Utc> {
        self.first_start().unwrap_or_else(Utc::now)
    }

    /// Services named by the `service` label of any alert.
    pub fn services(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .alerts
            .iter()
            .filter_map(|a| a.labels.get("service").cloned())
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alertmanager_payload() {
        let raw = r#"{
            "alerts": [{
                "status": "firing",
                "labels": {"alertname": "HighLatency", "service": "checkout", "severity": "critical"},
                "annotations": {"summary": "p99 latency above 2s"},
                "startsAt": "2024-03-01T12:30:00Z"
            }]
        }"#;
        let payload: AlertPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.alerts[0].alert_name(), Some("HighLatency"));
        assert_eq!(
            payload.alert_time().to_rfc3339(),
            "2024-03-01T12:30:00+00:00"
        );
        assert_eq!(payload.services(), vec!["checkout".to_string()]);
    }

    #[test]
    fn test_missing_start_falls_back_to_now() {
        let before = Utc::now();
        let payload = AlertPayload {
            alerts: vec![AlertEntry {
                starts_at: Some("not-a-date".to_string()),
                ..Default::default()
            }],
        };
        assert!(payload.first_start().is_none());
        assert!(payload.alert_time() >= before);
        assert!(AlertPayload::default().alert_time() >= before);
    }
}
