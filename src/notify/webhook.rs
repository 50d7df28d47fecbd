//! HTTP channel: generic JSON webhook, Slack incoming webhook or
//! PagerDuty Events v2.

use std::time::Duration;

use serde_json::{json, Value};

use super::{Notification, Notifier, NotifyError};
use crate::config::{ChannelConfig, ChannelKind};

#[derive(Debug)]
pub struct WebhookNotifier {
    name: String,
    kind: ChannelKind,
    url: String,
    routing_key: Option<String>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn from_config(config: &ChannelConfig) -> Result<Self, NotifyError> {
        if config.url.trim().is_empty() {
            return Err(NotifyError::Config(format!("channel {} has no url", config.name)));
        }
        if config.kind == ChannelKind::Pagerduty && config.routing_key.is_none() {
            return Err(NotifyError::Config(format!(
                "pagerduty channel {} requires routing_key",
                config.name
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            name: config.name.clone(),
            kind: config.kind,
            url: config.url.clone(),
            routing_key: config.routing_key.clone(),
            client,
        })
    }

    /// Request body in the shape the channel kind expects.
    pub fn payload(&self, notification: &Notification) -> Value {
        match self.kind {
            ChannelKind::Webhook => json!({
                "subject": notification.subject,
                "body": notification.body,
                "metadata": notification.metadata,
            }),
            ChannelKind::Slack => json!({
                "text": format!("*{}*\n{}", notification.subject, notification.body),
            }),
            ChannelKind::Pagerduty => {
                let severity = match notification.metadata.get("business_impact").map(String::as_str) {
                    Some("critical") => "critical",
                    Some("high") => "error",
                    Some("medium") => "warning",
                    _ => "info",
                };
                json!({
                    "routing_key": self.routing_key,
                    "event_action": "trigger",
                    "dedup_key": notification.metadata.get("incident_id"),
                    "payload": {
                        "summary": notification.subject,
                        "source": "incidentmedic",
                        "severity": severity,
                        "custom_details": {
                            "body": notification.body,
                            "metadata": notification.metadata,
                        },
                    },
                })
            }
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&self.payload(notification))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }

    fn channel_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::BusinessImpact;
    use std::collections::BTreeMap;

    fn config(kind: ChannelKind, routing_key: Option<&str>) -> ChannelConfig {
        ChannelConfig {
            name: "chan".to_string(),
            kind,
            url: "http://127.0.0.1:9/hook".to_string(),
            routing_key: routing_key.map(str::to_string),
            min_impact: BusinessImpact::Low,
            timeout_secs: 2,
        }
    }

    fn note() -> Notification {
        Notification {
            subject: "[HIGH] INC-1".to_string(),
            body: "db down".to_string(),
            metadata: BTreeMap::from([
                ("incident_id".to_string(), "INC-1".to_string()),
                ("business_impact".to_string(), "high".to_string()),
            ]),
        }
    }

    #[test]
    fn test_pagerduty_requires_routing_key() {
        let err = WebhookNotifier::from_config(&config(ChannelKind::Pagerduty, None)).unwrap_err();
        assert!(matches!(err, NotifyError::Config(_)));
    }

    #[test]
    fn test_slack_payload_is_text() {
        let n = WebhookNotifier::from_config(&config(ChannelKind::Slack, None)).unwrap();
        let body = n.payload(&note());
        assert_eq!(body["text"], "*[HIGH] INC-1*\ndb down");
        assert_eq!(body.as_object().unwrap().len(), 1);
    }

    #[test]
    fn test_pagerduty_payload_is_trigger_event() {
        let n = WebhookNotifier::from_config(&config(ChannelKind::Pagerduty, Some("key"))).unwrap();
        let body = n.payload(&note());
        assert_eq!(body["event_action"], "trigger");
        assert_eq!(body["routing_key"], "key");
        assert_eq!(body["dedup_key"], "INC-1");
        assert_eq!(body["payload"]["severity"], "error");
    }

    #[test]
    fn test_generic_payload_carries_metadata() {
        let n = WebhookNotifier::from_config(&config(ChannelKind::Webhook, None)).unwrap();
        let body = n.payload(&note());
        assert_eq!(body["metadata"]["incident_id"], "INC-1");
        assert_eq!(n.channel_name(), "chan");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_http_error() {
        let n = WebhookNotifier::from_config(&config(ChannelKind::Webhook, None)).unwrap();
        let err = n.send(&note()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Http(_)));
    }
}
