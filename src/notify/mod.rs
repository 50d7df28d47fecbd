//! Notification fan-out to the configured channels.
//!
//! Every routed channel is sent concurrently. A channel failure is recorded
//! in its own outcome and never affects the other channels or the analysis.

pub mod format;
pub mod webhook;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;
use crate::insight::BusinessImpact;

pub use format::build_notification;
pub use webhook::WebhookNotifier;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("channel rejected notification with status {0}")]
    Status(u16),

    #[error("configuration error: {0}")]
    Config(String),
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub metadata: BTreeMap<String, String>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    fn channel_name(&self) -> &str;
}

/// Delivery result for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

struct Route {
    min_impact: BusinessImpact,
    notifier: Arc<dyn Notifier>,
}

/// Routes a notification to every channel whose impact floor is met.
#[derive(Default)]
pub struct Dispatcher {
    routes: Vec<Route>,
}

impl Dispatcher {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a channel that fires for every impact tier at or above `min_impact`.
    ///
    /// Outcomes are keyed by channel name, so a second channel with the same
    /// name is rejected.
    pub fn with_channel(
        mut self,
        min_impact: BusinessImpact,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self, NotifyError> {
        let name = notifier.channel_name();
        if self.routes.iter().any(|r| r.notifier.channel_name() == name) {
            return Err(NotifyError::Config(format!(
                "duplicate notification channel name: {}",
                name
            )));
        }
        self.routes.push(Route {
            min_impact,
            notifier: Arc::from(notifier),
        });
        Ok(self)
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Self, NotifyError> {
        let mut dispatcher = Self::empty();
        for channel in &config.channels {
            dispatcher = dispatcher.with_channel(
                channel.min_impact,
                Box::new(WebhookNotifier::from_config(channel)?),
            )?;
        }
        Ok(dispatcher)
    }

    pub fn channel_count(&self) -> usize {
        self.routes.len()
    }

    /// Send to all routed channels at once and wait for every result. Each
    /// send runs as its own task; an error or a panic only marks that
    /// channel as failed.
    pub async fn dispatch(
        &self,
        notification: &Notification,
        impact: BusinessImpact,
    ) -> BTreeMap<String, ChannelOutcome> {
        let notification = Arc::new(notification.clone());
        let sends = self
            .routes
            .iter()
            .filter(|route| {
                let routed = impact >= route.min_impact;
                if !routed {
                    debug!(
                        channel = route.notifier.channel_name(),
                        min_impact = %route.min_impact,
                        impact = %impact,
                        "Channel skipped by impact routing"
                    );
                }
                routed
            })
            .map(|route| {
                let notifier = Arc::clone(&route.notifier);
                let notification = Arc::clone(&notification);
                let name = notifier.channel_name().to_string();
                async move {
                    let started = Instant::now();
                    let task =
                        tokio::spawn(async move { notifier.send(&notification).await });
                    let result = task.await;
                    let duration_ms = started.elapsed().as_millis() as u64;
                    let error = match result {
                        Ok(Ok(())) => {
                            info!(channel = %name, duration_ms, "Notification delivered");
                            None
                        }
                        Ok(Err(e)) => {
                            warn!(channel = %name, error = %e, "Notification delivery failed");
                            Some(e.to_string())
                        }
                        Err(e) => {
                            warn!(channel = %name, error = %e, "Notification task aborted");
                            Some(format!("notification task aborted: {}", e))
                        }
                    };
                    let outcome = ChannelOutcome {
                        success: error.is_none(),
                        error,
                        duration_ms,
                    };
                    (name, outcome)
                }
            });

        join_all(sends).await.into_iter().collect()
    }
}
