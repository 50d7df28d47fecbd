//! TOML configuration for incidentmedic.
//!
//! Every component gets its own section with compiled-in defaults, so an
//! empty file (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::insight::BusinessImpact;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "INCIDENTMEDIC_CONFIG";

const SYSTEM_CONFIG_PATH: &str = "/etc/incidentmedic/incidentmedic.toml";

/// Widest accepted collection window on each side of the alert (one week).
pub const MAX_WINDOW_MINUTES: i64 = 7 * 24 * 60;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config
            .analysis
            .validate()
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Try, in order: `$INCIDENTMEDIC_CONFIG`, the system path, then defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "INCIDENTMEDIC_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Minutes on each side of the alert time to collect telemetry for.
    pub analysis_window_minutes: i64,
    /// Root causes at or below this confidence are dropped.
    pub confidence_threshold: f64,
    /// Optional bound on a whole pipeline run. Unbounded when absent.
    pub deadline_secs: Option<u64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analysis_window_minutes: 30,
            confidence_threshold: 0.3,
            deadline_secs: None,
        }
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_WINDOW_MINUTES).contains(&self.analysis_window_minutes) {
            anyhow::bail!(
                "analysis_window_minutes must be between 1 and {}, got {}",
                MAX_WINDOW_MINUTES,
                self.analysis_window_minutes
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Collector
// ---------------------------------------------------------------------------

/// Where one telemetry kind comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Http { url: String },
    File { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Per-adapter fetch timeout.
    pub source_timeout_secs: u64,
    pub metrics: Option<SourceConfig>,
    pub traces: Option<SourceConfig>,
    pub logs: Option<SourceConfig>,
    pub deployments: Option<SourceConfig>,
    pub events: Option<SourceConfig>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: 30,
            metrics: None,
            traces: None,
            logs: None,
            deployments: None,
            events: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportsConfig {
    /// Directory postmortems are written to.
    pub reports_dir: PathBuf,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            reports_dir: PathBuf::from("reports"),
        }
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Webhook,
    Slack,
    Pagerduty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub kind: ChannelKind,
    pub url: String,
    /// PagerDuty integration key.
    #[serde(default)]
    pub routing_key: Option<String>,
    /// Only notify when the business impact reaches this tier.
    #[serde(default = "default_min_impact")]
    pub min_impact: BusinessImpact,
    #[serde(default = "default_channel_timeout")]
    pub timeout_secs: u64,
}

fn default_min_impact() -> BusinessImpact {
    BusinessImpact::Low
}

fn default_channel_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub channels: Vec<ChannelConfig>,
}

// ---------------------------------------------------------------------------
// Storage & logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file for analysis history. History is off when unset.
    pub history_db: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
