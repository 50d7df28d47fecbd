use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use incidentmedic::config::AppConfig;
use incidentmedic::pipeline::{AnalysisRequest, PipelineResult};
use incidentmedic::storage::IncidentStore;
use incidentmedic::telemetry::AlertPayload;

#[derive(Parser)]
#[command(
    name = "incidentmedic",
    about = "Incident root-cause inference, remediation planning and postmortems",
    version,
    long_about = None
)]
struct Cli {
    /// Config file (defaults to $INCIDENTMEDIC_CONFIG, then /etc/incidentmedic/incidentmedic.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an alert and write its postmortem
    Analyze {
        /// Alertmanager-style JSON payload ("-" for stdin)
        #[arg(long)]
        alert: PathBuf,

        /// Incident ID (generated when omitted)
        #[arg(long)]
        incident_id: Option<String>,

        /// Free-text resolution notes for the postmortem
        #[arg(long)]
        resolution_notes: Option<String>,

        /// File with engineer notes to include in the postmortem
        #[arg(long)]
        engineer_notes: Option<PathBuf>,

        /// Override the configured reports directory
        #[arg(long)]
        reports_dir: Option<PathBuf>,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List recent analyses from the history database
    History {
        /// Number of entries to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Print the stored result of one incident as JSON
        #[arg(long)]
        incident: Option<String>,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_alert(path: &Path) -> Result<AlertPayload> {
    let raw = if path.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("failed to read alert from stdin")?
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read alert file: {}", path.display()))?
    };
    serde_json::from_str(&raw).context("alert payload is not valid JSON")
}

fn print_report(result: &PipelineResult) {
    println!("\n=== Incident Analysis: {} ===", result.incident_id);
    println!("Business impact: {}", result.insight.business_impact);
    println!("Users affected:  ~{}", result.insight.users_affected);
    println!("Confidence:      {:.0}%", result.insight.confidence_score * 100.0);
    println!("\n{}", result.insight.summary);

    println!("\nRoot causes:");
    if result.root_causes.is_empty() {
        println!(" - none identified");
    }
    for c in &result.root_causes {
        println!(" - {} ({:.0}%): {}", c.category.display_name(), c.confidence * 100.0, c.description);
    }

    println!("\n{:<10} | {:<50} | {:>8} | Auto", "Priority", "Action", "Minutes");
    println!("{:-<10}-|-{:-<50}-|-{:->8}-|-{:-<4}", "", "", "", "");
    for a in &result.remediation_actions {
        println!(
            "{:<10} | {:<50} | {:>8} | {}",
            a.priority.as_str(),
            a.title,
            a.duration_minutes,
            if a.automation_possible { "yes" } else { "no" }
        );
    }

    if !result.notifications.is_empty() {
        println!("\nNotifications:");
        for (channel, outcome) in &result.notifications {
            match &outcome.error {
                None => println!(" - {}: delivered in {} ms", channel, outcome.duration_ms),
                Some(e) => println!(" - {}: FAILED ({})", channel, e),
            }
        }
    }

    println!(
        "\nPostmortem: {} ({} sections)\n",
        result.postmortem.file_path.display(),
        result.postmortem.sections_count
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_or_default(),
    };
    init_tracing(&config.logging.level, cli.log_json || config.logging.json);

    match cli.command {
        Commands::Analyze {
            alert,
            incident_id,
            resolution_notes,
            engineer_notes,
            reports_dir,
            json,
        } => {
            if let Some(dir) = reports_dir {
                config.reports.reports_dir = dir;
            }
            let engineer_notes = engineer_notes
                .map(|p| {
                    std::fs::read_to_string(&p)
                        .with_context(|| format!("failed to read engineer notes: {}", p.display()))
                })
                .transpose()?;

            let request = AnalysisRequest {
                alert: read_alert(&alert)?,
                incident_id,
                resolution_notes,
                engineer_notes,
            };
            let result = incidentmedic::analyze(&config, request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_report(&result);
            }
        }
        Commands::History { limit, incident } => {
            let path = config
                .storage
                .history_db
                .as_deref()
                .context("no history database configured (set storage.history_db)")?;
            let store = IncidentStore::open(path)?;

            if let Some(id) = incident {
                match store.load(&id)? {
                    Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                    None => println!("No analysis recorded for {}.", id),
                }
                return Ok(());
            }

            let rows = store.list_recent(limit)?;
            if rows.is_empty() {
                println!("No analyses recorded.");
            } else {
                println!(
                    "{:<24} | {:<20} | {:<28} | {:<8} | Conf",
                    "Incident", "Analyzed", "Primary cause", "Impact"
                );
                println!("{:-<24}-|-{:-<20}-|-{:-<28}-|-{:-<8}-|-{:-<4}", "", "", "", "", "");
                for r in rows {
                    println!(
                        "{:<24} | {:<20} | {:<28} | {:<8} | {:.2}",
                        r.incident_id,
                        r.analyzed_at.format("%Y-%m-%d %H:%M:%S"),
                        r.primary_cause.as_deref().unwrap_or("unknown"),
                        r.business_impact,
                        r.confidence
                    );
                }
            }
        }
        Commands::ShowConfig => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
