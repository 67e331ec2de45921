//! fwaudit - firewall rulebase anomaly auditor
//!
//! Reads a JSON rulebase bundle exported from the rule store, classifies
//! every rule into the 18 audit categories and prints or stores the report.
//!
//! # Usage
//!
//! ```bash
//! fwaudit analyze edge-1.json                 # Category listing
//! fwaudit analyze edge-1.json --format json   # Category name -> rule ids
//! fwaudit analyze edge-1.json --save          # Also store a report snapshot
//! fwaudit rules edge-1.json                   # Per-rule report
//! fwaudit summary edge-1.json core.json       # Counts across firewalls
//! fwaudit history 1                           # Stored snapshots, newest first
//! fwaudit show <snapshot-id>                  # Re-render a stored snapshot
//! fwaudit log -n 50                           # Recent audit log entries
//! ```

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use fwaudit::audit::{self, AuditLog, EventType};
use fwaudit::config::{self, AuditConfig, ReportFormat};
use fwaudit::core::bundle::{RulebaseBundle, load_bundle};
use fwaudit::core::classifier::RuleClassifier;
use fwaudit::core::report::{FirewallReport, ReportSnapshot, Summary, render_classification};
use fwaudit::core::snapshots::SnapshotStore;
use fwaudit::validators::parse_snapshot_id;
use fwaudit::{Error, Result};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

shadow_rs::shadow!(build);

#[derive(Parser)]
#[command(name = "fwaudit")]
#[command(about = "Firewall rulebase anomaly auditor", long_about = None)]
#[command(version, long_version = build::CLAP_LONG_VERSION)]
struct Cli {
    /// Log debug details of the analysis
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one firewall's rulebase and print the category sets
    Analyze {
        /// Rulebase bundle (JSON)
        bundle: PathBuf,
        /// Output format (defaults to the configured format)
        #[arg(short, long, value_enum)]
        format: Option<ReportFormat>,
        /// Store a report snapshot of this run
        #[arg(short, long)]
        save: bool,
        /// Evaluate expiration against this instant instead of now (RFC 3339)
        #[arg(long, value_name = "RFC3339")]
        at: Option<DateTime<Utc>>,
    },
    /// Print every rule with the categories it falls in
    Rules {
        bundle: PathBuf,
        #[arg(short, long, value_enum)]
        format: Option<ReportFormat>,
    },
    /// Print category counts across several firewalls
    Summary {
        #[arg(required = true)]
        bundles: Vec<PathBuf>,
        #[arg(short, long, value_enum)]
        format: Option<ReportFormat>,
    },
    /// List stored report snapshots of a firewall, newest first
    History {
        firewall_id: i64,
    },
    /// Print a stored report snapshot
    Show {
        snapshot_id: String,
        #[arg(short, long, value_enum)]
        format: Option<ReportFormat>,
    },
    /// Print recent audit log entries, newest first
    Log {
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,
    },
}

fn main() -> ExitCode {
    let _ = fwaudit::utils::ensure_dirs();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = runtime.block_on(config::load_config());
    init_logging(&config, cli.verbose);

    match runtime.block_on(handle_cli(cli.command, &config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let translation = e.translate();
            eprintln!("Error: {}", translation.user_message);
            for suggestion in &translation.suggestions {
                eprintln!("  - {suggestion}");
            }
            tracing::debug!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &AuditConfig, verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };

    if config.log_to_file
        && let Some(mut log_path) = fwaudit::utils::get_state_dir()
    {
        log_path.push("fwaudit.log");
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
        {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

async fn handle_cli(command: Commands, config: &AuditConfig) -> Result<()> {
    match command {
        Commands::Analyze {
            bundle,
            format,
            save,
            at,
        } => {
            let format = format.unwrap_or(config.default_format);
            let bundle = load_bundle(&bundle).await?;
            let now = at.unwrap_or_else(Utc::now);

            let result = analyze_logged(&bundle, now).await?;
            match format {
                ReportFormat::Text => print!("{}", render_classification(&bundle.firewall, &result)),
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
            }

            if save || config.save_snapshots {
                let snapshot = ReportSnapshot::capture(&bundle.firewall, &bundle.rules, result, now);
                save_snapshot(&snapshot, config.retention()).await?;
                eprintln!("Saved report snapshot {}", snapshot.id);
            }
        }
        Commands::Rules { bundle, format } => {
            let format = format.unwrap_or(config.default_format);
            let bundle = load_bundle(&bundle).await?;
            let result = analyze_logged(&bundle, Utc::now()).await?;
            let report = FirewallReport::from_rules(&bundle.firewall, &bundle.rules, &result);
            match format {
                ReportFormat::Text => print!("{}", report.render_text()),
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
        Commands::Summary { bundles, format } => {
            let format = format.unwrap_or(config.default_format);
            let summary = summarize(&bundles).await;
            audit::record(
                EventType::SummarizeRulebases,
                summary.is_ok(),
                serde_json::json!({ "bundle_count": bundles.len() }),
                summary.as_ref().err().map(ToString::to_string),
            )
            .await;
            let summary = summary?;
            match format {
                ReportFormat::Text => print!("{}", summary.render_text()),
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            }
        }
        Commands::History { firewall_id } => {
            let store = SnapshotStore::open_default()?;
            let history = store.history(firewall_id).await?;
            if history.is_empty() {
                println!("No report snapshots for firewall {firewall_id}");
            }
            for entry in history {
                println!(
                    "{}  {}",
                    entry.captured_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    entry.id
                );
            }
        }
        Commands::Show {
            snapshot_id,
            format,
        } => {
            let format = format.unwrap_or(config.default_format);
            let id = parse_snapshot_id(&snapshot_id).map_err(|message| Error::Validation {
                field: "snapshot_id".to_string(),
                message,
            })?;
            let store = SnapshotStore::open_default()?;
            let loaded = store.load(id).await;
            audit::record(
                EventType::ShowSnapshot,
                loaded.is_ok(),
                serde_json::json!({ "snapshot_id": id }),
                loaded.as_ref().err().map(ToString::to_string),
            )
            .await;
            let snapshot = loaded?;
            match format {
                ReportFormat::Text => {
                    println!(
                        "Snapshot {} captured {}",
                        snapshot.id,
                        snapshot.captured_at.format("%Y-%m-%d %H:%M:%S UTC")
                    );
                    print!("{}", snapshot.individual().render_text());
                }
                ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
            }
        }
        Commands::Log { count } => {
            let events = AuditLog::new()?.read_recent(count).await?;
            if events.is_empty() {
                println!("Audit log is empty");
            }
            for event in events {
                println!("{}", event.summary_line());
            }
        }
    }
    Ok(())
}

/// Runs the classifier and records the outcome in the audit log
async fn analyze_logged(
    bundle: &RulebaseBundle,
    now: DateTime<Utc>,
) -> Result<fwaudit::ClassificationResult> {
    let outcome = bundle
        .analysis_input()
        .and_then(|input| RuleClassifier::new().analyze(&input, now));

    audit::log_analyze(
        bundle.firewall.id,
        bundle.rules.len(),
        outcome.as_ref().map_or(0, |r| r.flagged_rules().len()),
        outcome.as_ref().err().map(ToString::to_string),
    )
    .await;

    outcome
}

async fn summarize(paths: &[PathBuf]) -> Result<Summary> {
    let mut summary = Summary::new();
    for path in paths {
        let bundle = load_bundle(path).await.map_err(|e| with_path(path, e))?;
        let result = analyze_logged(&bundle, Utc::now()).await?;
        summary.add(&bundle.firewall, bundle.rules.len(), &result);
    }
    Ok(summary)
}

fn with_path(path: &Path, err: Error) -> Error {
    match err {
        Error::Io(e) => Error::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        )),
        other => other,
    }
}

async fn save_snapshot(snapshot: &ReportSnapshot, retention: usize) -> Result<()> {
    let store = SnapshotStore::open_default()?;
    let saved = store.save(snapshot).await;
    let pruned = match &saved {
        Ok(_) => store.prune(snapshot.firewall_id, retention).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to prune old snapshots: {e}");
            0
        }),
        Err(_) => 0,
    };

    audit::log_save_snapshot(
        snapshot.firewall_id,
        snapshot.id,
        pruned,
        saved.as_ref().err().map(ToString::to_string),
    )
    .await;

    saved.map(|_| ())
}
