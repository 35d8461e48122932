//! nt-sync - Generate thread drafts from recently edited notes
//!
//! Unix-style tool: reads the vault, writes drafts to stdout, logs to stderr.

use clap::Parser;
use libnotethread::error::ApiError;
use libnotethread::logging::{LogFormat, LoggingConfig};
use libnotethread::service::events::{Event, EventReceiver};
use libnotethread::{Draft, NotethreadError, NotethreadService, Result, SyncOutcome};

#[derive(Parser, Debug)]
#[command(name = "nt-sync")]
#[command(version)]
#[command(about = "Generate thread drafts from recently edited notes")]
#[command(long_about = "\
nt-sync - Generate thread drafts from recently edited notes

DESCRIPTION:
    nt-sync looks for markdown notes in your vault that were modified within
    the sync window, asks the completion API for a thread per note, strips
    hashtags and stores the result as the new draft cache.

    Notes are processed one at a time. A note that fails is reported on
    stderr and keeps its place in the cache as an empty draft, so draft
    N always belongs to note N.

USAGE:
    # Sync using the stored window (default: 1 day)
    nt-sync

    # Look back one week and remember that window for later syncs
    nt-sync --days 7

    # Machine-readable output
    nt-sync --format json | jq '.[0]'

CONFIGURATION:
    Configuration file: ~/.config/notethread/config.toml

    [settings]
    completion_api_key = \"sk-...\"   # direct mode
    license_key = \"...\"             # proxied mode (wins over the key)

    [vault]
    path = \"~/Notes\"

    Override with environment variables:
        NOTETHREAD_CONFIG      - Path to config file
        NOTETHREAD_LOG_FORMAT  - text, json or pretty
        NOTETHREAD_LOG_LEVEL   - error, warn, info, debug, trace

EXIT CODES:
    0 - Success (including: no notes modified)
    1 - Every note failed, or storage failed
    2 - No completion key or license key configured
    3 - Invalid input (bad window or format)
")]
struct Cli {
    /// Sync window in days (stored for later syncs)
    #[arg(short, long, value_name = "DAYS")]
    days: Option<u32>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Log format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.format != "text" && cli.format != "json" {
        return Err(NotethreadError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            cli.format
        )));
    }

    let service = NotethreadService::new()?;
    let progress = tokio::spawn(report_progress(service.subscribe()));

    let outcome = service.sync(cli.days).await;

    // Dropping the service closes the event channel and ends the progress task
    drop(service);
    let _ = progress.await;

    match outcome? {
        SyncOutcome::NothingModified { window_days } => {
            eprintln!(
                "No notes modified in the last {} day(s); drafts unchanged",
                window_days
            );
            Ok(())
        }
        SyncOutcome::Generated { report, .. } => {
            for failure in &report.failures {
                eprintln!(
                    "Warning: generation failed for {}: {}",
                    failure.path.display(),
                    failure.message
                );
            }

            if cli.format == "json" {
                output_json(&report.drafts)?;
            } else {
                output_text(&report.drafts);
            }

            if report.has_failures() && report.failures.len() == report.drafts.len() {
                return Err(ApiError::Upstream(format!(
                    "all {} note(s) failed to generate",
                    report.failures.len()
                ))
                .into());
            }
            Ok(())
        }
    }
}

async fn report_progress(mut receiver: EventReceiver) {
    while let Ok(event) = receiver.recv().await {
        match event {
            Event::SyncStarted { window_days, notes } => {
                tracing::info!("Syncing {} note(s) from the last {} day(s)", notes, window_days);
            }
            Event::NoteProcessed { path, fragments } => {
                tracing::info!("{}: {} post(s)", path.display(), fragments);
            }
            Event::NoteFailed { path, error } => {
                tracing::warn!("{}: {}", path.display(), error);
            }
            Event::SyncCompleted { drafts, failures } => {
                tracing::info!("Sync finished: {} draft(s), {} failure(s)", drafts, failures);
            }
            _ => {}
        }
    }
}

fn output_json(drafts: &[Draft]) -> Result<()> {
    let json = serde_json::to_string_pretty(drafts)
        .map_err(|e| NotethreadError::InvalidInput(format!("Failed to encode drafts: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn output_text(drafts: &[Draft]) {
    for (index, draft) in drafts.iter().enumerate() {
        println!("[{}] {} post(s)", index, draft.len());
        for (n, fragment) in draft.fragments.iter().enumerate() {
            println!("  {}. {}", n + 1, fragment);
        }
        println!();
    }
}
