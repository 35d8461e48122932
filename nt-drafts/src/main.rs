//! nt-drafts - Manage cached thread drafts
//!
//! Lists, prints, schedules and clears the drafts produced by nt-sync.

use chrono::Local;
use clap::{Parser, Subcommand};
use libnotethread::logging::LoggingConfig;
use libnotethread::{Draft, NotethreadError, NotethreadService, Result};

#[derive(Parser, Debug)]
#[command(name = "nt-drafts")]
#[command(version)]
#[command(about = "Manage cached thread drafts")]
#[command(long_about = "\
nt-drafts - Manage cached thread drafts

DESCRIPTION:
    nt-drafts works on the drafts stored by the last nt-sync run. Drafts are
    addressed by their position in the cache, starting at 0.

    Scheduling hands a draft to the backend at the next free slot: 08:00
    local time for the first one, then every 12 hours after the last
    scheduled draft. A scheduled draft is removed from the cache.

COMMANDS:
    list      List cached drafts
    show      Print one draft
    schedule  Schedule a draft through the backend
    clear     Delete every cached draft

USAGE EXAMPLES:
    # Overview of the cache
    nt-drafts list

    # Copy a draft as a single paragraph
    nt-drafts show 2 --joined | pbcopy

    # Schedule the first draft
    nt-drafts schedule 0

EXIT CODES:
    0 - Success
    1 - Backend or storage failure
    2 - Not connected (run nt-connect first)
    3 - Invalid input (unknown index, empty draft, bad format)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List cached drafts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print a single draft, one post per line
    Show {
        /// Draft index
        index: usize,

        /// Print all posts joined by single spaces
        #[arg(long)]
        joined: bool,
    },

    /// Schedule a draft at the next free slot
    Schedule {
        /// Draft index
        index: usize,
    },

    /// Delete every cached draft
    Clear,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let service = NotethreadService::new()?;
    tracing::debug!(
        "Using {} preference store",
        service.preferences().backend_name()
    );

    match cli.command {
        Commands::List { format } => cmd_list(&service, &format),
        Commands::Show { index, joined } => cmd_show(&service, index, joined),
        Commands::Schedule { index } => cmd_schedule(&service, index).await,
        Commands::Clear => {
            service.clear_drafts()?;
            println!("cleared");
            Ok(())
        }
    }
}

fn cmd_list(service: &NotethreadService, format: &str) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(NotethreadError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }

    let drafts = service.drafts()?;
    if format == "json" {
        let json = serde_json::to_string_pretty(&drafts)
            .map_err(|e| NotethreadError::InvalidInput(format!("Failed to encode drafts: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    for (index, draft) in drafts.iter().enumerate() {
        println!(
            "{} | {} post(s) | {}",
            index,
            draft.len(),
            preview(draft, 60)
        );
    }
    Ok(())
}

fn cmd_show(service: &NotethreadService, index: usize, joined: bool) -> Result<()> {
    let drafts = service.drafts()?;
    let draft = drafts.get(index).ok_or_else(|| {
        NotethreadError::InvalidInput(format!(
            "No draft at index {} ({} drafts cached)",
            index,
            drafts.len()
        ))
    })?;

    if joined {
        println!("{}", draft.joined());
    } else {
        for fragment in &draft.fragments {
            println!("{}", fragment);
        }
    }
    Ok(())
}

async fn cmd_schedule(service: &NotethreadService, index: usize) -> Result<()> {
    let scheduled = service.schedule(index).await?;
    println!(
        "Scheduled draft {} ({} post(s)) for {}",
        scheduled.index,
        scheduled.draft.len(),
        scheduled.slot.with_timezone(&Local).format("%Y-%m-%d %H:%M %Z")
    );
    if let Some(warning) = &scheduled.cache_warning {
        eprintln!(
            "Warning: draft {} is still cached ({}); clear it before scheduling again",
            scheduled.index, warning
        );
    }
    Ok(())
}

/// First fragment, cut to `max_chars` characters
fn preview(draft: &Draft, max_chars: usize) -> String {
    let first = draft.fragments.first().map(String::as_str).unwrap_or("(empty)");
    if first.chars().count() <= max_chars {
        first.to_string()
    } else {
        let cut: String = first.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
