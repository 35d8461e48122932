//! nt-connect - Connect notethread to a social account
//!
//! Drives the PIN-based connection flow brokered by the backend.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use libnotethread::logging::LoggingConfig;
use libnotethread::{ConnectionState, NotethreadError, NotethreadService};
use std::io::BufRead;

#[derive(Parser, Debug)]
#[command(name = "nt-connect")]
#[command(version)]
#[command(about = "Connect notethread to your social account")]
#[command(long_about = "\
nt-connect - Connect notethread to your social account

DESCRIPTION:
    Scheduling needs posting credentials. The backend holds the app keys and
    brokers a PIN-based login:

      1. `nt-connect begin` prints a login link
      2. open it, authorize the app and copy the PIN
      3. `nt-connect verify <PIN>` stores the permanent credentials

    A failed verification keeps the pending login, so you can retry with
    another PIN. Running `begin` again starts over.

COMMANDS:
    begin       Request a login link
    verify      Exchange a PIN for credentials
    status      Show the connection state
    disconnect  Forget all stored credentials

CONFIGURATION:
    Configuration file: ~/.config/notethread/config.toml

    [settings]
    license_key = \"...\"           # or both of:
    social_api_key = \"...\"
    social_api_secret = \"...\"

EXIT CODES:
    0 - Success
    1 - Backend or storage failure
    2 - Missing credentials or PIN verification failed
    3 - Invalid input
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Request a login link and start waiting for a PIN
    Begin,

    /// Exchange the PIN shown after login for permanent credentials
    Verify {
        /// PIN from the login page (read from stdin when omitted)
        pin: Option<String>,
    },

    /// Show the connection state
    Status {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Forget stored connection credentials
    Disconnect,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    LoggingConfig::from_env(cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<NotethreadError>()
            .map(NotethreadError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let service = NotethreadService::new()?;
    let settings = service.config().settings.clone();
    let flow = service.connection();

    match cli.command {
        Commands::Begin => {
            let link = flow.begin(&settings).await?;
            eprintln!("Open this link, authorize the app, then run `nt-connect verify <PIN>`:");
            println!("{}", link.url);
        }
        Commands::Verify { pin } => {
            let pin = match pin {
                Some(pin) => pin,
                None => read_pin().context("Failed to read PIN from stdin")?,
            };
            flow.verify_pin(&pin, &settings).await?;
            println!("connected");
        }
        Commands::Status { format } => {
            let state = flow.state()?;
            match format.as_str() {
                "text" => println!("{}", state),
                "json" => println!(
                    "{}",
                    serde_json::json!({
                        "state": state,
                        "can_schedule": state == ConnectionState::Connected,
                    })
                ),
                other => {
                    return Err(NotethreadError::InvalidInput(format!(
                        "Invalid format '{}'. Must be 'text' or 'json'",
                        other
                    ))
                    .into())
                }
            }
        }
        Commands::Disconnect => {
            flow.disconnect()?;
            println!("disconnected");
        }
    }

    Ok(())
}

fn read_pin() -> std::io::Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
