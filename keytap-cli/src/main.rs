//! Keytap CLI - first-touch WebAuthn assertions across security keys.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use utils::DeviceSpec;

#[derive(Parser)]
#[command(name = "keytap")]
#[command(author, version, about = "First-touch WebAuthn assertions across security keys", long_about = None)]
#[command(after_help = "Exit codes:
  0   Success
  1   General error
  64  Invalid command line
  65  Invalid input (base URL or credential id)
  69  No security key found
  75  Timed out or no valid security key found
  76  Security key transport or protocol failure

Set KEYTAP_LOG (e.g. KEYTAP_LOG=debug) for diagnostic logs on stderr.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Race every security key for an assertion and print the first one touched
    Assert {
        /// Base URL of the identity provider (relying party)
        #[arg(long, value_name = "URL")]
        url: String,

        /// Challenge issued by the identity provider
        #[arg(long)]
        challenge: String,

        /// Allowed credential id, base64url encoded
        #[arg(long, value_name = "B64URL")]
        credential_id: String,

        /// Simulated security key: touch:<ms>, untouched, ineligible or fail:<message>
        #[arg(long = "device", value_name = "SPEC")]
        devices: Vec<DeviceSpec>,

        /// Output format for the assertion
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },

    /// List the security keys that would take part in a race
    Devices {
        /// Simulated security key: touch:<ms>, untouched, ineligible or fail:<message>
        #[arg(long = "device", value_name = "SPEC")]
        devices: Vec<DeviceSpec>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("KEYTAP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Help and version requests are not failures
            return if err.use_stderr() {
                std::process::ExitCode::from(exit_codes::USAGE_ERROR)
            } else {
                std::process::ExitCode::SUCCESS
            };
        }
    };
    init_tracing();

    let result: Result<()> = match cli.command {
        Commands::Assert {
            url,
            challenge,
            credential_id,
            devices,
            format,
        } => commands::assert::execute(url, challenge, credential_id, devices, format).await,
        Commands::Devices { devices } => commands::devices::execute(devices),
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            let exit = exit_codes::ExitCode::from_anyhow(&err);
            if let Some(message) = &exit.message {
                eprintln!("{} {}", "Error:".red().bold(), message);
            }
            std::process::ExitCode::from(exit.code)
        }
    }
}
