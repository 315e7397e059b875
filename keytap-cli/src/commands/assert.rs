//! Assert command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use keytap_core::{
    encoding, AssertionCoordinator, AssertionResult, ChallengeContext, ConsoleFeedback,
    MockBackend,
};
use tracing::{debug, info};

use crate::utils::{hex_prefix, DeviceSpec};
use crate::OutputFormat;

/// Execute the assert command.
pub async fn execute(
    url: String,
    challenge: String,
    credential_id: String,
    devices: Vec<DeviceSpec>,
    format: OutputFormat,
) -> Result<()> {
    // Reject malformed input before any device is touched
    let context = ChallengeContext::new(&url, challenge.into_bytes(), &credential_id)
        .context("Invalid assertion request")?;

    let credential = context
        .allow_list
        .first()
        .map(|c| c.id.clone())
        .unwrap_or_default();
    let backend = MockBackend::new(
        devices
            .into_iter()
            .enumerate()
            .map(|(index, spec)| spec.into_device(index, &credential))
            .collect(),
    );
    info!("Using simulated security keys");
    eprintln!("{}", "Using simulated security keys".yellow());

    info!(rp_id = %context.relying_party.id, "Starting assertion race");
    let coordinator =
        AssertionCoordinator::new(Arc::new(backend), Arc::new(ConsoleFeedback::stderr()));

    // The race blocks on device threads and on the enter key
    let result = tokio::task::spawn_blocking(move || coordinator.verify(&context))
        .await
        .context("Assertion task failed")?
        .context("Assertion failed")?;

    debug!(
        client_data_len = result.client_data.len(),
        "Assertion obtained"
    );
    print_result(&result, format)
}

fn print_result(result: &AssertionResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(result)
                .context("Failed to serialize assertion to JSON")?;
            println!("{json}");
        }
        OutputFormat::Text => {
            let assertion = &result.assertion;
            println!();
            println!("{}", "Assertion obtained".green().bold());
            println!();
            println!(
                "   {} {}",
                "Credential:".dimmed(),
                encoding::encode(&assertion.credential_id)
            );
            println!(
                "   {} {} bytes",
                "Client data:".dimmed(),
                result.client_data.len()
            );
            println!(
                "   {} {}",
                "Auth data:".dimmed(),
                hex_prefix(&assertion.authenticator_data, 16)
            );
            println!(
                "   {} {}",
                "Signature:".dimmed(),
                hex_prefix(&assertion.signature, 16)
            );
            if let Some(user_handle) = &assertion.user_handle {
                println!(
                    "   {} {}",
                    "User handle:".dimmed(),
                    encoding::encode(user_handle)
                );
            }
        }
    }
    Ok(())
}
