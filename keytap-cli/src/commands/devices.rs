//! Devices command implementation.

use std::io::Cursor;

use anyhow::{Context, Result};
use colored::Colorize;
use keytap_core::{ConsoleFeedback, DeviceLocator, MockBackend};
use tracing::info;

use crate::utils::DeviceSpec;

/// Execute the devices command.
///
/// Enumerates once, without the insertion prompt.
pub fn execute(devices: Vec<DeviceSpec>) -> Result<()> {
    let backend = MockBackend::new(
        devices
            .into_iter()
            .enumerate()
            .map(|(index, spec)| spec.into_device(index, &[]))
            .collect(),
    );
    let feedback = ConsoleFeedback::new(std::io::stderr(), Cursor::new(Vec::new()));

    let located = DeviceLocator::new(&backend, &feedback)
        .locate()
        .context("Failed to enumerate security keys")?;
    info!(count = located.len(), "Listed devices");

    if located.is_empty() {
        eprintln!("{}", "No FIDO device found".yellow());
        return Ok(());
    }

    for device in located {
        println!("{}", device);
    }
    Ok(())
}
