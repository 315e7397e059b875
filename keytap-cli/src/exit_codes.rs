//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts to tell a missing key from an untouched one.

use keytap_core::KeytapError;

/// General error (catch-all).
pub const GENERAL_ERROR: u8 = 1;

/// Unknown subcommand, missing flag or malformed device spec.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: u8 = 64;

/// Malformed base URL or credential id.
/// Maps to EX_DATAERR from sysexits.h.
pub const INPUT_ERROR: u8 = 65;

/// No security key attached, even after the insertion prompt.
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NO_DEVICE: u8 = 69;

/// No key was touched in time, or none holds the credential.
/// Maps to EX_TEMPFAIL from sysexits.h.
pub const TIMED_OUT: u8 = 75;

/// A key failed at the transport or protocol level.
/// Maps to EX_PROTOCOL from sysexits.h.
pub const DEVICE_ERROR: u8 = 76;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: u8,
    pub message: Option<String>,
}

impl ExitCode {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        // Classify by the first keytap error in the chain
        let code = match err.chain().find_map(|e| e.downcast_ref::<KeytapError>()) {
            Some(KeytapError::InvalidCredentialId(_) | KeytapError::InvalidBaseUrl(_)) => {
                INPUT_ERROR
            }
            Some(KeytapError::NoDeviceFound) => NO_DEVICE,
            Some(KeytapError::DeviceTimeout) => TIMED_OUT,
            Some(KeytapError::Device(_)) => DEVICE_ERROR,
            Some(KeytapError::Prompt(_) | KeytapError::WorkerPanicked { .. }) | None => {
                GENERAL_ERROR
            }
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use keytap_core::DeviceError;

    fn code_for(err: KeytapError) -> u8 {
        let result: anyhow::Result<()> = Err(err).context("Assertion failed");
        ExitCode::from_anyhow(&result.unwrap_err()).code
    }

    #[test]
    fn test_classifies_through_context() {
        assert_eq!(code_for(KeytapError::NoDeviceFound), NO_DEVICE);
        assert_eq!(code_for(KeytapError::DeviceTimeout), TIMED_OUT);
        assert_eq!(
            code_for(KeytapError::Device(DeviceError::Protocol("bad cbor".into()))),
            DEVICE_ERROR
        );
        assert_eq!(
            code_for(KeytapError::InvalidBaseUrl("nope".into())),
            INPUT_ERROR
        );
    }

    #[test]
    fn test_unrelated_error_is_general() {
        let err = anyhow::anyhow!("something else");
        let exit = ExitCode::from_anyhow(&err);
        assert_eq!(exit.code, GENERAL_ERROR);
        assert_eq!(exit.message.as_deref(), Some("something else"));
    }

    #[test]
    fn test_message_includes_context_chain() {
        let result: anyhow::Result<()> = Err(KeytapError::DeviceTimeout).context("Assertion failed");
        let exit = ExitCode::from_anyhow(&result.unwrap_err());
        assert_eq!(
            exit.message.as_deref(),
            Some("Assertion failed: Operation timed out or no valid security key found")
        );
    }
}
