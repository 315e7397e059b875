//! Common utility functions shared across CLI commands.

use std::str::FromStr;
use std::time::Duration;

use keytap_core::MockDevice;

/// A simulated security key as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSpec {
    /// Holds the credential and is touched after the delay.
    Touch(Duration),
    /// Holds the credential but is never touched.
    Untouched,
    /// Holds some other credential.
    Ineligible,
    /// Fails with a transport error.
    Fail(String),
}

impl FromStr for DeviceSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, arg) = match s.split_once(':') {
            Some((kind, arg)) => (kind, Some(arg)),
            None => (s, None),
        };

        match (kind.trim().to_lowercase().as_str(), arg) {
            ("touch", Some(ms)) => ms
                .trim()
                .parse()
                .map(|ms| Self::Touch(Duration::from_millis(ms)))
                .map_err(|_| format!("invalid touch delay '{ms}', expected milliseconds")),
            ("touch", None) => Ok(Self::Touch(Duration::ZERO)),
            ("untouched", None) => Ok(Self::Untouched),
            ("ineligible", None) => Ok(Self::Ineligible),
            ("fail", Some(message)) if !message.is_empty() => Ok(Self::Fail(message.to_string())),
            ("fail", _) => Ok(Self::Fail("simulated transport failure".to_string())),
            _ => Err(format!(
                "unknown device '{s}', expected touch:<ms>, untouched, ineligible or fail:<message>"
            )),
        }
    }
}

impl DeviceSpec {
    /// Build the simulated device at position `index`.
    ///
    /// `credential_id` is the credential requested by the relying party.
    pub fn into_device(self, index: usize, credential_id: &[u8]) -> MockDevice {
        let device = MockDevice::new(format!("/dev/keytap{index}"));
        match self {
            Self::Touch(delay) => device.holding(credential_id).touched_after(delay),
            Self::Untouched => device.holding(credential_id),
            Self::Ineligible => device
                .holding(ineligible_credential(credential_id))
                .touched_after(Duration::ZERO),
            Self::Fail(message) => device.failing(message),
        }
    }
}

/// A credential id guaranteed to differ from `credential_id`.
fn ineligible_credential(credential_id: &[u8]) -> Vec<u8> {
    let mut other = credential_id.to_vec();
    other.push(0xff);
    other
}

/// Shorten bytes to a hex prefix for display.
pub fn hex_prefix(bytes: &[u8], len: usize) -> String {
    let hex = hex::encode(&bytes[..bytes.len().min(len)]);
    if bytes.len() > len {
        format!("{hex}...")
    } else {
        hex
    }
}
