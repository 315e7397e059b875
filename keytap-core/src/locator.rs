//! Finding the authenticators to race.

use tracing::{debug, info, warn};

use crate::device::{AuthenticatorBackend, DeviceHandle};
use crate::error::{KeytapError, Result};
use crate::feedback::Feedback;

pub struct DeviceLocator<'a> {
    backend: &'a dyn AuthenticatorBackend,
    feedback: &'a dyn Feedback,
}

impl<'a> DeviceLocator<'a> {
    pub fn new(backend: &'a dyn AuthenticatorBackend, feedback: &'a dyn Feedback) -> Self {
        Self { backend, feedback }
    }

    /// Enumerate attached devices. An empty list means none are attached.
    pub fn locate(&self) -> Result<Vec<DeviceHandle>> {
        match self.backend.enumerate() {
            Ok(devices) => {
                debug!(count = devices.len(), "Located devices");
                Ok(devices)
            }
            Err(err) => {
                warn!(error = %err, "Enumeration failed");
                let err = KeytapError::Device(err);
                self.feedback.aborted(&err);
                Err(err)
            }
        }
    }

    /// Locate devices, giving the user one chance to insert a key.
    ///
    /// When nothing is attached the user is prompted once and devices are
    /// enumerated a second time; an empty second result is
    /// [`KeytapError::NoDeviceFound`].
    pub fn locate_or_prompt(&self) -> Result<Vec<DeviceHandle>> {
        let devices = self.locate()?;
        if !devices.is_empty() {
            return Ok(devices);
        }

        self.feedback.no_device_found();
        info!("No device attached, prompting for insertion");
        if let Err(err) = self.feedback.insert_device() {
            let err = KeytapError::Prompt(err);
            self.feedback.aborted(&err);
            return Err(err);
        }

        let devices = self.locate()?;
        if devices.is_empty() {
            warn!("Still no device attached after prompt");
            self.feedback.no_device_found();
            return Err(KeytapError::NoDeviceFound);
        }
        Ok(devices)
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::device::{MockBackend, MockDevice};
    use crate::feedback::ConsoleFeedback;
    use std::io::{self, Cursor, Read};

    fn console() -> ConsoleFeedback<Vec<u8>, Cursor<Vec<u8>>> {
        ConsoleFeedback::new(Vec::new(), Cursor::new(b"\n".to_vec()))
    }

    #[test]
    fn test_attached_devices_skip_prompt() {
        let backend = MockBackend::new(vec![MockDevice::new("/dev/a"), MockDevice::new("/dev/b")]);
        let feedback = console();

        let devices = DeviceLocator::new(&backend, &feedback)
            .locate_or_prompt()
            .unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].path, "/dev/a");
        assert_eq!(backend.enumerate_calls(), 1);
        assert!(feedback.captured().is_empty());
    }

    #[test]
    fn test_device_inserted_after_prompt() {
        let backend = MockBackend::with_enumerations(vec![vec![], vec![MockDevice::new("/dev/a")]]);
        let feedback = console();

        let devices = DeviceLocator::new(&backend, &feedback)
            .locate_or_prompt()
            .unwrap();

        assert_eq!(devices.len(), 1);
        assert_eq!(backend.enumerate_calls(), 2);
        let text = feedback.captured();
        assert_eq!(text.matches("press enter").count(), 1);
        assert_eq!(text.matches("No FIDO device found").count(), 1);
    }

    #[test]
    fn test_no_device_after_single_retry() {
        let backend = MockBackend::new(Vec::new());
        let feedback = console();

        let err = DeviceLocator::new(&backend, &feedback)
            .locate_or_prompt()
            .unwrap_err();

        assert!(matches!(err, KeytapError::NoDeviceFound));
        assert_eq!(backend.enumerate_calls(), 2);
        assert_eq!(feedback.captured().matches("press enter").count(), 1);
    }

    struct ClosedInput;

    impl Read for ClosedInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("stdin closed"))
        }
    }

    #[test]
    fn test_unreadable_prompt_is_reported() {
        let backend = MockBackend::new(Vec::new());
        let feedback = ConsoleFeedback::new(Vec::new(), io::BufReader::new(ClosedInput));

        let err = DeviceLocator::new(&backend, &feedback)
            .locate_or_prompt()
            .unwrap_err();

        assert!(matches!(err, KeytapError::Prompt(_)));
        assert_eq!(backend.enumerate_calls(), 1);
        assert!(feedback
            .captured()
            .contains("Failed to read confirmation: stdin closed"));
    }
}
