//! User-facing prompts and diagnostics.
//!
//! Everything here goes to an error-style stream, never to stdout, so the
//! assertion printed by a caller stays machine-readable.

use std::io::{self, BufRead, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::device::DeviceHandle;
use crate::error::{DeviceError, KeytapError};

/// Sink for everything the user needs to see during a race.
pub trait Feedback: Send + Sync {
    /// No authenticator is attached.
    fn no_device_found(&self);

    /// Ask the user to insert a device and block until they confirm.
    fn insert_device(&self) -> io::Result<()>;

    /// A device is waiting for a touch. Called at most once per device.
    fn touch_device(&self, device: &DeviceHandle);

    fn device_ineligible(&self, device: &DeviceHandle);

    fn device_failed(&self, device: &DeviceHandle, error: &DeviceError);

    /// The race ended without any device producing an assertion.
    fn timed_out(&self);

    /// The operation failed for a reason no other message covers: bad
    /// input, an unreadable prompt, a failed enumeration or a crashed worker.
    fn aborted(&self, error: &KeytapError);
}

/// Text feedback over a writer and a line-oriented input.
pub struct ConsoleFeedback<W, R> {
    output: Mutex<W>,
    input: Mutex<R>,
}

impl ConsoleFeedback<io::Stderr, io::BufReader<io::Stdin>> {
    /// Write to stderr, read confirmations from stdin.
    pub fn stderr() -> Self {
        Self::new(io::stderr(), io::BufReader::new(io::stdin()))
    }
}

impl<W: Write + Send, R: BufRead + Send> ConsoleFeedback<W, R> {
    pub fn new(output: W, input: R) -> Self {
        Self {
            output: Mutex::new(output),
            input: Mutex::new(input),
        }
    }

    fn say(&self, message: &str) {
        let mut output = lock(&self.output);
        // Diagnostics are best effort; a closed stderr must not abort the race.
        let _ = writeln!(output, "{message}");
        let _ = output.flush();
    }
}

impl<R> ConsoleFeedback<Vec<u8>, R> {
    /// Everything written so far.
    pub fn captured(&self) -> String {
        String::from_utf8_lossy(&lock(&self.output)).into_owned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<W: Write + Send, R: BufRead + Send> Feedback for ConsoleFeedback<W, R> {
    fn no_device_found(&self) {
        self.say("No FIDO device found");
    }

    fn insert_device(&self) -> io::Result<()> {
        {
            let mut output = lock(&self.output);
            write!(output, "Please insert your security key and press enter...")?;
            output.flush()?;
        }

        // End of input counts as confirmation: the retry happens either way.
        let mut line = String::new();
        lock(&self.input).read_line(&mut line)?;
        Ok(())
    }

    fn touch_device(&self, _device: &DeviceHandle) {
        self.say("\nTouch your authenticator device now...\n");
    }

    fn device_ineligible(&self, device: &DeviceHandle) {
        self.say(&format!("Security key {device} is ineligible"));
    }

    fn device_failed(&self, device: &DeviceHandle, error: &DeviceError) {
        self.say(&format!("Security key {device} failed: {error}"));
    }

    fn timed_out(&self) {
        self.say("Operation timed out or no valid Security Key found !");
    }

    fn aborted(&self, error: &KeytapError) {
        match std::error::Error::source(error) {
            Some(source) => self.say(&format!("{error}: {source}")),
            None => self.say(&error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn console(input: &str) -> ConsoleFeedback<Vec<u8>, Cursor<Vec<u8>>> {
        ConsoleFeedback::new(Vec::new(), Cursor::new(input.as_bytes().to_vec()))
    }

    #[test]
    fn test_insert_device_consumes_one_line() {
        let feedback = console("\nleftover\n");
        feedback.insert_device().unwrap();

        assert!(feedback.captured().contains("press enter"));
        let mut rest = String::new();
        lock(&feedback.input).read_line(&mut rest).unwrap();
        assert_eq!(rest, "leftover\n");
    }

    #[test]
    fn test_insert_device_accepts_end_of_input() {
        let feedback = console("");
        assert!(feedback.insert_device().is_ok());
    }

    #[test]
    fn test_diagnostics_name_the_device() {
        let feedback = console("");
        let device = DeviceHandle::new("/dev/hidraw1").with_product("Solo");

        feedback.device_ineligible(&device);
        feedback.device_failed(&device, &DeviceError::Transport("pipe".into()));

        let text = feedback.captured();
        assert!(text.contains("Security key Solo (/dev/hidraw1) is ineligible"));
        assert!(text.contains("failed: Transport error: pipe"));
    }

    #[test]
    fn test_aborted_includes_cause() {
        let feedback = console("");
        let cause = crate::encoding::decode("%%").unwrap_err();

        feedback.aborted(&KeytapError::InvalidCredentialId(cause));
        feedback.aborted(&KeytapError::WorkerPanicked {
            device: "/dev/hidraw3".into(),
        });

        let text = feedback.captured();
        assert!(text.contains("Invalid credential id: Invalid"));
        assert!(text.contains("Worker thread for /dev/hidraw3 panicked"));
    }
}
