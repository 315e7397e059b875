//! One authentication attempt against one device.

use tracing::{debug, info, instrument, warn};

use crate::context::ChallengeContext;
use crate::device::{
    AssertionResponse, AssertionResult, AuthenticatorBackend, DeviceHandle, KeepaliveStatus,
};
use crate::error::{DeviceError, KeytapError, Result};
use crate::feedback::Feedback;
use crate::signal::CancelSignal;
use crate::slot::ResultSlot;

/// How a worker finished, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// This device's assertion is the race result.
    Won,
    /// The device answered, but another device had already won.
    Superseded,
    /// Not touched before the device timed out or the race was decided.
    TimedOut,
    /// The device holds none of the allowed credentials.
    Ineligible,
}

/// State shared by every worker of one race.
///
/// `cancel` is paired with `slot` and is only set by the worker that records
/// the result. `stop` is what backends wait on: it is set when the race is
/// won and also when a device fails fatally, so the remaining devices give up
/// without waiting for their own timeout.
pub struct Race<'a> {
    pub backend: &'a dyn AuthenticatorBackend,
    pub feedback: &'a dyn Feedback,
    pub context: &'a ChallengeContext,
    pub cancel: &'a CancelSignal,
    pub stop: &'a CancelSignal,
    pub slot: &'a ResultSlot<AssertionResult>,
}

pub struct Worker<'a> {
    device: DeviceHandle,
    race: &'a Race<'a>,
}

impl<'a> Worker<'a> {
    pub fn new(device: DeviceHandle, race: &'a Race<'a>) -> Self {
        Self { device, race }
    }

    /// Run the attempt to completion.
    ///
    /// Timeouts and ineligible devices are absorbed here; any other device
    /// failure stops the race and is returned unchanged as
    /// [`KeytapError::Device`].
    #[instrument(level = "debug", skip(self), fields(device = %self.device.path))]
    pub fn run(self) -> Result<WorkerOutcome> {
        let Race {
            backend,
            feedback,
            context,
            cancel,
            stop,
            slot,
        } = *self.race;
        let device = &self.device;

        let mut prompted = false;
        let mut on_keepalive = |status: KeepaliveStatus| {
            if status == KeepaliveStatus::UserPresenceNeeded && !prompted {
                prompted = true;
                feedback.touch_device(device);
            }
        };

        let response = backend
            .get_assertion(device, context, stop, &mut on_keepalive)
            .and_then(AssertionResponse::into_result);

        match response {
            Ok(result) => {
                if slot.claim(result, cancel) {
                    stop.set();
                    info!("Assertion obtained");
                    Ok(WorkerOutcome::Won)
                } else {
                    debug!("Assertion obtained after another device won");
                    Ok(WorkerOutcome::Superseded)
                }
            }
            Err(DeviceError::Timeout) => {
                debug!("Device timed out");
                Ok(WorkerOutcome::TimedOut)
            }
            Err(DeviceError::Ineligible) => {
                warn!("Device is ineligible");
                feedback.device_ineligible(device);
                Ok(WorkerOutcome::Ineligible)
            }
            Err(err) => {
                if stop.set() {
                    debug!("Stopping the remaining devices");
                }
                warn!(error = %err, "Device failed");
                feedback.device_failed(device, &err);
                Err(KeytapError::Device(err))
            }
        }
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::device::{MockBackend, MockBackendConfig, MockDevice};
    use crate::feedback::ConsoleFeedback;
    use std::io::Cursor;
    use std::time::Duration;

    struct Fixture {
        backend: MockBackend,
        feedback: ConsoleFeedback<Vec<u8>, Cursor<Vec<u8>>>,
        context: ChallengeContext,
        cancel: CancelSignal,
        stop: CancelSignal,
        slot: ResultSlot<AssertionResult>,
    }

    impl Fixture {
        fn new(device: MockDevice) -> Self {
            let backend = MockBackend::new(vec![device]).with_config(MockBackendConfig {
                device_timeout: Duration::from_millis(300),
                keepalive_interval: Duration::from_millis(5),
            });
            Self {
                backend,
                feedback: ConsoleFeedback::new(Vec::new(), Cursor::new(Vec::new())),
                context: ChallengeContext::new("https://example.okta.com", "nonce", "AQID")
                    .unwrap(),
                cancel: CancelSignal::new(),
                stop: CancelSignal::new(),
                slot: ResultSlot::new(),
            }
        }

        fn run(&self) -> Result<WorkerOutcome> {
            let device = self.backend.enumerate().unwrap().remove(0);
            let race = Race {
                backend: &self.backend,
                feedback: &self.feedback,
                context: &self.context,
                cancel: &self.cancel,
                stop: &self.stop,
                slot: &self.slot,
            };
            Worker::new(device, &race).run()
        }
    }

    #[test]
    fn test_touched_device_wins_and_sets_signal() {
        let fixture = Fixture::new(
            MockDevice::new("/dev/a")
                .holding(vec![1, 2, 3])
                .touched_after(Duration::from_millis(40)),
        );

        assert_eq!(fixture.run().unwrap(), WorkerOutcome::Won);
        assert!(fixture.cancel.is_set());
        assert!(fixture.stop.is_set());
        assert!(fixture.slot.is_filled());
    }

    #[test]
    fn test_touch_prompt_shown_once() {
        let fixture = Fixture::new(
            MockDevice::new("/dev/a")
                .holding(vec![1, 2, 3])
                .touched_after(Duration::from_millis(60)),
        );

        fixture.run().unwrap();
        let text = fixture.feedback.captured();
        assert_eq!(text.matches("Touch your authenticator").count(), 1);
    }

    #[test]
    fn test_answer_after_decided_race_is_superseded() {
        let fixture = Fixture::new(
            MockDevice::new("/dev/a")
                .holding(vec![1, 2, 3])
                .touched_after(Duration::ZERO),
        );
        let earlier = AssertionResult {
            client_data: b"earlier".to_vec(),
            assertion: crate::device::Assertion {
                credential_id: vec![1, 2, 3],
                authenticator_data: Vec::new(),
                signature: Vec::new(),
                user_handle: None,
            },
        };
        // Fill the slot without setting the signal so the device still answers.
        assert!(fixture.slot.claim(earlier, &CancelSignal::new()));

        assert_eq!(fixture.run().unwrap(), WorkerOutcome::Superseded);
        assert!(!fixture.cancel.is_set());
    }

    #[test]
    fn test_untouched_device_times_out_quietly() {
        let fixture = Fixture::new(MockDevice::new("/dev/a").holding(vec![1, 2, 3]));

        assert_eq!(fixture.run().unwrap(), WorkerOutcome::TimedOut);
        assert!(!fixture.cancel.is_set());
        assert!(!fixture.stop.is_set());
        assert!(!fixture.slot.is_filled());
    }

    #[test]
    fn test_stopped_race_ends_waiting_device() {
        let fixture = Fixture::new(MockDevice::new("/dev/a").holding(vec![1, 2, 3]));
        fixture.stop.set();

        assert_eq!(fixture.run().unwrap(), WorkerOutcome::TimedOut);
        assert!(!fixture.cancel.is_set(), "A stopped race has no result");
    }

    #[test]
    fn test_ineligible_device_logs_diagnostic() {
        let fixture = Fixture::new(
            MockDevice::new("/dev/a")
                .holding(vec![7])
                .touched_after(Duration::ZERO),
        );

        assert_eq!(fixture.run().unwrap(), WorkerOutcome::Ineligible);
        assert!(fixture.feedback.captured().contains("/dev/a) is ineligible"));
        assert!(!fixture.cancel.is_set());
    }

    #[test]
    fn test_transport_failure_is_fatal_and_unmodified() {
        let fixture = Fixture::new(MockDevice::new("/dev/a").failing("USB stall"));

        let err = fixture.run().unwrap_err();
        assert!(matches!(
            err,
            KeytapError::Device(DeviceError::Transport(ref msg)) if msg == "USB stall"
        ));
        assert!(!fixture.cancel.is_set());
        assert!(fixture.stop.is_set(), "A fatal failure should stop the other devices");
        assert!(fixture.feedback.captured().contains("failed: Transport error: USB stall"));
    }
}
