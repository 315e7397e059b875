//! Race coordinator: fan one challenge out to every device, keep the first touch.

use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info, instrument};

use crate::context::ChallengeContext;
use crate::device::{AssertionResult, AuthenticatorBackend};
use crate::error::{KeytapError, Result};
use crate::feedback::Feedback;
use crate::locator::DeviceLocator;
use crate::signal::CancelSignal;
use crate::slot::ResultSlot;
use crate::worker::{Race, Worker};

/// Obtains one assertion from whichever attached security key is touched first.
///
/// ## Example
///
/// ```no_run
/// use std::sync::Arc;
/// use keytap_core::{AssertionCoordinator, ConsoleFeedback, MockBackend};
///
/// # fn example() -> keytap_core::Result<()> {
/// let coordinator = AssertionCoordinator::new(
///     Arc::new(MockBackend::new(Vec::new())),
///     Arc::new(ConsoleFeedback::stderr()),
/// );
/// let result = coordinator.verify_request("https://example.okta.com", "challenge", "AQID")?;
/// println!("{} bytes of client data", result.client_data.len());
/// # Ok(())
/// # }
/// ```
pub struct AssertionCoordinator {
    backend: Arc<dyn AuthenticatorBackend>,
    feedback: Arc<dyn Feedback>,
}

impl AssertionCoordinator {
    pub fn new(backend: Arc<dyn AuthenticatorBackend>, feedback: Arc<dyn Feedback>) -> Self {
        Self { backend, feedback }
    }

    /// Build the challenge context from identity provider input, then race.
    ///
    /// Input errors surface before any device is enumerated.
    pub fn verify_request(
        &self,
        base_url: &str,
        challenge: impl Into<Vec<u8>>,
        credential_id: &str,
    ) -> Result<AssertionResult> {
        let context = match ChallengeContext::new(base_url, challenge, credential_id) {
            Ok(context) => context,
            Err(err) => {
                self.feedback.aborted(&err);
                return Err(err);
            }
        };
        self.verify(&context)
    }

    /// Race every attached device for an assertion over `context`.
    ///
    /// All workers are joined before the outcome is decided. A worker failure
    /// other than timeout or ineligibility stops the other devices and is
    /// returned as is (first failing device in enumeration order). Otherwise the cancel signal decides:
    /// unset means no device produced an assertion, which is
    /// [`KeytapError::DeviceTimeout`] even when every device was merely
    /// ineligible.
    #[instrument(level = "debug", skip_all, fields(rp_id = %context.relying_party.id))]
    pub fn verify(&self, context: &ChallengeContext) -> Result<AssertionResult> {
        let backend = &*self.backend;
        let feedback = &*self.feedback;

        let devices = DeviceLocator::new(backend, feedback).locate_or_prompt()?;
        info!(count = devices.len(), "Racing devices");

        let cancel = CancelSignal::new();
        let stop = CancelSignal::new();
        let slot = ResultSlot::new();
        let race = Race {
            backend,
            feedback,
            context,
            cancel: &cancel,
            stop: &stop,
            slot: &slot,
        };

        let finished = thread::scope(|scope| {
            let handles: Vec<_> = devices
                .into_iter()
                .map(|device| {
                    let path = device.path.clone();
                    let worker = Worker::new(device, &race);
                    (path, scope.spawn(move || worker.run()))
                })
                .collect();

            handles
                .into_iter()
                .map(|(path, handle)| (path, handle.join()))
                .collect::<Vec<_>>()
        });

        let mut failure = None;
        for (device, joined) in finished {
            match joined {
                Ok(Ok(outcome)) => debug!(%device, ?outcome, "Worker finished"),
                Ok(Err(err)) => {
                    failure.get_or_insert(err);
                }
                Err(_) => {
                    error!(%device, "Worker panicked");
                    stop.set();
                    let err = KeytapError::WorkerPanicked { device };
                    feedback.aborted(&err);
                    failure.get_or_insert(err);
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }

        if !cancel.is_set() {
            error!("No device produced an assertion");
            feedback.timed_out();
            return Err(KeytapError::DeviceTimeout);
        }

        // A set signal always has a recorded result behind it.
        let result = slot.into_inner().ok_or(KeytapError::DeviceTimeout)?;
        let credential_id = &result.assertion.credential_id;
        info!(
            credential = %hex::encode(&credential_id[..credential_id.len().min(8)]),
            "Race won"
        );
        Ok(result)
    }
}

impl std::fmt::Debug for AssertionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionCoordinator").finish_non_exhaustive()
    }
}
