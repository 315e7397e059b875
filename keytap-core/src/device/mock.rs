//! Simulated authenticators for testing.
//! WARNING: Assertions from this backend carry placeholder signatures!

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument, trace};

use super::{Assertion, AssertionResponse, AuthenticatorBackend, DeviceHandle, KeepaliveStatus};
use crate::context::ChallengeContext;
use crate::encoding;
use crate::error::DeviceError;
use crate::signal::CancelSignal;

/// Default time a simulated device waits for a touch.
const DEFAULT_DEVICE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default interval between keepalive updates.
const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(100);

/// User present flag of the authenticator data.
const FLAG_USER_PRESENT: u8 = 0x01;

/// Configuration for the simulated backend.
#[derive(Debug, Clone)]
pub struct MockBackendConfig {
    /// How long a device waits for a touch before reporting a timeout.
    pub device_timeout: Duration,
    /// How often a waiting device reports `UserPresenceNeeded`.
    pub keepalive_interval: Duration,
}

impl Default for MockBackendConfig {
    /// Reads `KEYTAP_DEVICE_TIMEOUT_MS` and `KEYTAP_KEEPALIVE_MS`, falling
    /// back to 30s and 100ms.
    fn default() -> Self {
        Self {
            device_timeout: env_millis("KEYTAP_DEVICE_TIMEOUT_MS")
                .unwrap_or(DEFAULT_DEVICE_TIMEOUT),
            keepalive_interval: env_millis("KEYTAP_KEEPALIVE_MS")
                .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL),
        }
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}

/// When, if ever, the user touches a simulated device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Touch {
    After(Duration),
    Never,
    /// The device fails with a transport error instead of waiting.
    Fail(String),
}

/// One simulated authenticator.
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub handle: DeviceHandle,
    /// Credential ids stored on the device.
    pub credentials: Vec<Vec<u8>>,
    pub touch: Touch,
    pub user_handle: Option<Vec<u8>>,
}

impl MockDevice {
    /// A device holding no credentials that is never touched.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            handle: DeviceHandle::new(path).with_product("Keytap Mock Authenticator"),
            credentials: Vec::new(),
            touch: Touch::Never,
            user_handle: None,
        }
    }

    pub fn holding(mut self, credential_id: impl Into<Vec<u8>>) -> Self {
        self.credentials.push(credential_id.into());
        self
    }

    pub fn touched_after(mut self, delay: Duration) -> Self {
        self.touch = Touch::After(delay);
        self
    }

    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.touch = Touch::Fail(message.into());
        self
    }

    pub fn with_user_handle(mut self, user_handle: impl Into<Vec<u8>>) -> Self {
        self.user_handle = Some(user_handle.into());
        self
    }
}

/// Client data in the shape a browser would collect it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectedClientData {
    #[serde(rename = "type")]
    kind: &'static str,
    challenge: String,
    origin: String,
    cross_origin: bool,
}

/// In-memory authenticator backend.
///
/// Each call to [`enumerate`](AuthenticatorBackend::enumerate) returns the
/// next configured device list; the last list repeats forever.
pub struct MockBackend {
    config: MockBackendConfig,
    enumerations: Mutex<VecDeque<Vec<MockDevice>>>,
    attached: Mutex<HashMap<String, MockDevice>>,
    enumerate_calls: AtomicUsize,
    assertion_calls: AtomicUsize,
    sign_count: AtomicU32,
}

impl MockBackend {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self::with_enumerations(vec![devices])
    }

    /// Return `enumerations` in order from successive enumerations.
    pub fn with_enumerations(enumerations: Vec<Vec<MockDevice>>) -> Self {
        Self {
            config: MockBackendConfig::default(),
            enumerations: Mutex::new(enumerations.into()),
            attached: Mutex::new(HashMap::new()),
            enumerate_calls: AtomicUsize::new(0),
            assertion_calls: AtomicUsize::new(0),
            sign_count: AtomicU32::new(0),
        }
    }

    pub fn with_config(mut self, config: MockBackendConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of times the devices were enumerated.
    pub fn enumerate_calls(&self) -> usize {
        self.enumerate_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_assertion` calls made against any device.
    pub fn assertion_calls(&self) -> usize {
        self.assertion_calls.load(Ordering::SeqCst)
    }

    fn respond(
        &self,
        device: &MockDevice,
        credential_id: Vec<u8>,
        context: &ChallengeContext,
    ) -> Result<AssertionResponse, DeviceError> {
        let client_data = serde_json::to_vec(&CollectedClientData {
            kind: "webauthn.get",
            challenge: encoding::encode(&context.challenge),
            origin: context.origin.origin().ascii_serialization(),
            cross_origin: false,
        })
        .map_err(|e| DeviceError::Protocol(format!("Failed to encode client data: {e}")))?;

        let counter = self.sign_count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut authenticator_data = Sha256::digest(context.relying_party.id.as_bytes()).to_vec();
        authenticator_data.push(FLAG_USER_PRESENT);
        authenticator_data.extend_from_slice(&counter.to_be_bytes());

        // Placeholder: a digest over what a real authenticator would sign.
        let mut hasher = Sha256::new();
        hasher.update(&authenticator_data);
        hasher.update(Sha256::digest(&client_data));
        let signature = hasher.finalize().to_vec();

        Ok(AssertionResponse {
            client_data,
            assertions: vec![Assertion {
                credential_id,
                authenticator_data,
                signature,
                user_handle: device.user_handle.clone(),
            }],
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AuthenticatorBackend for MockBackend {
    fn enumerate(&self) -> Result<Vec<DeviceHandle>, DeviceError> {
        self.enumerate_calls.fetch_add(1, Ordering::SeqCst);

        let devices = {
            let mut queue = lock(&self.enumerations);
            if queue.len() > 1 {
                queue.pop_front().unwrap_or_default()
            } else {
                queue.front().cloned().unwrap_or_default()
            }
        };

        let mut attached = lock(&self.attached);
        attached.clear();
        attached.extend(devices.iter().map(|d| (d.handle.path.clone(), d.clone())));

        debug!(count = devices.len(), "Enumerated mock devices");
        Ok(devices.into_iter().map(|d| d.handle).collect())
    }

    #[instrument(level = "debug", skip_all, fields(device = %device.path))]
    fn get_assertion(
        &self,
        device: &DeviceHandle,
        context: &ChallengeContext,
        cancel: &CancelSignal,
        on_keepalive: &mut dyn FnMut(KeepaliveStatus),
    ) -> Result<AssertionResponse, DeviceError> {
        self.assertion_calls.fetch_add(1, Ordering::SeqCst);

        let device = lock(&self.attached)
            .get(&device.path)
            .cloned()
            .ok_or_else(|| DeviceError::Transport(format!("{} is not attached", device.path)))?;

        let touch_after = match &device.touch {
            Touch::Fail(message) => return Err(DeviceError::Transport(message.clone())),
            Touch::After(delay) => Some(*delay),
            Touch::Never => None,
        };

        let credential_id = device
            .credentials
            .iter()
            .find(|id| context.allows(id))
            .cloned()
            .ok_or(DeviceError::Ineligible)?;

        // Durations past the end of the clock mean "never".
        let started = Instant::now();
        let deadline = started.checked_add(self.config.device_timeout);
        let touched_at = touch_after.and_then(|delay| started.checked_add(delay));

        loop {
            if cancel.is_set() {
                trace!("Cancelled while waiting for touch");
                return Err(DeviceError::Timeout);
            }

            let now = Instant::now();
            if touched_at.is_some_and(|at| now >= at) {
                break;
            }
            if deadline.is_some_and(|at| now >= at) {
                return Err(DeviceError::Timeout);
            }

            on_keepalive(KeepaliveStatus::UserPresenceNeeded);

            let wake = match (touched_at, deadline) {
                (Some(touch), Some(deadline)) => Some(touch.min(deadline)),
                (touch, deadline) => touch.or(deadline),
            };
            let pause = wake.map_or(self.config.keepalive_interval, |at| {
                at.saturating_duration_since(now)
                    .min(self.config.keepalive_interval)
            });
            if cancel.wait_timeout(pause) {
                trace!("Cancelled while waiting for touch");
                return Err(DeviceError::Timeout);
            }
        }

        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Device touched");
        self.respond(&device, credential_id, context)
    }
}
