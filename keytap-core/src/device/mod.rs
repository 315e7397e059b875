//! Authenticator backends.
//!
//! The CTAP exchange and device transport live behind
//! [`AuthenticatorBackend`]. The race logic only needs two operations from
//! it: list the attached devices, and run one blocking assertion against one
//! of them while honouring a shared [`CancelSignal`].
//!
//! ## Backends
//!
//! - [`MockBackend`] - Simulated authenticators (testing and demos)

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBackend, MockBackendConfig, MockDevice, Touch};

use serde::{Deserialize, Serialize};

use crate::context::ChallengeContext;
use crate::encoding;
use crate::error::DeviceError;
use crate::signal::CancelSignal;

/// Opaque reference to one attached authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    /// Backend-specific device path (e.g. a hidraw node).
    pub path: String,
    /// Human-readable product name, when the backend knows it.
    pub product: Option<String>,
}

impl DeviceHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            product: None,
        }
    }

    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }
}

impl std::fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.product {
            Some(product) => write!(f, "{product} ({})", self.path),
            None => write!(f, "{}", self.path),
        }
    }
}

/// Progress reported by a device while it waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveStatus {
    Processing,
    /// The device is waiting for a physical touch.
    UserPresenceNeeded,
}

/// A signed assertion produced by an authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    #[serde(with = "encoding::base64url")]
    pub credential_id: Vec<u8>,
    #[serde(with = "encoding::base64url")]
    pub authenticator_data: Vec<u8>,
    #[serde(with = "encoding::base64url")]
    pub signature: Vec<u8>,
    #[serde(
        with = "encoding::base64url_option",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub user_handle: Option<Vec<u8>>,
}

/// Raw answer of a backend to one `get_assertion` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionResponse {
    pub client_data: Vec<u8>,
    pub assertions: Vec<Assertion>,
}

impl AssertionResponse {
    /// Keep the first assertion, as a relying party expects exactly one.
    pub fn into_result(self) -> Result<AssertionResult, DeviceError> {
        let assertion = self
            .assertions
            .into_iter()
            .next()
            .ok_or_else(|| DeviceError::Protocol("device returned no assertions".into()))?;

        Ok(AssertionResult {
            client_data: self.client_data,
            assertion,
        })
    }
}

/// The winning (client data, assertion) pair of a race.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    #[serde(with = "encoding::base64url")]
    pub client_data: Vec<u8>,
    pub assertion: Assertion,
}

/// Device communication layer.
///
/// Implementations must be thread-safe (`Send + Sync`): one backend is
/// shared by every worker of a race.
pub trait AuthenticatorBackend: Send + Sync {
    /// List the attached authenticators. An empty list is not an error.
    fn enumerate(&self) -> Result<Vec<DeviceHandle>, DeviceError>;

    /// Ask `device` for an assertion over `context`.
    ///
    /// Blocks until the device answers or fails. `cancel` is the call's
    /// timeout input: once it is set the call must return
    /// [`DeviceError::Timeout`] promptly. `on_keepalive` is invoked with
    /// progress updates while the device waits.
    fn get_assertion(
        &self,
        device: &DeviceHandle,
        context: &ChallengeContext,
        cancel: &CancelSignal,
        on_keepalive: &mut dyn FnMut(KeepaliveStatus),
    ) -> Result<AssertionResponse, DeviceError>;
}
