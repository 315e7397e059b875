//! Keytap Core - first-touch WebAuthn assertions across several security keys
//!
//! This crate fans one WebAuthn challenge out to every attached authenticator
//! at once and keeps the assertion of whichever device the user touches
//! first. The other devices are told to stop through a shared cancellation
//! signal rather than being interrupted.
//!
//! # Features
//!
//! - One OS thread per device, joined before any outcome is decided
//! - First-writer-wins result slot paired with a monotonic cancel signal
//! - Timeout and ineligible devices absorbed; transport failures fatal
//! - Single "insert your key and press enter" retry when nothing is attached
//! - Pluggable device backend, with a simulated one for tests
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use keytap_core::{AssertionCoordinator, ConsoleFeedback, MockBackend, MockDevice};
//!
//! # fn example() -> keytap_core::Result<()> {
//! let backend = MockBackend::new(vec![
//!     MockDevice::new("/dev/hidraw0").holding(vec![1, 2, 3]),
//!     MockDevice::new("/dev/hidraw1")
//!         .holding(vec![1, 2, 3])
//!         .touched_after(Duration::from_millis(100)),
//! ]);
//!
//! let coordinator =
//!     AssertionCoordinator::new(Arc::new(backend), Arc::new(ConsoleFeedback::stderr()));
//! let result = coordinator.verify_request("https://example.okta.com", "challenge", "AQID")?;
//! assert_eq!(result.assertion.credential_id, vec![1, 2, 3]);
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod coordinator;
pub mod device;
pub mod encoding;
pub mod error;
pub mod feedback;
pub mod locator;
pub mod signal;
pub mod slot;
pub mod worker;

// Re-export main types for convenience
pub use context::{ChallengeContext, CredentialDescriptor, CredentialType, RelyingParty};
pub use coordinator::AssertionCoordinator;
pub use device::{
    Assertion, AssertionResponse, AssertionResult, AuthenticatorBackend, DeviceHandle,
    KeepaliveStatus,
};
pub use error::{DeviceError, KeytapError, Result};
pub use feedback::{ConsoleFeedback, Feedback};
pub use locator::DeviceLocator;
pub use signal::CancelSignal;
pub use slot::ResultSlot;
pub use worker::{Race, Worker, WorkerOutcome};

#[cfg(feature = "mock")]
pub use device::{MockBackend, MockBackendConfig, MockDevice, Touch};
