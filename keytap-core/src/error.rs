use thiserror::Error;

/// Failures reported by an authenticator backend for one device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device was not touched before its timeout or the cancel signal fired.
    #[error("Device operation timed out")]
    Timeout,

    /// The device holds none of the credentials in the allow-list.
    #[error("Device does not hold a requested credential")]
    Ineligible,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

#[derive(Error, Debug)]
pub enum KeytapError {
    #[error("No FIDO device found")]
    NoDeviceFound,

    #[error("Operation timed out or no valid security key found")]
    DeviceTimeout,

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error("Invalid credential id")]
    InvalidCredentialId(#[from] base64::DecodeError),

    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Failed to read confirmation")]
    Prompt(#[source] std::io::Error),

    #[error("Worker thread for {device} panicked")]
    WorkerPanicked { device: String },
}

pub type Result<T> = std::result::Result<T, KeytapError>;
