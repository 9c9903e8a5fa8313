//! Custom error types for the synchronization core.
//!
//! Two layers, mirroring how errors actually flow through the system:
//!
//! - [`DeviceError`] is the typed error returned by every Device Driver
//!   Interface call. It carries the device index it originated from and a
//!   [`DeviceErrorKind`] so callers can tell fatal failures (connect,
//!   configure, readiness query) from recoverable ones (fire, retrieve).
//! - [`SyncError`] is the session-level error surfaced by
//!   [`CaptureSession`](crate::session::CaptureSession) and by configuration
//!   loading.
//!
//! Severity is decided at the call site, not baked into the type: a worker
//! treats a connect error as fatal and a retrieve error as a logged,
//! recoverable cycle outcome, per the propagation policy in the worker loop.

use crate::driver::DeviceIndex;
use thiserror::Error;

// =============================================================================
// Device Errors
// =============================================================================

/// Which driver operation produced a [`DeviceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorKind {
    /// Opening the device failed.
    Connect,
    /// Trigger-mode configuration failed.
    Configure,
    /// The trigger-ready query failed.
    Readiness,
    /// Issuing the software trigger failed.
    Fire,
    /// Retrieving the last capture failed.
    Retrieve,
    /// Releasing the device failed.
    Disconnect,
}

impl std::fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DeviceErrorKind::Connect => "connect",
            DeviceErrorKind::Configure => "configure",
            DeviceErrorKind::Readiness => "readiness",
            DeviceErrorKind::Fire => "fire",
            DeviceErrorKind::Retrieve => "retrieve",
            DeviceErrorKind::Disconnect => "disconnect",
        };
        write!(f, "{}", label)
    }
}

/// Error from a single Device Driver Interface call.
#[derive(Error, Debug, Clone)]
#[error("camera {index} {kind} error: {message}")]
pub struct DeviceError {
    /// Device the error originated from.
    pub index: DeviceIndex,
    /// Failed operation.
    pub kind: DeviceErrorKind,
    /// Driver-reported detail.
    pub message: String,
}

impl DeviceError {
    /// Build a device error for `index` from `kind` and a driver message.
    pub fn new(index: DeviceIndex, kind: DeviceErrorKind, message: impl Into<String>) -> Self {
        Self {
            index,
            kind,
            message: message.into(),
        }
    }
}

// =============================================================================
// Session Errors
// =============================================================================

/// Convenience alias for results using the session error type.
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Primary error type for the capture session and its configuration.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Configuration file parsing failed.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration values parsed but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device bus enumeration failed; no session can be started.
    #[error("Device enumeration failed: {0}")]
    Enumeration(String),

    /// The bus enumerated zero cameras.
    #[error("No cameras found on the bus")]
    NoCamerasFound,

    /// `start()` was called on a session that is already running.
    #[error("Capture session is already running")]
    AlreadyRunning,

    /// A driver call failed.
    #[error(transparent)]
    Device(#[from] DeviceError),
}
