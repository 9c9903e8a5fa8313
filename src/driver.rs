//! Device Driver Interface consumed by the synchronization core.
//!
//! The core never talks to camera hardware directly. Everything
//! vendor-specific (bus transport, register access, buffer handling,
//! capture-mode setup) lives behind two async traits:
//!
//! - [`CameraBus`]: discovery and per-index connection.
//! - [`TriggerCamera`]: the handle for one connected device; readiness
//!   query, trigger fire, capture retrieval and disconnect.
//!
//! Implementations must be `Send + Sync` and use interior mutability; all
//! methods take `&self` so a handle can be shared with the worker that owns
//! it without external locking. The in-tree [`mock`](crate::mock) module
//! provides a simulated implementation for tests and the demo binary.

use crate::error::DeviceError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Stable identity of one camera for the process lifetime.
///
/// Assigned at discovery time as the position on the bus (`0..N-1`) and used
/// to route log output and to bind exactly one worker to one device. Opaque
/// beyond equality, ordering and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceIndex(usize);

impl DeviceIndex {
    /// Wrap a bus position as a device identity.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The underlying bus position.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One successfully retrieved capture.
#[derive(Debug, Clone, Serialize)]
pub struct Capture {
    /// Device that produced the frame.
    pub device: DeviceIndex,
    /// Embedded timestamp reported with the image.
    pub timestamp: DateTime<Utc>,
    /// Driver frame counter for the device.
    pub frame_number: u64,
}

/// Camera bus discovery and connection.
///
/// # Contract
/// - `enumerate` reports how many cameras are attached; the count is assumed
///   stable for the session.
/// - `connect` opens the device at `index` and returns a live handle. The
///   handle is exclusively owned by one worker; the core never connects to
///   the same index twice in a session.
#[async_trait]
pub trait CameraBus: Send + Sync {
    /// Number of cameras currently attached to the bus.
    async fn enumerate(&self) -> anyhow::Result<usize>;

    /// Open the camera at `index`.
    async fn connect(&self, index: DeviceIndex) -> Result<Arc<dyn TriggerCamera>, DeviceError>;
}

/// Handle for one connected, software-triggerable camera.
///
/// # Contract
/// - `configure_software_trigger` must be called once before the first
///   readiness query; it switches the device to software-trigger mode.
/// - `is_trigger_ready` is a cheap register read, safe to poll at
///   millisecond cadence. The result is transient; callers must not cache it.
/// - `fire_trigger` is fire-and-forget: it issues the trigger command and
///   returns without waiting for the exposure.
/// - `retrieve_capture` blocks (bounded by the driver) until the frame for
///   the last fired trigger is available, and reports its embedded timestamp.
/// - `disconnect` releases the device. Called exactly once per handle.
#[async_trait]
pub trait TriggerCamera: Send + Sync + fmt::Debug {
    /// Identity this handle is bound to.
    fn index(&self) -> DeviceIndex;

    /// Put the device into software-trigger capture mode.
    async fn configure_software_trigger(&self) -> Result<(), DeviceError>;

    /// Whether the device can accept a new software trigger right now.
    async fn is_trigger_ready(&self) -> Result<bool, DeviceError>;

    /// Issue the software trigger command.
    async fn fire_trigger(&self) -> Result<(), DeviceError>;

    /// Retrieve the capture produced by the last trigger.
    async fn retrieve_capture(&self) -> Result<Capture, DeviceError>;

    /// Release the device.
    async fn disconnect(&self) -> Result<(), DeviceError>;
}
