//! # cam-sync
//!
//! Coordinates N independently-driven cameras so their software triggers
//! fire within a bounded skew of one another, despite each device exposing
//! only a variable-latency trigger-readiness register. Each device gets its
//! own worker task that polls readiness, rendezvouses with the rest of the
//! group at an abortable N-party barrier, then fires and retrieves, so no
//! camera ever triggers while another is known to still be unready.
//!
//! ## Crate Structure
//!
//! - **`config`**: Settings loaded from TOML: poll interval and rendezvous
//!   timeout. See [`config::Settings`].
//! - **`driver`**: The Device Driver Interface the core consumes,
//!   [`driver::CameraBus`] and [`driver::TriggerCamera`]. Vendor SDKs live
//!   behind these traits, outside this crate.
//! - **`error`**: Typed per-device driver errors and the session error enum.
//! - **`mock`**: Simulated cameras implementing the driver traits, used by
//!   the test suite and the demo binary.
//! - **`poll`**: The bounded-interval trigger-readiness polling loop.
//! - **`rendezvous`**: The shared primitives, [`rendezvous::StopSignal`]
//!   and the abortable, timeout-bounded [`rendezvous::RendezvousBarrier`].
//! - **`session`**: [`session::CaptureSession`] handles discovery, worker
//!   spawning, the event stream and clean shutdown.
//! - **`worker`**: The per-device capture state machine.

pub mod config;
pub mod driver;
pub mod error;
pub mod mock;
pub mod poll;
pub mod rendezvous;
pub mod session;
pub mod worker;

pub use config::{Settings, SyncSettings};
pub use driver::{CameraBus, Capture, DeviceIndex, TriggerCamera};
pub use error::{DeviceError, DeviceErrorKind, SyncError, SyncResult};
pub use mock::{MockBus, MockCamera};
pub use poll::{poll_until_ready, PollOutcome};
pub use rendezvous::{RendezvousBarrier, StopSignal, WaitOutcome};
pub use session::CaptureSession;
pub use worker::{CaptureEvent, CaptureWorker, WorkerState};
