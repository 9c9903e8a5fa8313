//! Per-device capture worker.
//!
//! One worker exclusively owns one camera handle and runs the capture state
//! machine until the stop signal is observed or a fatal device error occurs:
//!
//! ```text
//! Connecting ──▶ StandBy ──▶ Polling ──▶ AwaitingRendezvous ──▶ Firing ──▶ Retrieving ─┐
//!                   ▲                         │ timed out            ▲                  │
//!                   │                         └──────▶ Polling ──────┘ (re-poll)        │
//!                   └──────────────────────────────────────────────────────────────────┘
//!                        stop / abort / fatal error ──▶ ShuttingDown ──▶ Disconnected
//! ```
//!
//! Severity policy: connect, configure and readiness-query errors are fatal
//! to this worker only; fire and retrieve errors are logged and reported,
//! and the cycle continues. The single exit through `run()` guarantees the
//! device is disconnected exactly once no matter which state initiated
//! shutdown.

use crate::config::SyncSettings;
use crate::driver::{CameraBus, Capture, DeviceIndex, TriggerCamera};
use crate::error::DeviceError;
use crate::poll::{poll_until_ready, PollOutcome};
use crate::rendezvous::{RendezvousBarrier, StopSignal, WaitOutcome};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Worker state, traced on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Opening the device and configuring software-trigger mode.
    Connecting,
    /// Between cycles, about to check the stop signal.
    StandBy,
    /// Polling the trigger-ready register.
    Polling,
    /// Blocked at the rendezvous barrier.
    AwaitingRendezvous,
    /// Issuing the software trigger.
    Firing,
    /// Waiting for the capture buffer.
    Retrieving,
    /// Stop observed; releasing the device.
    ShuttingDown,
    /// Terminal: the device has been released.
    Disconnected,
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WorkerState::Connecting => "connecting",
            WorkerState::StandBy => "standby",
            WorkerState::Polling => "polling",
            WorkerState::AwaitingRendezvous => "awaiting_rendezvous",
            WorkerState::Firing => "firing",
            WorkerState::Retrieving => "retrieving",
            WorkerState::ShuttingDown => "shutting_down",
            WorkerState::Disconnected => "disconnected",
        };
        write!(f, "{}", label)
    }
}

/// Per-cycle and lifecycle outcomes published on the session's broadcast
/// channel, the seam for the external reporting collaborator.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A capture was retrieved successfully.
    Captured {
        /// Originating device.
        device: DeviceIndex,
        /// Cycle number on that device, counted from zero.
        cycle: u64,
        /// The retrieved capture.
        capture: Capture,
    },
    /// The retrieve call failed; the worker keeps cycling.
    CaptureFailed {
        /// Originating device.
        device: DeviceIndex,
        /// Cycle number on that device.
        cycle: u64,
        /// Driver-reported failure.
        error: DeviceError,
    },
    /// The worker hit a fatal device error and left the capture group.
    WorkerFailed {
        /// The device whose worker terminated.
        device: DeviceIndex,
        /// The error that terminated it.
        error: DeviceError,
    },
}

/// Owns one camera and runs the capture cycle against the shared barrier.
pub struct CaptureWorker {
    index: DeviceIndex,
    bus: Arc<dyn CameraBus>,
    barrier: Arc<RendezvousBarrier>,
    stop: StopSignal,
    poll_interval: Duration,
    rendezvous_timeout: Duration,
    events: broadcast::Sender<CaptureEvent>,
    state: WorkerState,
    cycle: u64,
}

impl CaptureWorker {
    /// Bind a worker to the device at `index`.
    pub fn new(
        index: DeviceIndex,
        bus: Arc<dyn CameraBus>,
        barrier: Arc<RendezvousBarrier>,
        stop: StopSignal,
        settings: &SyncSettings,
        events: broadcast::Sender<CaptureEvent>,
    ) -> Self {
        Self {
            index,
            bus,
            barrier,
            stop,
            poll_interval: settings.poll_interval,
            rendezvous_timeout: settings.rendezvous_timeout,
            events,
            state: WorkerState::Connecting,
            cycle: 0,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!(device = %self.index, from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    /// Run the worker to completion.
    ///
    /// Returns once the device has been released (or could not be opened at
    /// all). Never propagates errors: fatal ones are logged and reported as
    /// [`CaptureEvent::WorkerFailed`], and they terminate this worker only.
    pub async fn run(mut self) {
        debug!(device = %self.index, "connecting");
        let camera = match self.bus.connect(self.index).await {
            Ok(camera) => camera,
            Err(error) => {
                error!(device = %self.index, %error, "connect failed; worker never entered the cycle");
                let _ = self.events.send(CaptureEvent::WorkerFailed {
                    device: self.index,
                    error,
                });
                self.transition(WorkerState::Disconnected);
                return;
            }
        };

        // From here the handle is open: every path below releases it exactly once.
        let outcome = self.serve(camera.as_ref()).await;
        self.transition(WorkerState::ShuttingDown);
        if let Err(error) = outcome {
            error!(device = %self.index, %error, "worker stopped on fatal device error");
            let _ = self.events.send(CaptureEvent::WorkerFailed {
                device: self.index,
                error,
            });
        }
        if let Err(error) = camera.disconnect().await {
            warn!(device = %self.index, %error, "disconnect failed");
        }
        self.transition(WorkerState::Disconnected);
        info!(device = %self.index, cycles = self.cycle, "worker disconnected");
    }

    async fn serve(&mut self, camera: &dyn TriggerCamera) -> Result<(), DeviceError> {
        camera.configure_software_trigger().await?;
        self.transition(WorkerState::StandBy);
        info!(device = %self.index, "standing by");

        loop {
            if self.stop.is_set() {
                return Ok(());
            }

            self.transition(WorkerState::Polling);
            match poll_until_ready(camera, &self.stop, self.poll_interval).await? {
                PollOutcome::Cancelled => return Ok(()),
                PollOutcome::Ready => {}
            }

            self.transition(WorkerState::AwaitingRendezvous);
            match self.barrier.arrive_and_wait(self.rendezvous_timeout).await {
                WaitOutcome::Released => {}
                WaitOutcome::TimedOut => {
                    // Arrival was already retracted inside the barrier.
                    warn!(device = %self.index, cycle = self.cycle, "rendezvous timed out; re-polling");
                    continue;
                }
                WaitOutcome::Aborted => return Ok(()),
            }

            self.transition(WorkerState::Firing);
            if let Err(error) = camera.fire_trigger().await {
                warn!(device = %self.index, cycle = self.cycle, %error, "trigger fire failed");
            }

            self.transition(WorkerState::Retrieving);
            match camera.retrieve_capture().await {
                Ok(capture) => {
                    info!(
                        device = %self.index,
                        cycle = self.cycle,
                        timestamp = %capture.timestamp,
                        frame = capture.frame_number,
                        "captured frame"
                    );
                    let _ = self.events.send(CaptureEvent::Captured {
                        device: self.index,
                        cycle: self.cycle,
                        capture,
                    });
                }
                Err(error) => {
                    warn!(device = %self.index, cycle = self.cycle, %error, "capture retrieve failed");
                    let _ = self.events.send(CaptureEvent::CaptureFailed {
                        device: self.index,
                        cycle: self.cycle,
                        error,
                    });
                }
            }

            self.cycle += 1;
            self.transition(WorkerState::StandBy);
        }
    }
}
