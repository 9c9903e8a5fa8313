//! Session management: one barrier, one stop signal, N workers.
//!
//! [`CaptureSession`] is the process-level surface of the crate. `start()`
//! discovers the cameras on the bus and spawns one [`CaptureWorker`] task
//! per device, all sharing a single [`RendezvousBarrier`] and
//! [`StopSignal`]; `stop()` raises the signal, aborts the barrier so nobody
//! stays parked in a rendezvous, and returns only after every worker has
//! released its device. Capture outcomes stream to subscribers on a
//! broadcast channel.

use crate::config::SyncSettings;
use crate::driver::{CameraBus, DeviceIndex};
use crate::error::{SyncError, SyncResult};
use crate::rendezvous::{RendezvousBarrier, StopSignal};
use crate::worker::{CaptureEvent, CaptureWorker};
use futures::future;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Coordinates the lifetime of one synchronized capture group.
///
/// A session runs once: `start()` then `stop()`. `stop()` is idempotent-safe
/// and may race with workers mid-cycle; an in-flight fire or retrieve
/// completes before its worker observes shutdown.
pub struct CaptureSession {
    bus: Arc<dyn CameraBus>,
    settings: SyncSettings,
    stop: StopSignal,
    barrier: Mutex<Option<Arc<RendezvousBarrier>>>,
    workers: tokio::sync::Mutex<Vec<tokio::task::JoinHandle<()>>>,
    running: AtomicBool,
    events: tokio::sync::broadcast::Sender<CaptureEvent>,
}

impl CaptureSession {
    /// Session over `bus` with the given timing settings.
    pub fn new(bus: Arc<dyn CameraBus>, settings: SyncSettings) -> Self {
        let (events, _) = tokio::sync::broadcast::channel(1024);
        Self {
            bus,
            settings,
            stop: StopSignal::new(),
            barrier: Mutex::new(None),
            workers: tokio::sync::Mutex::new(Vec::new()),
            running: AtomicBool::new(false),
            events,
        }
    }

    /// Subscribe to the capture event stream.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    /// Discover the cameras and spawn one worker per device.
    ///
    /// Returns the number of workers spawned. The workers run concurrently
    /// until [`stop`](Self::stop); control returns to the caller
    /// immediately.
    pub async fn start(&self) -> SyncResult<usize> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyRunning);
        }

        let count = match self.bus.enumerate().await {
            Ok(count) => count,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(SyncError::Enumeration(e.to_string()));
            }
        };
        if count == 0 {
            self.running.store(false, Ordering::SeqCst);
            return Err(SyncError::NoCamerasFound);
        }

        info!(cameras = count, "starting capture session");
        let barrier = Arc::new(RendezvousBarrier::new(count));
        *self.barrier.lock() = Some(Arc::clone(&barrier));

        let mut workers = self.workers.lock().await;
        for i in 0..count {
            let worker = CaptureWorker::new(
                DeviceIndex::new(i),
                Arc::clone(&self.bus),
                Arc::clone(&barrier),
                self.stop.clone(),
                &self.settings,
                self.events.clone(),
            );
            workers.push(tokio::spawn(worker.run()));
        }
        Ok(count)
    }

    /// Shut the session down and wait for every worker to release its
    /// device.
    ///
    /// Raises the stop signal, aborts the barrier to unblock anyone parked
    /// in a rendezvous, then joins all worker tasks. Safe to call repeatedly
    /// or concurrently; late callers find nothing left to join.
    pub async fn stop(&self) {
        self.stop.set();
        let barrier = self.barrier.lock().clone();
        if let Some(barrier) = barrier {
            barrier.abort();
        }

        let handles: Vec<_> = {
            let mut workers = self.workers.lock().await;
            workers.drain(..).collect()
        };
        if handles.is_empty() {
            return;
        }

        info!(workers = handles.len(), "stopping capture session");
        for result in future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "worker task failed to join");
            }
        }
        info!("capture session stopped");
    }
}
