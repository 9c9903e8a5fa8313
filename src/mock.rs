//! Simulated trigger cameras for tests and hardware-free demos.
//!
//! [`MockCamera`] models the readiness behavior that matters to the core: a
//! device is ready until fired, then unready for a configurable re-arm
//! delay (optionally jittered so a group of mocks goes out of step the way
//! real cameras do). Every failure mode the worker distinguishes can be
//! injected, and atomic counters expose what the device actually did.
//!
//! Readiness is tracked with [`tokio::time::Instant`] so tests driven by a
//! paused clock stay deterministic.

use crate::driver::{CameraBus, Capture, DeviceIndex, TriggerCamera};
use crate::error::{DeviceError, DeviceErrorKind};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};

/// Consume one pending failure, if any.
fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

// =============================================================================
// MockBus
// =============================================================================

/// A bus with a fixed set of simulated cameras.
pub struct MockBus {
    cameras: Vec<Arc<MockCamera>>,
}

impl MockBus {
    /// Bus with `count` cameras, indexed `0..count`.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            cameras: (0..count).map(|i| Arc::new(MockCamera::new(i))).collect(),
        }
    }

    /// The camera at `index`, for configuring behavior and reading counters.
    ///
    /// # Panics
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn camera(&self, index: usize) -> Arc<MockCamera> {
        Arc::clone(&self.cameras[index])
    }

    /// All cameras on the bus.
    #[must_use]
    pub fn cameras(&self) -> &[Arc<MockCamera>] {
        &self.cameras
    }
}

#[async_trait]
impl CameraBus for MockBus {
    async fn enumerate(&self) -> anyhow::Result<usize> {
        Ok(self.cameras.len())
    }

    async fn connect(&self, index: DeviceIndex) -> Result<Arc<dyn TriggerCamera>, DeviceError> {
        let camera = self.cameras.get(index.get()).ok_or_else(|| {
            DeviceError::new(
                index,
                DeviceErrorKind::Connect,
                "no camera at this bus position",
            )
        })?;
        camera.open()?;
        Ok(Arc::clone(camera) as Arc<dyn TriggerCamera>)
    }
}

// =============================================================================
// MockCamera
// =============================================================================

/// One simulated software-triggerable camera.
#[derive(Debug)]
pub struct MockCamera {
    index: DeviceIndex,
    connected: AtomicBool,
    configured: AtomicBool,
    ready_at: Mutex<Instant>,
    rearm_delay: Mutex<Duration>,
    rearm_jitter: Mutex<Duration>,
    retrieve_latency: Mutex<Duration>,
    fail_connect: AtomicBool,
    fail_configure: AtomicBool,
    readiness_failures: AtomicU32,
    fire_failures: AtomicU32,
    retrieve_failures: AtomicU32,
    fire_count: AtomicU64,
    retrieve_count: AtomicU64,
    disconnect_count: AtomicU32,
}

impl MockCamera {
    /// Camera at bus position `index`: ready immediately, 10 ms re-arm, no
    /// jitter, no injected failures.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index: DeviceIndex::new(index),
            connected: AtomicBool::new(false),
            configured: AtomicBool::new(false),
            ready_at: Mutex::new(Instant::now()),
            rearm_delay: Mutex::new(Duration::from_millis(10)),
            rearm_jitter: Mutex::new(Duration::ZERO),
            retrieve_latency: Mutex::new(Duration::ZERO),
            fail_connect: AtomicBool::new(false),
            fail_configure: AtomicBool::new(false),
            readiness_failures: AtomicU32::new(0),
            fire_failures: AtomicU32::new(0),
            retrieve_failures: AtomicU32::new(0),
            fire_count: AtomicU64::new(0),
            retrieve_count: AtomicU64::new(0),
            disconnect_count: AtomicU32::new(0),
        }
    }

    fn open(&self) -> Result<(), DeviceError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(DeviceError::new(
                self.index,
                DeviceErrorKind::Connect,
                "simulated connect failure",
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Hold readiness low for `delay` from now.
    pub fn set_ready_in(&self, delay: Duration) {
        *self.ready_at.lock() = Instant::now() + delay;
    }

    /// Time the camera stays unready after each fire.
    pub fn set_rearm_delay(&self, delay: Duration) {
        *self.rearm_delay.lock() = delay;
    }

    /// Random extra re-arm time, sampled per fire in `0..=jitter`.
    pub fn set_rearm_jitter(&self, jitter: Duration) {
        *self.rearm_jitter.lock() = jitter;
    }

    /// Simulated buffer-wait inside `retrieve_capture`.
    pub fn set_retrieve_latency(&self, latency: Duration) {
        *self.retrieve_latency.lock() = latency;
    }

    /// Make the next `open` attempt fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Make trigger-mode configuration fail.
    pub fn set_fail_configure(&self, fail: bool) {
        self.fail_configure.store(fail, Ordering::SeqCst);
    }

    /// Fail the next `count` readiness queries.
    pub fn inject_readiness_failures(&self, count: u32) {
        self.readiness_failures.fetch_add(count, Ordering::SeqCst);
    }

    /// Fail the next `count` fire commands.
    pub fn inject_fire_failures(&self, count: u32) {
        self.fire_failures.fetch_add(count, Ordering::SeqCst);
    }

    /// Fail the next `count` retrieve calls.
    pub fn inject_retrieve_failures(&self, count: u32) {
        self.retrieve_failures.fetch_add(count, Ordering::SeqCst);
    }

    /// Triggers fired so far.
    #[must_use]
    pub fn fire_count(&self) -> u64 {
        self.fire_count.load(Ordering::SeqCst)
    }

    /// Captures retrieved successfully so far.
    #[must_use]
    pub fn retrieve_count(&self) -> u64 {
        self.retrieve_count.load(Ordering::SeqCst)
    }

    /// How many times the device was released.
    #[must_use]
    pub fn disconnect_count(&self) -> u32 {
        self.disconnect_count.load(Ordering::SeqCst)
    }

    /// Whether the device is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Whether software-trigger mode has been configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.configured.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TriggerCamera for MockCamera {
    fn index(&self) -> DeviceIndex {
        self.index
    }

    async fn configure_software_trigger(&self) -> Result<(), DeviceError> {
        if self.fail_configure.load(Ordering::SeqCst) {
            return Err(DeviceError::new(
                self.index,
                DeviceErrorKind::Configure,
                "simulated configuration failure",
            ));
        }
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_trigger_ready(&self) -> Result<bool, DeviceError> {
        if take_failure(&self.readiness_failures) {
            return Err(DeviceError::new(
                self.index,
                DeviceErrorKind::Readiness,
                "simulated register read failure",
            ));
        }
        Ok(Instant::now() >= *self.ready_at.lock())
    }

    async fn fire_trigger(&self) -> Result<(), DeviceError> {
        if take_failure(&self.fire_failures) {
            return Err(DeviceError::new(
                self.index,
                DeviceErrorKind::Fire,
                "simulated trigger rejection",
            ));
        }
        self.fire_count.fetch_add(1, Ordering::SeqCst);
        let mut rearm = *self.rearm_delay.lock();
        let jitter = *self.rearm_jitter.lock();
        if !jitter.is_zero() {
            let extra = rand::thread_rng().gen_range(0..=jitter.as_micros() as u64);
            rearm += Duration::from_micros(extra);
        }
        *self.ready_at.lock() = Instant::now() + rearm;
        Ok(())
    }

    async fn retrieve_capture(&self) -> Result<Capture, DeviceError> {
        let latency = *self.retrieve_latency.lock();
        if !latency.is_zero() {
            sleep(latency).await;
        }
        if take_failure(&self.retrieve_failures) {
            return Err(DeviceError::new(
                self.index,
                DeviceErrorKind::Retrieve,
                "simulated buffer timeout",
            ));
        }
        let frame_number = self.retrieve_count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Capture {
            device: self.index,
            timestamp: Utc::now(),
            frame_number,
        })
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.connected.store(false, Ordering::SeqCst);
        self.disconnect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn firing_holds_readiness_low_for_the_rearm_delay() {
        let camera = MockCamera::new(0);
        camera.set_rearm_delay(Duration::from_millis(20));
        assert!(camera.is_trigger_ready().await.unwrap());

        camera.fire_trigger().await.unwrap();
        assert!(!camera.is_trigger_ready().await.unwrap());

        sleep(Duration::from_millis(15)).await;
        assert!(!camera.is_trigger_ready().await.unwrap());
        sleep(Duration::from_millis(6)).await;
        assert!(camera.is_trigger_ready().await.unwrap());
        assert_eq!(camera.fire_count(), 1);
    }

    #[tokio::test]
    async fn bus_connects_by_index_and_rejects_unknown_positions() {
        let bus = MockBus::new(2);
        let camera = bus.connect(DeviceIndex::new(1)).await.unwrap();
        assert_eq!(camera.index().get(), 1);
        assert!(bus.camera(1).is_connected());

        let err = bus.connect(DeviceIndex::new(5)).await.unwrap_err();
        assert_eq!(err.kind, DeviceErrorKind::Connect);
    }

    #[tokio::test]
    async fn retrieve_numbers_frames_sequentially() {
        let camera = MockCamera::new(0);
        assert_eq!(camera.retrieve_capture().await.unwrap().frame_number, 1);
        assert_eq!(camera.retrieve_capture().await.unwrap().frame_number, 2);
    }
}
