//! Trigger-readiness polling.
//!
//! A camera reports readiness through a register read; there is no push
//! notification. The poller re-queries at a fixed, configurable interval
//! (default 1 ms) and checks the stop signal at every boundary so shutdown
//! never waits on an unready device.

use crate::driver::TriggerCamera;
use crate::error::DeviceError;
use crate::rendezvous::StopSignal;
use tokio::time::{sleep, Duration};

/// Why [`poll_until_ready`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The device reported it can accept a new trigger.
    Ready,
    /// The stop signal was observed before readiness.
    Cancelled,
}

/// Poll `camera` until it is ready for a software trigger or the stop signal
/// is raised.
///
/// Readiness is re-read every `interval` while false; the stop signal is
/// checked before each query, so cancellation is observed without waiting
/// out another sleep. No timeout is imposed here; the surrounding
/// rendezvous wait bounds the cycle. A failed readiness query propagates to
/// the caller, which treats it as fatal for the device.
pub async fn poll_until_ready(
    camera: &dyn TriggerCamera,
    stop: &StopSignal,
    interval: Duration,
) -> Result<PollOutcome, DeviceError> {
    loop {
        if stop.is_set() {
            return Ok(PollOutcome::Cancelled);
        }
        if camera.is_trigger_ready().await? {
            return Ok(PollOutcome::Ready);
        }
        sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceErrorKind;
    use crate::mock::MockCamera;
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn ready_device_returns_without_sleeping() {
        let camera = MockCamera::new(0);
        let stop = StopSignal::new();
        let outcome = poll_until_ready(&camera, &stop, INTERVAL).await.unwrap();
        assert_eq!(outcome, PollOutcome::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn unready_device_is_polled_until_ready() {
        let camera = MockCamera::new(0);
        camera.set_ready_in(Duration::from_millis(10));
        let stop = StopSignal::new();

        let start = Instant::now();
        let outcome = poll_until_ready(&camera, &stop, INTERVAL).await.unwrap();
        assert_eq!(outcome, PollOutcome::Ready);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test]
    async fn preset_stop_cancels_before_querying_the_device() {
        let camera = MockCamera::new(0);
        // A query would fail; Cancelled proves the stop check came first.
        camera.inject_readiness_failures(1);
        let stop = StopSignal::new();
        stop.set();

        let outcome = poll_until_ready(&camera, &stop, INTERVAL).await.unwrap();
        assert_eq!(outcome, PollOutcome::Cancelled);
    }

    #[tokio::test]
    async fn query_error_propagates() {
        let camera = MockCamera::new(3);
        camera.inject_readiness_failures(1);
        let stop = StopSignal::new();

        let err = poll_until_ready(&camera, &stop, INTERVAL)
            .await
            .unwrap_err();
        assert_eq!(err.kind, DeviceErrorKind::Readiness);
        assert_eq!(err.index.get(), 3);
    }
}
