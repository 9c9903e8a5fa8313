//! End-to-end tests for synchronized capture over the mock bus.
//!
//! These run under tokio's paused clock, so the poll/rendezvous timing is
//! simulated deterministically rather than slept for real.

use cam_sync::{CaptureEvent, CaptureSession, MockBus, SyncError, SyncSettings};
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing_test::traced_test;

fn settings(rendezvous_timeout: Duration) -> SyncSettings {
    SyncSettings {
        poll_interval: Duration::from_millis(1),
        rendezvous_timeout,
    }
}

/// Poll `condition` until it holds or `deadline` of simulated time passes.
async fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(2)).await;
    }
    condition()
}

// =============================================================================
// Synchronized rounds
// =============================================================================

#[tokio::test(start_paused = true)]
async fn three_cameras_fire_in_lockstep() {
    let bus = Arc::new(MockBus::new(3));
    for (i, camera) in bus.cameras().iter().enumerate() {
        camera.set_ready_in(Duration::from_millis(3 * i as u64));
    }

    let session = CaptureSession::new(
        bus.clone(),
        settings(Duration::from_secs(5)),
    );
    let mut events = session.subscribe();
    assert_eq!(session.start().await.unwrap(), 3);

    assert!(
        wait_until(Duration::from_secs(60), || {
            bus.cameras().iter().all(|c| c.fire_count() >= 3)
        })
        .await,
        "cameras never completed three rounds"
    );
    session.stop().await;

    // A round only ever releases the full group, so the trigger counts can
    // never diverge across cameras.
    let counts: Vec<u64> = bus.cameras().iter().map(|c| c.fire_count()).collect();
    assert!(counts.iter().all(|&c| c == counts[0]), "fire counts diverged: {:?}", counts);
    assert_eq!(counts, bus.cameras().iter().map(|c| c.retrieve_count()).collect::<Vec<_>>());

    // Every camera reported captures on the event stream.
    let mut seen = [false; 3];
    while let Ok(event) = events.try_recv() {
        if let CaptureEvent::Captured { device, .. } = event {
            seen[device.get()] = true;
        }
    }
    assert_eq!(seen, [true, true, true]);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn staggered_readiness_inside_the_window_never_times_out() {
    let bus = Arc::new(MockBus::new(2));
    // Camera 1 comes up four seconds late; the five-second window covers it.
    bus.camera(1).set_ready_in(Duration::from_secs(4));

    let session = CaptureSession::new(
        bus.clone(),
        settings(Duration::from_secs(5)),
    );
    session.start().await.unwrap();

    let start = Instant::now();
    assert!(
        wait_until(Duration::from_secs(10), || {
            bus.cameras().iter().all(|c| c.fire_count() >= 1)
        })
        .await
    );
    assert!(start.elapsed() >= Duration::from_secs(4), "first round cannot beat camera 1's readiness");
    session.stop().await;

    assert!(!logs_contain("rendezvous timed out"));
    assert_eq!(bus.camera(0).fire_count(), bus.camera(1).fire_count());
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test(start_paused = true)]
async fn stop_mid_poll_quiesces_all_workers_without_unmatched_triggers() {
    let bus = Arc::new(MockBus::new(3));
    // Camera 1 never becomes ready, so cameras 0 and 2 park at the barrier.
    bus.camera(1).set_ready_in(Duration::from_secs(3600));

    let session = CaptureSession::new(
        bus.clone(),
        settings(Duration::from_secs(5)),
    );
    session.start().await.unwrap();
    sleep(Duration::from_millis(50)).await;

    // Returns only once every worker has disconnected.
    session.stop().await;

    for camera in bus.cameras() {
        assert_eq!(camera.fire_count(), 0, "no full round, so nobody may fire");
        assert_eq!(camera.retrieve_count(), 0);
        assert!(!camera.is_connected());
        assert_eq!(camera.disconnect_count(), 1);
    }
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn dead_camera_stalls_the_group_until_stop() {
    let bus = Arc::new(MockBus::new(3));
    bus.camera(2).set_fail_connect(true);

    let session = CaptureSession::new(
        bus.clone(),
        settings(Duration::from_millis(100)),
    );
    let mut events = session.subscribe();
    session.start().await.unwrap();

    // The dead worker reports and leaves; the group is now permanently short
    // one party.
    match events.recv().await.unwrap() {
        CaptureEvent::WorkerFailed { device, .. } => assert_eq!(device.get(), 2),
        other => panic!("expected WorkerFailed, got {:?}", other),
    }

    // Surviving workers cycle through timed-out rendezvous rounds and
    // re-poll rather than giving up.
    sleep(Duration::from_millis(400)).await;
    assert!(logs_contain("rendezvous timed out"));

    session.stop().await;
    assert_eq!(bus.camera(0).fire_count(), 0);
    assert_eq!(bus.camera(1).fire_count(), 0);
    assert_eq!(bus.camera(0).disconnect_count(), 1);
    assert_eq!(bus.camera(1).disconnect_count(), 1);
    assert_eq!(bus.camera(2).disconnect_count(), 0);
}

// =============================================================================
// Lifecycle errors
// =============================================================================

#[tokio::test]
async fn empty_bus_refuses_to_start() {
    let session = CaptureSession::new(
        Arc::new(MockBus::new(0)),
        SyncSettings::default(),
    );
    assert!(matches!(
        session.start().await,
        Err(SyncError::NoCamerasFound)
    ));
    // Nothing started; stop is still safe.
    session.stop().await;
}

#[tokio::test(start_paused = true)]
async fn double_start_is_rejected_and_stop_is_idempotent() {
    let bus = Arc::new(MockBus::new(1));
    let session = CaptureSession::new(bus.clone(), SyncSettings::default());

    session.start().await.unwrap();
    assert!(matches!(
        session.start().await,
        Err(SyncError::AlreadyRunning)
    ));

    session.stop().await;
    session.stop().await;
    assert_eq!(bus.camera(0).disconnect_count(), 1);
}
