//! Shared synchronization primitives for the capture group.
//!
//! The stop signal and the rendezvous barrier are the only state shared
//! between workers. Both are safe for concurrent access from any number of
//! tasks; the barrier's counters are private and only reachable through
//! [`RendezvousBarrier::arrive_and_wait`] and [`RendezvousBarrier::abort`].

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::Duration;

// =============================================================================
// Stop Signal
// =============================================================================

/// Cooperative, write-once shutdown flag.
///
/// Set once by the session during shutdown and observed by every worker at
/// each poll iteration and loop top. Cloning yields another handle to the
/// same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    /// New, unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the signal. Idempotent.
    pub fn set(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Rendezvous Barrier
// =============================================================================

/// Outcome of one [`RendezvousBarrier::arrive_and_wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// All parties arrived in this generation; everyone proceeds.
    Released,
    /// The timeout elapsed first; the caller's arrival was retracted.
    TimedOut,
    /// The barrier was aborted; it will never release again.
    Aborted,
}

impl std::fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitOutcome::Released => write!(f, "released"),
            WaitOutcome::TimedOut => write!(f, "timed_out"),
            WaitOutcome::Aborted => write!(f, "aborted"),
        }
    }
}

/// Value broadcast to waiters whenever a generation completes or the barrier
/// is aborted.
#[derive(Debug, Clone, Copy, Default)]
struct BarrierEvent {
    generation: u64,
    aborted: bool,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// N-party rendezvous point with bounded waits and permanent abort.
///
/// Each participant calls [`arrive_and_wait`](Self::arrive_and_wait); nobody
/// proceeds until all `parties` have arrived in the same generation, at which
/// point every waiter resolves [`WaitOutcome::Released`] and the barrier
/// resets for the next round. A waiter whose timeout elapses retracts its
/// arrival so the remaining parties still need exactly `parties` arrivals.
/// [`abort`](Self::abort) permanently releases every current and future
/// caller with [`WaitOutcome::Aborted`].
///
/// Internally: arrival counts live under a mutex that is never held across an
/// await; waiters park on a watch channel carrying the generation counter and
/// the aborted flag, so a late subscriber still observes a release that
/// happened before it started waiting.
pub struct RendezvousBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    event_tx: watch::Sender<BarrierEvent>,
}

impl RendezvousBarrier {
    /// Barrier for `parties` participants.
    ///
    /// # Panics
    /// Panics if `parties` is zero.
    #[must_use]
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "a rendezvous barrier needs at least one party");
        let (event_tx, _) = watch::channel(BarrierEvent::default());
        Self {
            parties,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                aborted: false,
            }),
            event_tx,
        }
    }

    /// Number of participants required to release a generation.
    #[must_use]
    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Whether [`abort`](Self::abort) has been called.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }

    /// Arrive at the barrier and wait at most `timeout` for the rest of the
    /// group.
    ///
    /// The final arrival of a generation releases everyone and resets the
    /// count atomically with respect to arrivals for the next generation. On
    /// timeout the arrival is retracted, unless the round completed (or the
    /// barrier aborted) while the timeout was firing, in which case that
    /// outcome wins.
    pub async fn arrive_and_wait(&self, timeout: Duration) -> WaitOutcome {
        let mut events = self.event_tx.subscribe();
        let generation = {
            let mut state = self.state.lock();
            if state.aborted {
                return WaitOutcome::Aborted;
            }
            state.arrived += 1;
            if state.arrived == self.parties {
                state.arrived = 0;
                state.generation = state.generation.wrapping_add(1);
                let generation = state.generation;
                drop(state);
                self.event_tx.send_modify(|event| event.generation = generation);
                return WaitOutcome::Released;
            }
            state.generation
        };

        let released =
            events.wait_for(|event| event.aborted || event.generation != generation);
        let outcome = match tokio::time::timeout(timeout, released).await {
            Ok(Ok(event)) => {
                if event.generation != generation {
                    WaitOutcome::Released
                } else {
                    WaitOutcome::Aborted
                }
            }
            // The sender lives inside `self`; a closed channel means the
            // barrier is being torn down mid-wait.
            Ok(Err(_)) => WaitOutcome::Aborted,
            Err(_) => {
                let mut state = self.state.lock();
                // Re-check under the lock: release or abort may have won the
                // race against the timer.
                if state.generation != generation {
                    return WaitOutcome::Released;
                }
                if state.aborted {
                    return WaitOutcome::Aborted;
                }
                state.arrived -= 1;
                WaitOutcome::TimedOut
            }
        };
        outcome
    }

    /// Permanently release every current and future waiter with
    /// [`WaitOutcome::Aborted`]. Idempotent and safe to call concurrently
    /// with [`arrive_and_wait`](Self::arrive_and_wait).
    pub fn abort(&self) {
        {
            let mut state = self.state.lock();
            state.aborted = true;
        }
        self.event_tx.send_modify(|event| event.aborted = true);
    }
}
