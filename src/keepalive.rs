//! Two-phase idle watchdog: silence → PING → timeout.
//!
//! [`Watchdog`] owns at most one live cancellable timer at a time. The
//! session feeds it every inbound chunk (not line — partial data counts)
//! via [`Watchdog::reset`], which cancels whatever was pending and
//! reschedules the silence phase. [`Watchdog::poll_phase`] is driven from
//! the session's event loop (typically inside a `tokio::select!`) and
//! reports which phase just elapsed, if any.

use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

/// What the watchdog wants the caller to do after a phase elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogPhase {
    /// No inbound data for `timeout_ms`; send `PING :ignored` and arm the
    /// second phase.
    Silence,
    /// No response to the PING for a further `timeout_ms`; the session
    /// should emit `timeout` and begin a graceful end.
    NoPong,
}

/// Owns a single pending timer, re-armed on every inbound chunk.
pub struct Watchdog {
    timeout: Duration,
    deadline: Option<Pin>,
}

/// A boxed, pinned `Sleep` future paired with which phase it represents.
struct Pin {
    sleep: std::pin::Pin<Box<Sleep>>,
    phase: WatchdogPhase,
}

impl Watchdog {
    /// Create a watchdog with the given silence/no-pong timeout. The timer
    /// is not armed until [`Watchdog::reset`] or [`Watchdog::start`] is
    /// called (the watchdog starts on transport-connect, not construction).
    pub fn new(timeout_ms: u32) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms as u64),
            deadline: None,
        }
    }

    /// Arm the silence phase. Called once when the transport connects.
    pub fn start(&mut self) {
        self.arm(WatchdogPhase::Silence);
    }

    /// Cancel whatever is pending and re-arm the silence phase. Called on
    /// every inbound chunk, regardless of which phase is active.
    pub fn reset(&mut self) {
        self.arm(WatchdogPhase::Silence);
    }

    /// Advance past the silence phase: called once `Silence` has elapsed
    /// and the PING has been sent, to arm the second phase.
    pub fn arm_no_pong(&mut self) {
        self.arm(WatchdogPhase::NoPong);
    }

    /// Cancel the pending timer entirely. Idempotent.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    fn arm(&mut self, phase: WatchdogPhase) {
        self.deadline = Some(Pin {
            sleep: Box::pin(sleep(self.timeout)),
            phase,
        });
    }

    /// Poll the pending timer. Resolves once the current phase elapses;
    /// pending forever if nothing is armed. Intended to be selected on
    /// inside the session's event loop.
    pub async fn elapsed(&mut self) -> WatchdogPhase {
        match &mut self.deadline {
            Some(pin) => {
                (&mut pin.sleep).await;
                pin.phase
            }
            None => std::future::pending().await,
        }
    }

    /// The configured timeout, for tests and diagnostics.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the configured timeout. Takes effect the next time a phase is
    /// armed; does not reschedule a timer already in flight.
    pub fn set_timeout(&mut self, timeout_ms: u32) {
        self.timeout = Duration::from_millis(timeout_ms as u64);
    }

    /// Approximate deadline of the currently-armed timer, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline.as_ref().map(|p| p.sleep.deadline())
    }
}
