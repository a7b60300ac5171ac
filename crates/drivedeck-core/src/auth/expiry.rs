//! One-shot timer that ends a session at its expiry instant.
//!
//! State machine: `Idle -> Armed -> (fired) -> Idle`. `cancel()` forces
//! `Armed -> Idle`. Re-arming always cancels first, and every arm bumps a
//! generation number that the sleeping task re-checks before firing, so a
//! superseded timer can never clear a newer session.

use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Armed,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl Slot {
    fn cancel(&mut self) {
        self.generation += 1;
        if let Some(pending) = self.pending.take() {
            pending.abort();
            debug!("Session expiry timer cancelled");
        }
    }
}

pub struct ExpiryTimer {
    clock: Arc<dyn Clock>,
    slot: Arc<Mutex<Slot>>,
}

impl ExpiryTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Schedule `on_expire` to run once at `expires_at`, replacing any pending timer.
    /// An instant already in the past fires on the next scheduler tick.
    ///
    /// `on_expire` runs while the timer's lock is held, so once `cancel` or
    /// `arm` returns, no earlier callback is still running. It must not call
    /// back into this timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&self, expires_at: DateTime<Utc>, on_expire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = (expires_at - self.clock.now())
            .to_std()
            .unwrap_or_default();
        // Fixed now; the task may be polled later than this
        let deadline = Instant::now() + delay;

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.pending.take() {
            previous.abort();
        }
        slot.generation += 1;
        let generation = slot.generation;

        let shared = Arc::clone(&self.slot);
        slot.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut slot = shared.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.generation != generation {
                return;
            }
            slot.pending = None;
            debug!(generation, "Session expiry timer fired");
            on_expire();
        }));
        debug!(generation, delay_secs = delay.as_secs(), "Session expiry timer armed");
    }

    /// Cancel the pending timer, if any
    pub fn cancel(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.cancel();
    }

    pub fn state(&self) -> TimerState {
        let slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.pending {
            Some(ref handle) if !handle.is_finished() => TimerState::Armed,
            _ => TimerState::Idle,
        }
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        // Only the timer task can hold the lock now; if it does, its callback
        // is running (possibly the one dropping us) and nothing is left to cancel
        match self.slot.try_lock() {
            Ok(mut slot) => slot.cancel(),
            Err(TryLockError::Poisoned(e)) => e.into_inner().cancel(),
            Err(TryLockError::WouldBlock) => {}
        }
    }
}
