//! Purge Timer
//!
//! Background timer that invokes a store's expired-item purge. Each store owns
//! at most one timer; it runs on a dedicated OS thread parked on a condition
//! variable until the next due instant.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::Result;

#[derive(Debug)]
struct TimerState {
    /// Next instant the callback fires, None while idle
    due: Option<Instant>,
    /// Re-arm interval after firing, zero for one-shot
    period: Duration,
    cancelled: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    signal: Condvar,
}

// == Purge Timer ==
/// A restartable timer running a callback on its own thread.
///
/// Dropping the timer disposes it. Disposal never joins the thread, so it is
/// safe to dispose a timer from inside its own callback.
pub struct PurgeTimer {
    shared: Arc<TimerShared>,
}

impl PurgeTimer {
    /// Spawns a timer that first fires after `delay`, then every `period`.
    ///
    /// # Arguments
    /// * `thread_name` - Name of the spawned thread
    /// * `delay` - Time until the first callback
    /// * `period` - Interval between subsequent callbacks, `Duration::ZERO` for one-shot
    /// * `callback` - Work to run each time the timer fires
    ///
    /// # Errors
    /// `CacheError::Timer` if the thread cannot be spawned.
    pub fn start<F>(thread_name: &str, delay: Duration, period: Duration, callback: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                due: Some(Instant::now() + delay),
                period,
                cancelled: false,
            }),
            signal: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || run(worker, callback))?;

        info!(
            "Purge timer started: first run in {:?}, period {:?}",
            delay, period
        );
        Ok(Self { shared })
    }

    // == Change ==
    /// Reschedules the timer to fire after `delay`, then every `period`.
    pub fn change(&self, delay: Duration, period: Duration) {
        let mut state = self.shared.state.lock();
        if state.cancelled {
            return;
        }
        state.due = Some(Instant::now() + delay);
        state.period = period;
        self.shared.signal.notify_one();
        debug!("Purge timer rescheduled: next run in {:?}", delay);
    }

    // == Dispose ==
    /// Stops the timer. The thread exits at its next wake-up.
    pub fn dispose(&self) {
        let mut state = self.shared.state.lock();
        if !state.cancelled {
            state.cancelled = true;
            state.due = None;
            self.shared.signal.notify_one();
            info!("Purge timer disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.lock().cancelled
    }
}

impl Drop for PurgeTimer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for PurgeTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PurgeTimer")
            .field("state", &*self.shared.state.lock())
            .finish()
    }
}

/// Timer thread body.
fn run<F: Fn()>(shared: Arc<TimerShared>, callback: F) {
    let mut state = shared.state.lock();
    loop {
        if state.cancelled {
            debug!("Purge timer thread exiting");
            return;
        }
        match state.due {
            None => shared.signal.wait(&mut state),
            Some(due) => {
                let now = Instant::now();
                if now < due {
                    shared.signal.wait_until(&mut state, due);
                    continue;
                }
                state.due = if state.period.is_zero() {
                    None
                } else {
                    Some(now + state.period)
                };
                // The callback may reschedule or dispose this timer
                MutexGuard::unlocked(&mut state, &callback);
            }
        }
    }
}
