//! Background worker threads
//!
//! Each subsystem poller runs on its own named thread. Cancellation is
//! cooperative through a shared [`CancelToken`] that wakes sleeping workers
//! immediately. A failing or panicking iteration is logged and the loop moves
//! on to the next cycle.

use crate::error::ReadError;

use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

/// Shared cooperative cancellation signal
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    state: Arc<CancelState>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self.state.cancelled.lock();
        *cancelled = true;
        self.state.wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.cancelled.lock()
    }

    /// Sleep up to `timeout`, returning early (with `true`) on cancellation
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.state.cancelled.lock();
        while !*cancelled {
            if self
                .state
                .wake
                .wait_until(&mut cancelled, deadline)
                .timed_out()
            {
                break;
            }
        }
        *cancelled
    }
}

/// How a worker spaces its iterations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Sleep exactly `D` after every cycle
    Fixed(Duration),
    /// Sleep `max(0, D - elapsed)` to hold a constant period `D`
    Dynamic(Duration),
}

impl Cadence {
    pub fn new(interval: Duration, dynamic: bool) -> Self {
        if dynamic {
            Cadence::Dynamic(interval)
        } else {
            Cadence::Fixed(interval)
        }
    }

    /// Time to sleep after a cycle that took `elapsed`
    pub fn delay_after(&self, elapsed: Duration) -> Duration {
        match *self {
            Cadence::Fixed(interval) => interval,
            Cadence::Dynamic(interval) => interval.saturating_sub(elapsed),
        }
    }
}

/// A running background loop
pub struct Worker {
    name: String,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn `work` on a named thread, calling it once per cycle until the
    /// token is cancelled.
    pub fn spawn<F>(
        name: impl Into<String>,
        cadence: Cadence,
        cancel: CancelToken,
        mut work: F,
    ) -> std::io::Result<Self>
    where
        F: FnMut(&CancelToken) -> Result<(), ReadError> + Send + 'static,
    {
        let name = name.into();
        let thread_name = name.clone();
        let token = cancel.clone();

        let handle = thread::Builder::new()
            .name(format!("farsight-{}", name))
            .spawn(move || {
                info!(worker = %thread_name, ?cadence, "worker started");
                let mut failures = 0u64;
                while !token.is_cancelled() {
                    let started = Instant::now();
                    match panic::catch_unwind(AssertUnwindSafe(|| work(&token))) {
                        Ok(Ok(())) => failures = 0,
                        Ok(Err(err)) => {
                            failures += 1;
                            // Repeats only log at debug until a cycle succeeds
                            if failures == 1 {
                                warn!(worker = %thread_name, error = %err, "cycle failed");
                            } else {
                                debug!(worker = %thread_name, error = %err, failures, "cycle failed");
                            }
                        }
                        Err(payload) => {
                            error!(
                                worker = %thread_name,
                                panic = %panic_message(&*payload),
                                "cycle panicked"
                            );
                        }
                    }
                    if token.wait(cadence.delay_after(started.elapsed())) {
                        break;
                    }
                }
                info!(worker = %thread_name, "worker stopped");
            })?;

        Ok(Self {
            name,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Cancel and wait for the thread to exit
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!(worker = %self.name, "worker thread panicked outside a cycle");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
