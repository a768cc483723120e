//! Background driver for periodic reconciliation.
//!
//! # Responsibility
//! - Call `AttendanceDesk::tick` at a fixed interval on a named thread.
//!
//! # Invariants
//! - The first tick fires immediately after start.
//! - `stop()` wakes a sleeping thread and joins it; no tick starts after
//!   the cancel flag is observed.
//! - A failing tick is logged and never ends the loop.

use crate::repo::AttendanceStore;
use crate::service::attendance_desk::AttendanceDesk;
use crate::service::reconciliation::TickOutcome;
use log::{debug, error, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub struct ReconciliationTicker {
    label: String,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReconciliationTicker {
    /// Spawns the ticking thread for `desk`.
    ///
    /// # Errors
    /// Returns the OS error when the thread cannot be spawned.
    pub fn start<S>(
        desk: Arc<AttendanceDesk<S>>,
        interval: Duration,
        label: &str,
    ) -> std::io::Result<Self>
    where
        S: AttendanceStore + 'static,
    {
        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);
        let thread_label = label.to_string();
        let handle = thread::Builder::new()
            .name(format!("{label}-reconcile"))
            .spawn(move || run(&desk, interval, &thread_cancel, &thread_label))?;
        info!(
            "event=ticker_start module=ticker status=ok label={} interval_ms={}",
            label,
            interval.as_millis()
        );
        Ok(Self {
            label: label.to_string(),
            cancel,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signals the thread and waits for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.cancel.store(true, Ordering::Release);
        handle.thread().unpark();
        if handle.join().is_err() {
            error!(
                "event=ticker_stop module=ticker status=error label={} reason=thread_panicked",
                self.label
            );
            return;
        }
        info!("event=ticker_stop module=ticker status=ok label={}", self.label);
    }
}

impl Drop for ReconciliationTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run<S: AttendanceStore>(
    desk: &AttendanceDesk<S>,
    interval: Duration,
    cancel: &AtomicBool,
    label: &str,
) {
    while !cancel.load(Ordering::Acquire) {
        match desk.tick(desk.now()) {
            Ok(TickOutcome::Ran(_)) => {}
            Ok(TickOutcome::SkippedBusy) => {
                debug!("event=ticker_tick module=ticker status=skip label={label} reason=busy");
            }
            Err(err) => {
                error!("event=ticker_tick module=ticker status=error label={label} error={err}");
            }
        }
        sleep_until_cancelled(interval, cancel);
    }
}

fn sleep_until_cancelled(interval: Duration, cancel: &AtomicBool) {
    // An interval past the platform clock range waits for cancellation only.
    let deadline = Instant::now().checked_add(interval);
    while !cancel.load(Ordering::Acquire) {
        let Some(deadline) = deadline else {
            thread::park();
            continue;
        };
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        // Spurious wakeups just loop back to the deadline check.
        thread::park_timeout(deadline - now);
    }
}
