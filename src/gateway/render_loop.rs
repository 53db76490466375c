// SPDX-License-Identifier: GPL-3.0-only
//! Paced frame-production thread
//!
//! The renderer produces frames on its own thread at a fixed cadence. Start
//! and stop requests from the hooks only pause and resume the loop, so the
//! thread survives any number of preview restarts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Action returned by the loop body to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a paced loop running in a separate thread
///
/// # Example
///
/// ```ignore
/// let controller = RenderLoopController::start("synthetic", Duration::from_millis(33), || {
///     produce_frame();
///     LoopAction::Continue
/// });
/// controller.pause();
/// controller.resume();
/// ```
pub struct RenderLoopController {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
    name: String,
}

impl RenderLoopController {
    /// Start a paused loop calling `loop_fn` once per `frame_interval`
    pub fn start<F>(name: &str, frame_interval: Duration, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let paused = Arc::new(AtomicBool::new(true));
        let stop_clone = Arc::clone(&stop_signal);
        let paused_clone = Arc::clone(&paused);
        let name_clone = name.to_string();

        info!(name = %name, interval_ms = frame_interval.as_millis() as u64, "Starting render loop");

        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(name = %name_clone, "Render loop thread started");

                while !stop_clone.load(Ordering::SeqCst) {
                    let tick = Instant::now();

                    if !paused_clone.load(Ordering::SeqCst) && loop_fn() == LoopAction::Stop {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }

                    if let Some(rest) = frame_interval.checked_sub(tick.elapsed()) {
                        thread::sleep(rest);
                    }
                }

                info!(name = %name_clone, "Render loop thread exiting");
            });

        let thread_handle = match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(name = %name, error = %e, "Failed to spawn render loop thread");
                None
            }
        };

        Self {
            thread_handle,
            stop_signal,
            paused,
            name: name.to_string(),
        }
    }

    /// Check if the thread is still alive
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Check if frames are currently being produced
    pub fn is_producing(&self) -> bool {
        self.is_running() && !self.paused.load(Ordering::SeqCst)
    }

    pub fn resume(&self) {
        debug!(name = %self.name, "Resuming render loop");
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        debug!(name = %self.name, "Pausing render loop");
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        if let Some(handle) = self.thread_handle.take() {
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Render loop thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Render loop thread finished");
            }
        }
    }
}

impl Drop for RenderLoopController {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_paused_loop_does_not_produce() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let mut controller =
            RenderLoopController::start("test-paused", Duration::from_millis(5), move || {
                counter_clone.fetch_add(1, Ordering::SeqCst);
                LoopAction::Continue
            });

        thread::sleep(Duration::from_millis(40));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(controller.is_running());
        assert!(!controller.is_producing());

        controller.resume();
        thread::sleep(Duration::from_millis(40));
        controller.stop();
        assert!(counter.load(Ordering::SeqCst) > 0);
    }

    #[test]
    fn test_loop_can_stop_itself() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let controller =
            RenderLoopController::start("test-self-stop", Duration::from_millis(1), move || {
                if counter_clone.fetch_add(1, Ordering::SeqCst) >= 3 {
                    LoopAction::Stop
                } else {
                    LoopAction::Continue
                }
            });
        controller.resume();

        let deadline = Instant::now() + Duration::from_secs(2);
        while controller.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!controller.is_running());
        assert_eq!(counter.load(Ordering::SeqCst), 4);
    }
}
