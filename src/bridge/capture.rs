// SPDX-License-Identifier: GPL-3.0-only

//! Still-capture emulation
//!
//! A capture request never touches the real camera. A short-lived worker
//! waits for a complete replacement frame, encodes it as JPEG and posts the
//! application's completion onto the main context. The completion always runs
//! exactly once; with no frame available it receives empty bytes.

use super::{FrameBridge, FrameSnapshot};
use crate::config::Settings;
use crate::constants::bridge;
use crate::engine::handles::{InstanceHandle, WeakInstance};
use crate::main_context::MainContext;
use crate::media::yuv::nv21_to_jpeg;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Completion for an emulated still capture
pub trait PictureCallback: Send + Sync {
    /// `jpeg` is empty if no frame could be captured
    fn on_picture_taken(&self, jpeg: &[u8], instance: Option<&InstanceHandle>);
}

/// Retry budget and encoding quality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturePolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub jpeg_quality: u8,
}

impl Default for CapturePolicy {
    fn default() -> Self {
        Self {
            attempts: bridge::CAPTURE_RETRY_ATTEMPTS,
            delay: bridge::CAPTURE_RETRY_DELAY,
            jpeg_quality: bridge::CAPTURE_JPEG_QUALITY,
        }
    }
}

impl CapturePolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            attempts: settings.capture_retry_attempts.max(1),
            delay: settings.capture_retry_delay(),
            jpeg_quality: settings.capture_jpeg_quality,
        }
    }

    /// Upper bound on how long a capture waits for a frame
    pub fn max_wait(&self) -> Duration {
        self.delay * self.attempts.saturating_sub(1)
    }
}

/// Poll for a valid frame, sleeping only between attempts
pub fn snapshot_with_retry(bridge: &FrameBridge, policy: &CapturePolicy) -> Option<FrameSnapshot> {
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        if let Some(snapshot) = bridge.snapshot() {
            debug!(attempt, "Captured replacement frame");
            return Some(snapshot);
        }
        if attempt < attempts {
            thread::sleep(policy.delay);
        }
    }
    None
}

fn capture_jpeg(bridge: &FrameBridge, policy: &CapturePolicy) -> Vec<u8> {
    let Some(frame) = snapshot_with_retry(bridge, policy) else {
        warn!(attempts = policy.attempts, "No replacement frame for still capture");
        return Vec::new();
    };
    match nv21_to_jpeg(&frame.data, frame.width, frame.height, policy.jpeg_quality) {
        Ok(jpeg) => jpeg,
        Err(e) => {
            warn!(error = %e, "Still capture encoding failed");
            Vec::new()
        }
    }
}

fn post_completion(
    main: &MainContext,
    callback: Option<Arc<dyn PictureCallback>>,
    instance: Option<WeakInstance>,
    jpeg: Vec<u8>,
) {
    let Some(callback) = callback else {
        return;
    };
    main.post(move || {
        let instance = instance.as_ref().and_then(WeakInstance::upgrade);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            callback.on_picture_taken(&jpeg, instance.as_ref())
        }));
        if result.is_err() {
            warn!("Picture callback panicked");
        }
    });
}

/// Run one emulated capture in the background
///
/// The callback, if any, is posted to `main` exactly once.
pub fn spawn_still_capture(
    bridge: Arc<FrameBridge>,
    main: MainContext,
    policy: CapturePolicy,
    callback: Option<Arc<dyn PictureCallback>>,
    instance: Option<WeakInstance>,
) {
    info!(attempts = policy.attempts, "Emulating still capture");

    // The worker owns a clone of everything; on spawn failure the originals
    // deliver the empty completion instead
    let worker_main = main.clone();
    let worker_callback = callback.clone();
    let worker_instance = instance.clone();
    let spawned = thread::Builder::new()
        .name("still-capture".to_string())
        .spawn(move || {
            let jpeg = capture_jpeg(&bridge, &policy);
            debug!(bytes = jpeg.len(), "Still capture finished");
            post_completion(&worker_main, worker_callback, worker_instance, jpeg);
        });

    if let Err(e) = spawned {
        warn!(error = %e, "Failed to spawn still capture worker");
        post_completion(&main, callback, instance, Vec::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::main_context;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        results: Mutex<Vec<(usize, bool)>>,
    }

    impl PictureCallback for Recorder {
        fn on_picture_taken(&self, jpeg: &[u8], instance: Option<&InstanceHandle>) {
            self.results
                .lock()
                .unwrap()
                .push((jpeg.len(), instance.is_some()));
        }
    }

    fn quick_policy() -> CapturePolicy {
        CapturePolicy {
            attempts: 3,
            delay: Duration::from_millis(5),
            jpeg_quality: 90,
        }
    }

    #[test]
    fn test_policy_from_settings() {
        let settings = Settings {
            capture_retry_attempts: 0,
            capture_retry_delay_ms: 10,
            capture_jpeg_quality: 75,
            ..Default::default()
        };
        let policy = CapturePolicy::from_settings(&settings);
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.delay, Duration::from_millis(10));
        assert_eq!(policy.jpeg_quality, 75);
        assert_eq!(CapturePolicy::default().max_wait(), Duration::from_millis(150));
    }

    #[test]
    fn test_retry_gives_up_without_frame() {
        let bridge = FrameBridge::new();
        assert!(snapshot_with_retry(&bridge, &quick_policy()).is_none());
    }

    #[test]
    fn test_capture_delivers_jpeg_once() {
        let bridge = Arc::new(FrameBridge::new());
        bridge.write_frame(16, 16, |buf| buf.fill(128));
        let (main, mut main_loop) = main_context::channel();
        let recorder = Arc::new(Recorder::default());
        let instance = InstanceHandle::new();

        spawn_still_capture(
            bridge,
            main,
            quick_policy(),
            Some(recorder.clone()),
            Some(instance.downgrade()),
        );
        assert!(main_loop.blocking_run_next());
        assert!(!main_loop.blocking_run_next());

        let results = recorder.results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].0 > 0);
        assert!(results[0].1);
    }

    #[test]
    fn test_capture_without_frame_delivers_empty() {
        let bridge = Arc::new(FrameBridge::new());
        let (main, mut main_loop) = main_context::channel();
        let recorder = Arc::new(Recorder::default());

        spawn_still_capture(bridge, main, quick_policy(), Some(recorder.clone()), None);
        assert!(main_loop.blocking_run_next());

        let results = recorder.results.lock().unwrap();
        assert_eq!(*results, vec![(0, false)]);
    }
}
