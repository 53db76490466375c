// SPDX-License-Identifier: GPL-3.0-only

//! Rate-limited preview thumbnails
//!
//! Frames are offered from the renderer thread. At most one conversion is in
//! flight; offers that arrive while the worker is busy, or sooner than the
//! configured interval after the last accepted one, are dropped.

use crate::media::yuv::{downscale, nv21_to_rgb};
use image::RgbImage;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Receiver of downscaled preview images
pub trait ThumbnailSink: Send + Sync {
    fn update_preview(&self, image: RgbImage);
}

struct ThumbnailJob {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

/// Single background worker turning NV21 frames into thumbnails
pub struct ThumbnailWorker {
    tx: Option<mpsc::Sender<ThumbnailJob>>,
    handle: Option<JoinHandle<()>>,
    interval: Duration,
    last_accepted: Mutex<Option<Instant>>,
}

impl ThumbnailWorker {
    /// Start the worker thread
    pub fn spawn(
        sink: Arc<dyn ThumbnailSink>,
        interval: Duration,
        divisor: u32,
    ) -> std::io::Result<Self> {
        let (tx, mut rx) = mpsc::channel::<ThumbnailJob>(1);

        let handle = thread::Builder::new()
            .name("thumbnail".to_string())
            .spawn(move || {
                while let Some(job) = rx.blocking_recv() {
                    let image = match nv21_to_rgb(&job.data, job.width, job.height) {
                        Ok(image) => downscale(&image, divisor),
                        Err(e) => {
                            debug!(error = %e, "Skipping thumbnail");
                            continue;
                        }
                    };
                    let delivered =
                        panic::catch_unwind(AssertUnwindSafe(|| sink.update_preview(image)));
                    if delivered.is_err() {
                        warn!("Thumbnail sink panicked");
                    }
                }
                debug!("Thumbnail worker exiting");
            })?;

        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            interval,
            last_accepted: Mutex::new(None),
        })
    }

    /// Offer a frame; returns true if it was queued for conversion
    pub fn offer(&self, frame: &[u8], width: u32, height: u32) -> bool {
        let now = Instant::now();
        let mut last = self
            .last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.is_some_and(|t| now.duration_since(t) < self.interval) {
            return false;
        }

        let Some(tx) = self.tx.as_ref() else {
            return false;
        };
        // Busy worker means this frame is skipped, never queued behind
        let Ok(permit) = tx.try_reserve() else {
            return false;
        };
        permit.send(ThumbnailJob {
            data: frame.to_vec(),
            width,
            height,
        });
        *last = Some(now);
        true
    }
}

impl Drop for ThumbnailWorker {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.tx.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Thumbnail worker thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::yuv420_frame_size;

    #[derive(Default)]
    struct CollectingSink {
        images: Mutex<Vec<(u32, u32)>>,
    }

    impl ThumbnailSink for CollectingSink {
        fn update_preview(&self, image: RgbImage) {
            self.images.lock().unwrap().push(image.dimensions());
        }
    }

    fn wait_for(sink: &CollectingSink, count: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while sink.images.lock().unwrap().len() < count && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_downscaled_thumbnail_delivered() {
        let sink = Arc::new(CollectingSink::default());
        let worker = ThumbnailWorker::spawn(sink.clone(), Duration::ZERO, 4).unwrap();
        let frame = vec![128u8; yuv420_frame_size(64, 32)];

        assert!(worker.offer(&frame, 64, 32));
        wait_for(&sink, 1);
        assert_eq!(sink.images.lock().unwrap()[0], (16, 8));
    }

    #[test]
    fn test_offers_within_interval_dropped() {
        let sink = Arc::new(CollectingSink::default());
        let worker = ThumbnailWorker::spawn(sink.clone(), Duration::from_secs(60), 4).unwrap();
        let frame = vec![128u8; yuv420_frame_size(8, 8)];

        assert!(worker.offer(&frame, 8, 8));
        assert!(!worker.offer(&frame, 8, 8));
        assert!(!worker.offer(&frame, 8, 8));
        wait_for(&sink, 1);
        drop(worker);
        assert_eq!(sink.images.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_bad_frame_is_skipped() {
        let sink = Arc::new(CollectingSink::default());
        let worker = ThumbnailWorker::spawn(sink.clone(), Duration::ZERO, 4).unwrap();
        assert!(worker.offer(&[0u8; 4], 8, 8));
        drop(worker);
        assert!(sink.images.lock().unwrap().is_empty());
    }
}
