// SPDX-License-Identifier: GPL-3.0-only

//! Replacement frames back into the application's preview path
//!
//! The renderer is the single writer of one reusable NV21 buffer. Each
//! published frame is fanned out, in order, to:
//!
//! 1. the legacy preview callback the application registered (with the
//!    owning camera instance),
//! 2. the modern-generation frame consumer, if any,
//! 3. the rate-limited thumbnail worker.
//!
//! Still captures pull from the same buffer through [`FrameBridge::snapshot`].
//!
//! Resizing the buffer and toggling its validity happen under the same mutex
//! the writer holds, so no reader ever sees a resized-but-unwritten frame.
//! Consumers get a copy of the published frame and run without that mutex,
//! so they may query the bridge from inside a callback.

pub mod capture;
pub mod thumbnail;

pub use capture::{CapturePolicy, PictureCallback, spawn_still_capture};
pub use thumbnail::{ThumbnailSink, ThumbnailWorker};

use crate::constants::{checked_yuv420_frame_size, yuv420_frame_size};
use crate::engine::handles::{InstanceHandle, WeakInstance};
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Error an application callback may report
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Legacy-generation preview callback registered by the application
///
/// Runs on the renderer thread. It may call [`FrameBridge::snapshot`] and
/// friends, but must not publish a frame itself.
pub trait LegacyPreviewCallback: Send + Sync {
    fn on_preview_frame(&self, data: &[u8], instance: &InstanceHandle) -> Result<(), CallbackError>;
}

/// Modern-generation frame consumer, same threading rules as
/// [`LegacyPreviewCallback`]
pub trait FrameConsumer: Send + Sync {
    fn on_frame(&self, data: &[u8], width: u32, height: u32) -> Result<(), CallbackError>;
}

/// Immutable copy of a complete frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSnapshot {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Default)]
struct FrameBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    valid: bool,
}

#[derive(Clone)]
struct LegacySlot {
    callback: Arc<dyn LegacyPreviewCallback>,
    instance: WeakInstance,
}

/// Exclusive write access to the shared buffer
///
/// Taking a writer invalidates the current frame; it becomes valid again
/// only through [`FrameBridge::publish`] after the writer is dropped.
pub struct FrameWriter<'a> {
    guard: MutexGuard<'a, FrameBuffer>,
}

impl Deref for FrameWriter<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard.data
    }
}

impl DerefMut for FrameWriter<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.guard.data
    }
}

/// Owner of the replacement frame buffer and its consumers
#[derive(Default)]
pub struct FrameBridge {
    buffer: Mutex<FrameBuffer>,
    /// Copy of the last published frame handed to consumers
    delivery: Mutex<Vec<u8>>,
    legacy: Mutex<Option<LegacySlot>>,
    modern: Mutex<Option<Arc<dyn FrameConsumer>>>,
    thumbnails: Mutex<Option<ThumbnailWorker>>,
    published: AtomicU64,
}

impl FrameBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_buffer(&self) -> MutexGuard<'_, FrameBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resize the buffer if the expected size changed
    pub fn ensure_buffer(&self, size: usize) {
        let mut buffer = self.lock_buffer();
        if buffer.data.len() == size {
            return;
        }
        debug!(old = buffer.data.len(), new = size, "Resizing frame buffer");
        buffer.valid = false;
        buffer.data = vec![0u8; size];
    }

    /// Current buffer size in bytes
    pub fn buffer_len(&self) -> usize {
        self.lock_buffer().data.len()
    }

    /// Exclusive access for the renderer; invalidates the current frame
    pub fn writer(&self) -> FrameWriter<'_> {
        let mut guard = self.lock_buffer();
        guard.valid = false;
        FrameWriter { guard }
    }

    pub fn has_valid_frame(&self) -> bool {
        self.lock_buffer().valid
    }

    /// Frames successfully published so far
    pub fn published_frames(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Size, write and publish one frame
    pub fn write_frame(&self, width: u32, height: u32, fill: impl FnOnce(&mut [u8])) -> bool {
        let Some(size) = checked_yuv420_frame_size(width, height) else {
            debug!(width, height, "Frame size overflows, dropping frame");
            return false;
        };
        self.ensure_buffer(size);
        {
            let mut writer = self.writer();
            fill(&mut writer);
        }
        self.publish(width, height)
    }

    /// Mark the written frame complete and fan it out
    ///
    /// Returns false if the buffer cannot hold a `width`x`height` frame, in
    /// which case the frame stays invalid and nobody is notified.
    pub fn publish(&self, width: u32, height: u32) -> bool {
        // Lock order: delivery, then buffer
        let mut delivery = self.delivery.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut buffer = self.lock_buffer();
            buffer.width = width;
            buffer.height = height;

            let fits = checked_yuv420_frame_size(width, height)
                .filter(|&expected| expected > 0 && expected <= buffer.data.len());
            let Some(expected) = fits else {
                debug!(
                    width,
                    height,
                    len = buffer.data.len(),
                    "Published frame does not fit the buffer"
                );
                buffer.valid = false;
                return false;
            };
            buffer.valid = true;
            delivery.clear();
            delivery.extend_from_slice(&buffer.data[..expected]);
        }
        self.published.fetch_add(1, Ordering::Relaxed);

        let frame = delivery.as_slice();
        self.deliver_legacy(frame);
        self.deliver_modern(frame, width, height);
        if let Some(worker) = self
            .thumbnails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            worker.offer(frame, width, height);
        }
        true
    }

    fn deliver_legacy(&self, frame: &[u8]) {
        let slot = self
            .legacy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(slot) = slot else {
            return;
        };

        let Some(instance) = slot.instance.upgrade() else {
            debug!(instance = %slot.instance.id(), "Preview callback owner is gone, dropping callback");
            self.clear_legacy_callback_for_id(&slot.instance);
            return;
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            slot.callback.on_preview_frame(frame, &instance)
        }));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Legacy preview callback failed"),
            Err(_) => warn!("Legacy preview callback panicked"),
        }
    }

    fn deliver_modern(&self, frame: &[u8], width: u32, height: u32) {
        let consumer = self
            .modern
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(consumer) = consumer else {
            return;
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| consumer.on_frame(frame, width, height)));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Frame consumer failed"),
            Err(_) => warn!("Frame consumer panicked"),
        }
    }

    /// Copy of the current valid frame, or None if no complete frame exists
    pub fn snapshot(&self) -> Option<FrameSnapshot> {
        let buffer = self.lock_buffer();
        if !buffer.valid {
            return None;
        }
        let size = yuv420_frame_size(buffer.width, buffer.height);
        Some(FrameSnapshot {
            data: buffer.data[..size].to_vec(),
            width: buffer.width,
            height: buffer.height,
        })
    }

    /// Register (or clear with None) the legacy preview callback
    pub fn set_legacy_callback(
        &self,
        callback: Option<Arc<dyn LegacyPreviewCallback>>,
        instance: &InstanceHandle,
    ) {
        *self.legacy.lock().unwrap_or_else(PoisonError::into_inner) =
            callback.map(|callback| LegacySlot {
                callback,
                instance: instance.downgrade(),
            });
    }

    /// Drop the legacy callback if it belongs to this instance
    pub fn clear_legacy_callback_for(&self, instance: &InstanceHandle) {
        self.clear_legacy_callback_for_id(&instance.downgrade());
    }

    fn clear_legacy_callback_for_id(&self, instance: &WeakInstance) {
        let mut slot = self.legacy.lock().unwrap_or_else(PoisonError::into_inner);
        if slot
            .as_ref()
            .is_some_and(|s| s.instance.id() == instance.id())
        {
            *slot = None;
        }
    }

    pub fn has_legacy_callback(&self) -> bool {
        self.legacy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn set_modern_consumer(&self, consumer: Option<Arc<dyn FrameConsumer>>) {
        *self.modern.lock().unwrap_or_else(PoisonError::into_inner) = consumer;
    }

    pub fn set_thumbnail_worker(&self, worker: Option<ThumbnailWorker>) {
        *self.thumbnails.lock().unwrap_or_else(PoisonError::into_inner) = worker;
    }
}
