// SPDX-License-Identifier: GPL-3.0-only

//! Software stand-in for the native renderer
//!
//! Produces a moving NV21 test pattern at the registered target size and
//! publishes it through the [`FrameBridge`]. Frames flow only while a media
//! source is loaded, a target is registered and the renderer is started.

use super::render_loop::{LoopAction, RenderLoopController};
use super::{
    CameraParameters, MediaSource, RendererGateway, TargetInfo, TargetRegistration,
    TransformMatrix,
};
use crate::bridge::FrameBridge;
use crate::config::NativeConfig;
use crate::constants::pixel_format;
use crate::engine::handles::{Target, TargetId};
use crate::engine::session::Orientation;
use crate::errors::GatewayError;
use crate::media::yuv::write_test_pattern;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct RenderState {
    frame_size: Option<(u32, u32)>,
    source_loaded: bool,
    frame_index: u64,
    display_orientation: Orientation,
    config: NativeConfig,
    external_matrix: Option<TransformMatrix>,
}

/// Renderer that draws a test pattern instead of decoded video
pub struct SyntheticRenderer {
    state: Arc<Mutex<RenderState>>,
    infos: Mutex<HashMap<TargetId, TargetInfo>>,
    default_info: TargetInfo,
    controller: Mutex<RenderLoopController>,
}

/// NV21 needs even dimensions
fn even_frame_size(width: u32, height: u32) -> (u32, u32) {
    ((width & !1).max(2), (height & !1).max(2))
}

impl SyntheticRenderer {
    /// Create a renderer publishing into `bridge` at `fps` frames per second
    pub fn new(bridge: Arc<FrameBridge>, fps: u32) -> Self {
        let state = Arc::new(Mutex::new(RenderState::default()));
        let loop_state = Arc::clone(&state);
        let interval = Duration::from_secs(1) / fps.max(1);

        let controller = RenderLoopController::start("synthetic-renderer", interval, move || {
            let (width, height, index) = {
                let mut state = loop_state.lock().unwrap_or_else(PoisonError::into_inner);
                let Some((width, height)) = state.frame_size.filter(|_| state.source_loaded)
                else {
                    return LoopAction::Continue;
                };
                state.frame_index += 1;
                (width, height, state.frame_index)
            };
            bridge.write_frame(width, height, |buf| {
                write_test_pattern(buf, width, height, index)
            });
            LoopAction::Continue
        });

        Self {
            state,
            infos: Mutex::new(HashMap::new()),
            default_info: TargetInfo::new(1280, 720, pixel_format::OPAQUE),
            controller: Mutex::new(controller),
        }
    }

    /// Info reported for targets without an explicit entry
    pub fn with_default_info(mut self, info: TargetInfo) -> Self {
        self.default_info = info;
        self
    }

    pub fn set_target_info(&self, target: &Target, info: TargetInfo) {
        self.infos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target.id(), info);
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RenderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_producing(&self) -> bool {
        self.controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_producing()
    }

    /// Frames drawn so far
    pub fn frames_rendered(&self) -> u64 {
        self.lock_state().frame_index
    }

    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.lock_state().frame_size
    }

    pub fn display_orientation(&self) -> Orientation {
        self.lock_state().display_orientation
    }

    pub fn native_config(&self) -> NativeConfig {
        self.lock_state().config
    }

    /// Last texture transform received, if any
    pub fn external_matrix(&self) -> Option<TransformMatrix> {
        self.lock_state().external_matrix
    }

    /// Stop the frame thread for good
    pub fn shutdown(&self) {
        self.controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop();
    }
}

impl RendererGateway for SyntheticRenderer {
    fn register_target(&self, registration: &TargetRegistration) {
        let size = even_frame_size(registration.width, registration.height);
        info!(
            target = %registration.target.id(),
            width = size.0,
            height = size.1,
            "Synthetic renderer bound to target"
        );
        let mut state = self.lock_state();
        state.frame_size = Some(size);
        state.display_orientation = registration.display_orientation;
    }

    fn unregister_target(&self) {
        debug!("Synthetic renderer unbound");
        self.lock_state().frame_size = None;
    }

    fn query_target_info(&self, target: &Target) -> Result<TargetInfo, GatewayError> {
        if !target.is_valid() {
            return Err(GatewayError::InvalidTarget);
        }
        Ok(self
            .infos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target.id())
            .copied()
            .unwrap_or(self.default_info))
    }

    fn request_renderer_start(&self) {
        self.controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resume();
    }

    fn request_renderer_stop(&self) {
        self.controller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pause();
    }

    fn load_replacement_source(&self, source: &MediaSource) -> bool {
        let loaded = source.length > 0;
        debug!(offset = source.offset, length = source.length, loaded, "Loading media");
        self.lock_state().source_loaded = loaded;
        loaded
    }

    fn reset_replacement_source(&self) {
        self.lock_state().source_loaded = false;
    }

    fn update_display_orientation(&self, orientation: Orientation) {
        self.lock_state().display_orientation = orientation;
    }

    fn update_camera_parameters(&self, parameters: &CameraParameters) {
        debug!(
            camera_id = %parameters.camera_id,
            width = parameters.width,
            height = parameters.height,
            "Synthetic renderer parameters"
        );
    }

    fn update_native_config(&self, config: &NativeConfig) {
        self.lock_state().config = *config;
    }

    fn update_external_matrix(&self, matrix: &TransformMatrix) {
        self.lock_state().external_matrix = Some(*matrix);
    }
}

impl Drop for SyntheticRenderer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::session::ApiGeneration;
    use std::io::Write;
    use std::thread;
    use std::time::Instant;

    fn loaded_source() -> MediaSource {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(b"not really a video").unwrap();
        MediaSource {
            file,
            offset: 0,
            length: 18,
        }
    }

    fn registration(target: &Target, width: u32, height: u32) -> TargetRegistration {
        TargetRegistration {
            api_generation: ApiGeneration::Modern,
            camera_id: "0".into(),
            sensor_orientation: Orientation::Deg90,
            width,
            height,
            display_orientation: Orientation::Deg0,
            target: target.clone(),
        }
    }

    #[test]
    fn test_frames_flow_only_when_started() {
        let bridge = Arc::new(FrameBridge::new());
        let renderer = SyntheticRenderer::new(bridge.clone(), 200);
        let target = Target::new();

        assert!(renderer.load_replacement_source(&loaded_source()));
        renderer.register_target(&registration(&target, 33, 16));
        assert_eq!(renderer.frame_size(), Some((32, 16)));

        thread::sleep(Duration::from_millis(30));
        assert!(!bridge.has_valid_frame());

        renderer.request_renderer_start();
        let deadline = Instant::now() + Duration::from_secs(2);
        while !bridge.has_valid_frame() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let frame = bridge.snapshot().unwrap();
        assert_eq!((frame.width, frame.height), (32, 16));
        assert!(renderer.frames_rendered() > 0);

        renderer.request_renderer_stop();
        assert!(!renderer.is_producing());
    }

    #[test]
    fn test_query_target_info() {
        let bridge = Arc::new(FrameBridge::new());
        let renderer = SyntheticRenderer::new(bridge, 30)
            .with_default_info(TargetInfo::new(640, 480, pixel_format::OPAQUE));
        let target = Target::new();
        let raw = Target::new();
        renderer.set_target_info(&raw, TargetInfo::new(320, 240, pixel_format::RAW_SINGLE_PLANE));

        assert_eq!(renderer.query_target_info(&target).unwrap().width, 640);
        assert!(renderer.query_target_info(&raw).unwrap().is_raw());
        target.release();
        assert_eq!(
            renderer.query_target_info(&target),
            Err(GatewayError::InvalidTarget)
        );
    }

    #[test]
    fn test_empty_media_is_not_playable() {
        let renderer = SyntheticRenderer::new(Arc::new(FrameBridge::new()), 30);
        let source = MediaSource {
            file: tempfile::tempfile().unwrap(),
            offset: 0,
            length: 0,
        };
        assert!(!renderer.load_replacement_source(&source));
    }
}
