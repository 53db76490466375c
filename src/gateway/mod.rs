// SPDX-License-Identifier: MPL-2.0

//! Native renderer gateway
//!
//! The rendering engine that decodes the replacement media and draws it into
//! the host's targets lives outside this crate. This module defines the
//! contract the engine uses to drive it:
//!
//! ```text
//! ┌──────────────────────┐   register/start/stop   ┌───────────────────┐
//! │ InterceptionDispatch │ ──────────────────────▶ │  RendererGateway  │
//! └──────────────────────┘                         └─────────┬─────────┘
//!            ▲                                               │ writes NV21
//!            │ preview callbacks                             ▼
//!            │                                     ┌───────────────────┐
//!            └──────────────────────────────────── │    FrameBridge    │
//!                                                  └───────────────────┘
//! ```
//!
//! # Implementations
//!
//! - [`recording::RecordingGateway`]: records every call, used by tests
//! - [`synthetic::SyntheticRenderer`]: software frame producer, used by the CLI

pub mod recording;
pub mod render_loop;
pub mod synthetic;

pub use recording::{GatewayCall, RecordingGateway};
pub use synthetic::SyntheticRenderer;

use crate::config::NativeConfig;
use crate::constants::pixel_format;
use crate::engine::handles::Target;
use crate::engine::session::{ApiGeneration, Orientation};
use crate::errors::GatewayError;
use std::fs::File;
use std::sync::Arc;

/// Geometry and layout of a rendering target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetInfo {
    pub width: u32,
    pub height: u32,
    pub format: i32,
}

impl TargetInfo {
    pub fn new(width: u32, height: u32, format: i32) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_opaque(&self) -> bool {
        self.format == pixel_format::OPAQUE
    }

    pub fn is_raw(&self) -> bool {
        self.format == pixel_format::RAW_SINGLE_PLANE
    }
}

/// Everything the renderer needs to draw into a target
#[derive(Debug, Clone)]
pub struct TargetRegistration {
    pub api_generation: ApiGeneration,
    pub camera_id: String,
    pub sensor_orientation: Orientation,
    pub width: u32,
    pub height: u32,
    pub display_orientation: Orientation,
    pub target: Target,
}

/// Camera geometry pushed outside of a registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraParameters {
    pub camera_id: String,
    pub sensor_orientation: Orientation,
    pub width: u32,
    pub height: u32,
}

/// An opened replacement media: a file plus the byte range holding it
#[derive(Debug)]
pub struct MediaSource {
    pub file: File,
    pub offset: u64,
    pub length: u64,
}

/// Contract with the native rendering engine
///
/// Every method may be called from any host thread. Implementations must not
/// call back into the engine synchronously from these methods.
pub trait RendererGateway: Send + Sync {
    /// Replace the currently rendered-to target
    fn register_target(&self, registration: &TargetRegistration);

    /// Stop rendering into any target
    fn unregister_target(&self);

    /// True width, height and pixel format of a target
    fn query_target_info(&self, target: &Target) -> Result<TargetInfo, GatewayError>;

    fn request_renderer_start(&self);

    fn request_renderer_stop(&self);

    /// Load the replacement media; returns false if it cannot be played
    fn load_replacement_source(&self, source: &MediaSource) -> bool;

    /// Drop the loaded replacement media
    fn reset_replacement_source(&self);

    /// Preview rotation changed on the active instance
    fn update_display_orientation(&self, orientation: Orientation);

    /// Capture geometry changed on the active instance
    fn update_camera_parameters(&self, parameters: &CameraParameters);

    /// Renderer-side switches from the settings
    fn update_native_config(&self, config: &NativeConfig);

    /// Transform the application applies to its preview texture
    fn update_external_matrix(&self, matrix: &TransformMatrix);
}

/// Shared gateway handle
pub type SharedGateway = Arc<dyn RendererGateway>;

/// Column-major 4x4 texture transform, as graphics APIs hand it out
pub type TransformMatrix = [f32; 16];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_info_format_checks() {
        let opaque = TargetInfo::new(1920, 1080, 34);
        assert!(opaque.is_opaque());
        assert!(!opaque.is_raw());
        assert_eq!(opaque.area(), 2_073_600);

        let raw = TargetInfo::new(640, 480, 1);
        assert!(raw.is_raw());
    }
}
