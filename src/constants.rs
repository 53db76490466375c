// SPDX-License-Identifier: GPL-3.0-only

//! Engine-wide constants

use std::time::Duration;

/// Pixel format codes a rendering target may declare
pub mod pixel_format {
    /// Raw single-plane RGBA layout, used by auxiliary/analysis streams
    pub const RAW_SINGLE_PLANE: i32 = 1;

    /// Opaque implementation-defined layout (0x22), used by preview streams
    pub const OPAQUE: i32 = 34;

    /// Human readable name for a format code
    pub fn name(format: i32) -> &'static str {
        match format {
            RAW_SINGLE_PLANE => "RGBA_8888",
            OPAQUE => "IMPLEMENTATION_DEFINED",
            _ => "UNKNOWN",
        }
    }
}

/// Session defaults used until the host tells us otherwise
pub mod session {
    /// Camera id before any open call has been observed
    pub const UNKNOWN_CAMERA_ID: &str = "-1";

    /// Camera id assumed by the legacy open call without arguments
    pub const LEGACY_DEFAULT_CAMERA_ID: &str = "0";

    /// Default picture width (portrait 1080p)
    pub const DEFAULT_PICTURE_WIDTH: u32 = 1080;

    /// Default picture height (portrait 1080p)
    pub const DEFAULT_PICTURE_HEIGHT: u32 = 1920;

    /// Sensor orientation assumed when legacy camera metadata is unavailable
    pub const LEGACY_FALLBACK_SENSOR_ORIENTATION: u32 = 0;

    /// Sensor orientation assumed when modern camera characteristics are unavailable
    pub const MODERN_FALLBACK_SENSOR_ORIENTATION: u32 = 90;

    /// Display rotation assumed when the window service is unavailable
    pub const FALLBACK_DISPLAY_ORIENTATION: u32 = 0;
}

/// Timing and sizing defaults for the frame bridge
pub mod bridge {
    use super::Duration;

    /// Minimum interval between two thumbnail conversions
    pub const THUMBNAIL_INTERVAL: Duration = Duration::from_millis(200);

    /// Thumbnails are downscaled by this divisor on each axis
    pub const THUMBNAIL_SCALE_DIVISOR: u32 = 4;

    /// Snapshot attempts made by the still-capture worker
    pub const CAPTURE_RETRY_ATTEMPTS: u32 = 6;

    /// Sleep between two snapshot attempts
    pub const CAPTURE_RETRY_DELAY: Duration = Duration::from_millis(30);

    /// JPEG quality used for emulated still captures
    pub const CAPTURE_JPEG_QUALITY: u8 = 90;
}

/// Window in which repeated non-explicit parameter updates are dropped
pub const PARAM_THROTTLE_WINDOW: Duration = Duration::from_millis(250);

/// Name of the settings directory under the user config dir
pub const APP_DIR_NAME: &str = "camera-swap";

/// Settings file name inside the settings directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Size in bytes of a 4:2:0 frame, or None if it overflows `usize`
pub fn checked_yuv420_frame_size(width: u32, height: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)
        .map(|n| n / 2)
}

/// Size in bytes of a 4:2:0 frame with the given dimensions
///
/// Saturates at `usize::MAX`, which no buffer can hold.
pub fn yuv420_frame_size(width: u32, height: u32) -> usize {
    checked_yuv420_frame_size(width, height).unwrap_or(usize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv420_frame_size() {
        assert_eq!(yuv420_frame_size(1920, 1080), 3_110_400);
        assert_eq!(yuv420_frame_size(2, 2), 6);
        assert_eq!(yuv420_frame_size(0, 480), 0);
    }

    #[test]
    fn test_huge_frame_size_does_not_overflow() {
        assert_eq!(checked_yuv420_frame_size(u32::MAX, u32::MAX), None);
        assert_eq!(yuv420_frame_size(u32::MAX, u32::MAX), usize::MAX);
        assert_eq!(checked_yuv420_frame_size(640, 480), Some(460_800));
    }

    #[test]
    fn test_pixel_format_names() {
        assert_eq!(pixel_format::name(34), "IMPLEMENTATION_DEFINED");
        assert_eq!(pixel_format::name(1), "RGBA_8888");
        assert_eq!(pixel_format::name(35), "UNKNOWN");
    }
}
