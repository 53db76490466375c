// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use camera_swap::config::Settings;
use camera_swap::constants::{self, bridge, pixel_format, session};

#[test]
fn test_pixel_format_codes() {
    // Opaque preview format is 0x22
    assert_eq!(pixel_format::OPAQUE, 0x22);
    assert_ne!(pixel_format::OPAQUE, pixel_format::RAW_SINGLE_PLANE);
}

#[test]
fn test_fallback_orientations_are_right_angles() {
    for degrees in [
        session::LEGACY_FALLBACK_SENSOR_ORIENTATION,
        session::MODERN_FALLBACK_SENSOR_ORIENTATION,
        session::FALLBACK_DISPLAY_ORIENTATION,
    ] {
        assert_eq!(degrees % 90, 0, "{} is not a right angle", degrees);
    }
}

#[test]
fn test_default_picture_size_is_portrait() {
    assert!(session::DEFAULT_PICTURE_HEIGHT > session::DEFAULT_PICTURE_WIDTH);
}

#[test]
fn test_settings_defaults_match_constants() {
    let settings = Settings::default();
    assert_eq!(settings.param_throttle(), constants::PARAM_THROTTLE_WINDOW);
    assert_eq!(settings.thumbnail_interval(), bridge::THUMBNAIL_INTERVAL);
    assert_eq!(settings.capture_retry_delay(), bridge::CAPTURE_RETRY_DELAY);
    assert_eq!(settings.capture_retry_attempts, bridge::CAPTURE_RETRY_ATTEMPTS);
}

#[test]
fn test_capture_budget_is_short() {
    // Worst case wait before an empty result is reported
    let budget = bridge::CAPTURE_RETRY_DELAY * (bridge::CAPTURE_RETRY_ATTEMPTS - 1);
    assert!(budget.as_millis() <= 200);
}

#[test]
fn test_frame_size_for_odd_dimensions() {
    assert_eq!(constants::yuv420_frame_size(3, 3), 13);
    assert_eq!(constants::yuv420_frame_size(640, 480), 460_800);
}
