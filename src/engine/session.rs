// SPDX-License-Identifier: GPL-3.0-only

//! Per-instance camera session state

use super::handles::{Target, WeakTarget};
use crate::constants::session as defaults;
use std::fmt;

/// Which interception variant observed the instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiGeneration {
    /// Callback-based camera API with explicit preview start/stop
    Legacy,
    /// Device/session camera API without a separate preview start
    Modern,
}

impl ApiGeneration {
    pub const ALL: [ApiGeneration; 2] = [ApiGeneration::Legacy, ApiGeneration::Modern];

    /// Numeric level the native renderer uses to tell generations apart
    pub fn level(&self) -> u32 {
        match self {
            ApiGeneration::Legacy => 1,
            ApiGeneration::Modern => 2,
        }
    }
}

impl fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiGeneration::Legacy => write!(f, "legacy"),
            ApiGeneration::Modern => write!(f, "modern"),
        }
    }
}

/// Right-angle rotation in degrees (clockwise)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    /// Normalise any integer degree value; non right angles snap to 0
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            90 => Orientation::Deg90,
            180 => Orientation::Deg180,
            270 => Orientation::Deg270,
            _ => Orientation::Deg0,
        }
    }

    pub fn degrees(&self) -> u32 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 90,
            Orientation::Deg180 => 180,
            Orientation::Deg270 => 270,
        }
    }

    /// Check if rotation swaps width and height
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Orientation::Deg90 | Orientation::Deg270)
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// Live state tracked for one camera instance
#[derive(Debug, Clone)]
pub struct CameraSession {
    pub api_generation: ApiGeneration,
    pub camera_id: String,
    pub sensor_orientation: Orientation,
    pub display_orientation: Orientation,
    pub picture_width: u32,
    pub picture_height: u32,
    target: Option<WeakTarget>,
}

impl CameraSession {
    pub fn new(api_generation: ApiGeneration) -> Self {
        Self {
            api_generation,
            camera_id: defaults::UNKNOWN_CAMERA_ID.to_string(),
            sensor_orientation: Orientation::default(),
            display_orientation: Orientation::default(),
            picture_width: defaults::DEFAULT_PICTURE_WIDTH,
            picture_height: defaults::DEFAULT_PICTURE_HEIGHT,
            target: None,
        }
    }

    /// The stored target, if it is still valid
    pub fn target(&self) -> Option<Target> {
        self.target.as_ref().and_then(WeakTarget::upgrade)
    }

    pub fn set_target(&mut self, target: Option<&Target>) {
        self.target = target.map(Target::downgrade);
    }

    pub fn set_picture_size(&mut self, width: u32, height: u32) {
        self.picture_width = width;
        self.picture_height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_normalisation() {
        assert_eq!(Orientation::from_degrees(90), Orientation::Deg90);
        assert_eq!(Orientation::from_degrees(-90), Orientation::Deg270);
        assert_eq!(Orientation::from_degrees(450), Orientation::Deg90);
        assert_eq!(Orientation::from_degrees(45), Orientation::Deg0);
        assert!(Orientation::Deg270.swaps_dimensions());
        assert!(!Orientation::Deg180.swaps_dimensions());
    }

    #[test]
    fn test_session_never_keeps_target_alive() {
        let mut session = CameraSession::new(ApiGeneration::Modern);
        let target = Target::new();
        session.set_target(Some(&target));
        assert_eq!(session.target(), Some(target.clone()));

        drop(target);
        assert!(session.target().is_none());
    }

    #[test]
    fn test_session_drops_released_target() {
        let mut session = CameraSession::new(ApiGeneration::Legacy);
        let target = Target::new();
        session.set_target(Some(&target));
        target.release();
        assert!(session.target().is_none());
    }
}
