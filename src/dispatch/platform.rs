// SPDX-License-Identifier: GPL-3.0-only

//! Environment queries the hooks depend on

use crate::engine::handles::{Target, TextureHandle, TextureId, WeakTexture};
use crate::errors::PlatformError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Metadata the host platform can answer about cameras and display
///
/// Every query may fail; callers fall back to documented defaults.
pub trait PlatformServices: Send + Sync {
    /// Sensor mounting angle of a legacy camera by index, in degrees
    fn legacy_sensor_orientation(&self, index: i32) -> Result<i32, PlatformError>;

    /// Sensor mounting angle of a modern camera by id, in degrees
    fn modern_sensor_orientation(&self, camera_id: &str) -> Result<i32, PlatformError>;

    /// Current display rotation, in degrees
    fn display_rotation(&self) -> Result<i32, PlatformError>;

    /// Wrap a texture-style destination into a target
    fn target_for_texture(&self, texture: &TextureHandle) -> Result<Target, PlatformError>;
}

/// Platform with fixed answers, for simulations and tests
#[derive(Debug, Default)]
pub struct StaticPlatform {
    sensors: HashMap<String, i32>,
    display_rotation: Option<i32>,
}

impl StaticPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a camera; legacy index lookups use the id's string form
    pub fn with_camera(mut self, camera_id: impl Into<String>, sensor_orientation: i32) -> Self {
        self.sensors.insert(camera_id.into(), sensor_orientation);
        self
    }

    pub fn with_display_rotation(mut self, degrees: i32) -> Self {
        self.display_rotation = Some(degrees);
        self
    }
}

impl PlatformServices for StaticPlatform {
    fn legacy_sensor_orientation(&self, index: i32) -> Result<i32, PlatformError> {
        self.modern_sensor_orientation(&index.to_string())
    }

    fn modern_sensor_orientation(&self, camera_id: &str) -> Result<i32, PlatformError> {
        self.sensors
            .get(camera_id)
            .copied()
            .ok_or_else(|| PlatformError::UnknownCamera(camera_id.to_string()))
    }

    fn display_rotation(&self) -> Result<i32, PlatformError> {
        self.display_rotation
            .ok_or_else(|| PlatformError::ServiceUnavailable("window".into()))
    }

    fn target_for_texture(&self, _texture: &TextureHandle) -> Result<Target, PlatformError> {
        Ok(Target::new())
    }
}

/// Texture to target cache
///
/// Each texture gets exactly one target for as long as both are alive.
/// Entries whose texture died are dropped, and their target released.
#[derive(Debug, Default)]
pub struct TargetResolver {
    cache: Mutex<HashMap<TextureId, (WeakTexture, Target)>>,
}

impl TargetResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        texture: &TextureHandle,
        platform: &dyn PlatformServices,
    ) -> Result<Target, PlatformError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        cache.retain(|_, (weak, target)| {
            let keep = weak.is_alive();
            if !keep {
                target.release();
            }
            keep
        });

        if let Some((_, target)) = cache.get(&texture.id())
            && target.is_valid()
        {
            return Ok(target.clone());
        }

        let target = platform.target_for_texture(texture)?;
        debug!(texture = %texture.id(), target = %target.id(), "Resolved texture to target");
        cache.insert(texture.id(), (texture.downgrade(), target.clone()));
        Ok(target)
    }

    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
