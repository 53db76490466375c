// SPDX-License-Identifier: GPL-3.0-only

//! Idempotent target registration with the native renderer

use super::handles::{TargetId, WeakTarget};
use super::session::{ApiGeneration, Orientation};
use crate::gateway::{RendererGateway, TargetRegistration};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

/// What was last handed to the renderer
#[derive(Debug, Clone)]
pub struct LastRegistration {
    pub api_generation: ApiGeneration,
    pub camera_id: String,
    pub sensor_orientation: Orientation,
    pub width: u32,
    pub height: u32,
    pub display_orientation: Orientation,
    pub target_id: TargetId,
    target: WeakTarget,
}

impl LastRegistration {
    fn from_registration(registration: &TargetRegistration) -> Self {
        Self {
            api_generation: registration.api_generation,
            camera_id: registration.camera_id.clone(),
            sensor_orientation: registration.sensor_orientation,
            width: registration.width,
            height: registration.height,
            display_orientation: registration.display_orientation,
            target_id: registration.target.id(),
            target: registration.target.downgrade(),
        }
    }

    fn matches(&self, registration: &TargetRegistration) -> bool {
        // A recorded target that died since is never a match
        self.target.is_valid()
            && self.target_id == registration.target.id()
            && self.api_generation == registration.api_generation
            && self.camera_id == registration.camera_id
            && self.sensor_orientation == registration.sensor_orientation
            && self.width == registration.width
            && self.height == registration.height
            && self.display_orientation == registration.display_orientation
    }
}

/// Guards the last-registered-target record
///
/// Compare, gateway call and store all happen under one lock, so two threads
/// racing to register the same target produce exactly one gateway call.
#[derive(Default)]
pub struct RegistrationGuard {
    last: Mutex<Option<LastRegistration>>,
}

impl RegistrationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register unless identical to the last registration
    ///
    /// Returns true if the gateway was called.
    pub fn register_if_changed(
        &self,
        gateway: &dyn RendererGateway,
        registration: &TargetRegistration,
        force: bool,
    ) -> bool {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        let unchanged = last.as_ref().is_some_and(|l| l.matches(registration));
        if unchanged && !force {
            debug!(target = %registration.target.id(), "Target unchanged, skipping registration");
            return false;
        }

        info!(
            generation = %registration.api_generation,
            camera_id = %registration.camera_id,
            sensor = %registration.sensor_orientation,
            display = %registration.display_orientation,
            width = registration.width,
            height = registration.height,
            target = %registration.target.id(),
            force,
            "Registering render target"
        );
        gateway.register_target(registration);
        *last = Some(LastRegistration::from_registration(registration));
        true
    }

    /// Forget the last registration so the next one always goes through
    pub fn forget(&self) {
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn last(&self) -> Option<LastRegistration> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::handles::Target;
    use crate::gateway::RecordingGateway;

    fn registration(target: &Target) -> TargetRegistration {
        TargetRegistration {
            api_generation: ApiGeneration::Modern,
            camera_id: "0".into(),
            sensor_orientation: Orientation::Deg90,
            width: 1920,
            height: 1080,
            display_orientation: Orientation::Deg0,
            target: target.clone(),
        }
    }

    #[test]
    fn test_identical_registration_sent_once() {
        let gateway = RecordingGateway::new();
        let guard = RegistrationGuard::new();
        let target = Target::new();

        assert!(guard.register_if_changed(&gateway, &registration(&target), false));
        assert!(!guard.register_if_changed(&gateway, &registration(&target), false));
        assert_eq!(gateway.register_count(), 1);
    }

    #[test]
    fn test_force_always_registers() {
        let gateway = RecordingGateway::new();
        let guard = RegistrationGuard::new();
        let target = Target::new();

        guard.register_if_changed(&gateway, &registration(&target), false);
        assert!(guard.register_if_changed(&gateway, &registration(&target), true));
        assert_eq!(gateway.register_count(), 2);
    }

    #[test]
    fn test_any_field_change_registers_again() {
        let gateway = RecordingGateway::new();
        let guard = RegistrationGuard::new();
        let target = Target::new();

        guard.register_if_changed(&gateway, &registration(&target), false);

        let mut rotated = registration(&target);
        rotated.display_orientation = Orientation::Deg270;
        assert!(guard.register_if_changed(&gateway, &rotated, false));

        let mut resized = rotated.clone();
        resized.width = 1280;
        assert!(guard.register_if_changed(&gateway, &resized, false));

        let other = Target::new();
        let mut retargeted = resized.clone();
        retargeted.target = other;
        assert!(guard.register_if_changed(&gateway, &retargeted, false));
        assert_eq!(gateway.register_count(), 4);
    }

    #[test]
    fn test_forget_allows_reregistration() {
        let gateway = RecordingGateway::new();
        let guard = RegistrationGuard::new();
        let target = Target::new();

        guard.register_if_changed(&gateway, &registration(&target), false);
        guard.forget();
        assert!(guard.last().is_none());
        assert!(guard.register_if_changed(&gateway, &registration(&target), false));
    }

    #[test]
    fn test_concurrent_registration_is_single() {
        let gateway = std::sync::Arc::new(RecordingGateway::new());
        let guard = std::sync::Arc::new(RegistrationGuard::new());
        let target = Target::new();

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let gateway = gateway.clone();
                let guard = guard.clone();
                let reg = registration(&target);
                std::thread::spawn(move || {
                    guard.register_if_changed(gateway.as_ref(), &reg, false);
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(gateway.register_count(), 1);
    }
}
