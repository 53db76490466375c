// SPDX-License-Identifier: GPL-3.0-only

//! Which instance is currently believed to be previewing

use super::handles::{InstanceHandle, WeakInstance};
use super::session::ApiGeneration;
use std::sync::{Mutex, PoisonError};

/// One non-owning active slot per API generation
///
/// Each slot has its own lock; a legacy lifecycle call never waits on a
/// modern one.
#[derive(Default)]
pub struct ActiveSessionTracker {
    legacy: Mutex<Option<WeakInstance>>,
    modern: Mutex<Option<WeakInstance>>,
}

impl ActiveSessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, generation: ApiGeneration) -> &Mutex<Option<WeakInstance>> {
        match generation {
            ApiGeneration::Legacy => &self.legacy,
            ApiGeneration::Modern => &self.modern,
        }
    }

    /// Mark an instance as the active one for its generation
    pub fn set_active(&self, generation: ApiGeneration, instance: &InstanceHandle) {
        *self
            .slot(generation)
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(instance.downgrade());
    }

    /// True if the instance is the live active one
    pub fn is_active(&self, generation: ApiGeneration, instance: &InstanceHandle) -> bool {
        self.slot(generation)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|active| active.is_alive() && active.refers_to(instance))
    }

    /// Clear the slot only if it holds this instance
    ///
    /// Returns true when the slot was cleared, i.e. the call was not stale.
    pub fn clear_if_active(&self, generation: ApiGeneration, instance: &InstanceHandle) -> bool {
        let mut slot = self
            .slot(generation)
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let matches = slot
            .as_ref()
            .is_some_and(|active| active.is_alive() && active.refers_to(instance));
        if matches {
            *slot = None;
        }
        matches
    }

    /// The active instance, if still alive
    pub fn active(&self, generation: ApiGeneration) -> Option<InstanceHandle> {
        self.slot(generation)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(WeakInstance::upgrade)
    }

    /// Empty every slot; returns true if any held a live instance
    pub fn clear_all(&self) -> bool {
        let mut any = false;
        for generation in ApiGeneration::ALL {
            let previous = self
                .slot(generation)
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            any |= previous.is_some_and(|p| p.is_alive());
        }
        any
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_open_wins() {
        let tracker = ActiveSessionTracker::new();
        let a = InstanceHandle::new();
        let b = InstanceHandle::new();
        tracker.set_active(ApiGeneration::Legacy, &a);
        tracker.set_active(ApiGeneration::Legacy, &b);

        assert!(!tracker.clear_if_active(ApiGeneration::Legacy, &a));
        assert!(tracker.is_active(ApiGeneration::Legacy, &b));
        assert!(tracker.clear_if_active(ApiGeneration::Legacy, &b));
        assert!(tracker.active(ApiGeneration::Legacy).is_none());
    }

    #[test]
    fn test_generations_are_independent() {
        let tracker = ActiveSessionTracker::new();
        let a = InstanceHandle::new();
        tracker.set_active(ApiGeneration::Modern, &a);
        assert!(!tracker.is_active(ApiGeneration::Legacy, &a));
        assert!(!tracker.clear_if_active(ApiGeneration::Legacy, &a));
        assert!(tracker.is_active(ApiGeneration::Modern, &a));
    }

    #[test]
    fn test_dropped_instance_is_not_active() {
        let tracker = ActiveSessionTracker::new();
        let a = InstanceHandle::new();
        tracker.set_active(ApiGeneration::Modern, &a);
        drop(a);
        assert!(tracker.active(ApiGeneration::Modern).is_none());
        assert!(!tracker.clear_all());
    }
}
