// SPDX-License-Identifier: GPL-3.0-only

//! Registry of camera sessions keyed by instance identity

use super::handles::{InstanceHandle, InstanceId, WeakInstance};
use super::session::{ApiGeneration, CameraSession};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Shared, individually locked session record
pub type SharedSession = Arc<Mutex<CameraSession>>;

struct Entry {
    instance: WeakInstance,
    session: SharedSession,
}

/// Concurrency-safe session registry
///
/// Only the map is guarded by the registry lock. Once a session is resolved
/// its fields are mutated under the session's own lock, so unrelated cameras
/// never serialize against each other. Entries whose instance is gone are
/// purged on the next map access.
#[derive(Default)]
pub struct SessionStore {
    entries: Mutex<HashMap<InstanceId, Entry>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the session for an instance, creating it on first access
    pub fn get_or_create(
        &self,
        instance: &InstanceHandle,
        api_generation: ApiGeneration,
    ) -> SharedSession {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Self::purge_locked(&mut entries);
        entries
            .entry(instance.id())
            .or_insert_with(|| {
                debug!(instance = %instance.id(), generation = %api_generation, "Creating camera session");
                Entry {
                    instance: instance.downgrade(),
                    session: Arc::new(Mutex::new(CameraSession::new(api_generation))),
                }
            })
            .session
            .clone()
    }

    /// Look up an existing session without creating one
    pub fn get(&self, instance: &InstanceHandle) -> Option<SharedSession> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&instance.id())
            .filter(|entry| entry.instance.is_alive())
            .map(|entry| entry.session.clone())
    }

    /// Drop entries whose instance no longer exists
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Self::purge_locked(&mut entries)
    }

    /// Number of entries with a live instance
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|e| e.instance.is_alive()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_locked(entries: &mut HashMap<InstanceId, Entry>) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| entry.instance.is_alive());
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Reclaimed sessions of dropped camera instances");
        }
        removed
    }
}

/// Lock a shared session, recovering from poisoning
pub fn lock_session(session: &SharedSession) -> std::sync::MutexGuard<'_, CameraSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
