// SPDX-License-Identifier: GPL-3.0-only

//! Replacement source readiness
//!
//! Readiness is half of the hook gate: until the renderer accepted a media,
//! every hook is a pass-through.

use crate::config::{SettingsCell, SettingsStore};
use crate::errors::MediaError;
use crate::gateway::{MediaSource, RendererGateway};
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Turns a media id into an opened media
pub trait MediaResolver: Send + Sync {
    /// True if the id refers to existing media
    fn exists(&self, media_id: &str) -> bool;

    /// Open the media for the renderer
    fn open(&self, media_id: &str) -> Result<MediaSource, MediaError>;
}

/// Media ids are file names inside one directory
#[derive(Debug, Clone)]
pub struct DirectoryMediaResolver {
    root: PathBuf,
}

impl DirectoryMediaResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, media_id: &str) -> Option<PathBuf> {
        // Ids are plain names; anything that walks out of the root is unknown
        let name = Path::new(media_id);
        let mut components = name.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return None,
        }
        Some(self.root.join(name))
    }
}

impl MediaResolver for DirectoryMediaResolver {
    fn exists(&self, media_id: &str) -> bool {
        self.path_for(media_id).is_some_and(|p| p.is_file())
    }

    fn open(&self, media_id: &str) -> Result<MediaSource, MediaError> {
        let path = self
            .path_for(media_id)
            .ok_or_else(|| MediaError::NotFound(media_id.to_string()))?;
        let file = File::open(&path).map_err(|source| MediaError::Open {
            id: media_id.to_string(),
            source,
        })?;
        let length = file
            .metadata()
            .map_err(|source| MediaError::Open {
                id: media_id.to_string(),
                source,
            })?
            .len();
        Ok(MediaSource {
            file,
            offset: 0,
            length,
        })
    }
}

/// What an update did, mostly for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceUpdate {
    /// No media configured
    Cleared,
    /// Configured media no longer exists; id removed from settings
    Invalidated,
    /// Media handed to the renderer
    Loaded { ready: bool },
    /// Same media, already loaded
    Unchanged,
}

/// Tracks which media the renderer holds and whether it is playable
#[derive(Debug, Default)]
pub struct ReplacementSourceManager {
    ready: AtomicBool,
    current_id: Mutex<Option<String>>,
}

impl ReplacementSourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Media id the renderer was last asked about
    pub fn current_id(&self) -> Option<String> {
        self.current_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reconcile the renderer's media with the configured media id
    pub fn update(
        &self,
        settings: &SettingsCell,
        store: &dyn SettingsStore,
        resolver: &dyn MediaResolver,
        gateway: &dyn RendererGateway,
    ) -> SourceUpdate {
        let mut current = self
            .current_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let previous = current.clone();
        let wanted = settings.read(|s| s.media_id.clone());

        let Some(media_id) = wanted else {
            if previous.is_some() {
                gateway.reset_replacement_source();
            }
            *current = None;
            self.ready.store(false, Ordering::Release);
            return SourceUpdate::Cleared;
        };

        if !resolver.exists(&media_id) {
            warn!(media_id = %media_id, "Configured media no longer exists");
            settings.clear_media_id(store);
            gateway.reset_replacement_source();
            *current = None;
            self.ready.store(false, Ordering::Release);
            return SourceUpdate::Invalidated;
        }

        let changed = previous.as_deref() != Some(media_id.as_str());
        if !changed && self.is_ready() {
            debug!(media_id = %media_id, "Replacement source unchanged");
            return SourceUpdate::Unchanged;
        }

        let ready = match resolver.open(&media_id) {
            Ok(source) => gateway.load_replacement_source(&source),
            Err(e) => {
                warn!(media_id = %media_id, error = %e, "Failed to open replacement media");
                false
            }
        };
        info!(media_id = %media_id, ready, "Replacement source loaded");
        *current = Some(media_id);
        self.ready.store(ready, Ordering::Release);
        SourceUpdate::Loaded { ready }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MemorySettingsStore, Settings};
    use crate::gateway::{GatewayCall, RecordingGateway};

    fn setup(media_id: Option<&str>) -> (tempfile::TempDir, MemorySettingsStore, SettingsCell) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"not really a video").unwrap();
        let store = MemorySettingsStore::new(Settings {
            media_id: media_id.map(str::to_string),
            ..Settings::default()
        });
        let cell = SettingsCell::default();
        cell.reload(&store);
        (dir, store, cell)
    }

    #[test]
    fn test_load_then_unchanged() {
        let (dir, store, cell) = setup(Some("clip.mp4"));
        let resolver = DirectoryMediaResolver::new(dir.path());
        let gateway = RecordingGateway::new();
        let manager = ReplacementSourceManager::new();

        let first = manager.update(&cell, &store, &resolver, &gateway);
        assert_eq!(first, SourceUpdate::Loaded { ready: true });
        assert!(manager.is_ready());

        let second = manager.update(&cell, &store, &resolver, &gateway);
        assert_eq!(second, SourceUpdate::Unchanged);
        assert_eq!(gateway.count(|c| matches!(c, GatewayCall::LoadSource { .. })), 1);
    }

    #[test]
    fn test_missing_media_is_cleared_from_settings() {
        let (dir, store, cell) = setup(Some("gone.mp4"));
        let resolver = DirectoryMediaResolver::new(dir.path());
        let gateway = RecordingGateway::new();
        let manager = ReplacementSourceManager::new();

        assert_eq!(
            manager.update(&cell, &store, &resolver, &gateway),
            SourceUpdate::Invalidated
        );
        assert!(!manager.is_ready());
        assert!(store.load().unwrap().media_id.is_none());
        assert!(cell.get().media_id.is_none());
        assert_eq!(gateway.count(|c| *c == GatewayCall::ResetSource), 1);
    }

    #[test]
    fn test_failed_load_retries_on_next_update() {
        let (dir, store, cell) = setup(Some("clip.mp4"));
        let resolver = DirectoryMediaResolver::new(dir.path());
        let gateway = RecordingGateway::new();
        gateway.set_load_result(false);
        let manager = ReplacementSourceManager::new();

        assert_eq!(
            manager.update(&cell, &store, &resolver, &gateway),
            SourceUpdate::Loaded { ready: false }
        );
        gateway.set_load_result(true);
        assert_eq!(
            manager.update(&cell, &store, &resolver, &gateway),
            SourceUpdate::Loaded { ready: true }
        );
    }

    #[test]
    fn test_clearing_media_resets_renderer() {
        let (dir, store, cell) = setup(Some("clip.mp4"));
        let resolver = DirectoryMediaResolver::new(dir.path());
        let gateway = RecordingGateway::new();
        let manager = ReplacementSourceManager::new();
        manager.update(&cell, &store, &resolver, &gateway);

        store.update(|s| s.media_id = None);
        cell.reload(&store);
        assert_eq!(
            manager.update(&cell, &store, &resolver, &gateway),
            SourceUpdate::Cleared
        );
        assert!(!manager.is_ready());
        assert_eq!(gateway.count(|c| *c == GatewayCall::ResetSource), 1);
    }

    #[test]
    fn test_resolver_rejects_path_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = DirectoryMediaResolver::new(dir.path());
        assert!(!resolver.exists("../etc/passwd"));
        assert!(!resolver.exists(""));
        assert!(!resolver.exists(".."));
        assert!(matches!(resolver.open("a/b"), Err(MediaError::NotFound(_))));
    }
}
