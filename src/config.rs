// SPDX-License-Identifier: GPL-3.0-only

//! User settings consumed by the engine
//!
//! The settings UI lives outside this crate. The engine only reads the stored
//! values, with best-effort reload semantics: a reload that fails keeps the
//! previously loaded values. The single write the engine performs is clearing
//! a media id that no longer resolves.

use crate::constants::{self, bridge};
use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch for the whole feature
    pub enabled: bool,
    /// Emit hook-level logging at info level
    pub verbose_logging: bool,
    /// Identifier of the selected replacement media
    pub media_id: Option<String>,
    /// Let the renderer play the replacement audio track
    pub play_sound: bool,
    /// Let the renderer ignore orientation hints and use the user's rotation
    pub manually_rotate: bool,
    /// Non-explicit parameter updates inside this window are dropped
    pub param_throttle_ms: u64,
    /// Minimum interval between thumbnail conversions
    pub thumbnail_interval_ms: u64,
    /// Thumbnail downscale divisor per axis
    pub thumbnail_scale_divisor: u32,
    /// Snapshot attempts made by an emulated still capture
    pub capture_retry_attempts: u32,
    /// Delay between snapshot attempts
    pub capture_retry_delay_ms: u64,
    /// JPEG quality of emulated still captures
    pub capture_jpeg_quality: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            verbose_logging: false,
            media_id: None,
            play_sound: false,
            manually_rotate: false,
            param_throttle_ms: constants::PARAM_THROTTLE_WINDOW.as_millis() as u64,
            thumbnail_interval_ms: bridge::THUMBNAIL_INTERVAL.as_millis() as u64,
            thumbnail_scale_divisor: bridge::THUMBNAIL_SCALE_DIVISOR,
            capture_retry_attempts: bridge::CAPTURE_RETRY_ATTEMPTS,
            capture_retry_delay_ms: bridge::CAPTURE_RETRY_DELAY.as_millis() as u64,
            capture_jpeg_quality: bridge::CAPTURE_JPEG_QUALITY,
        }
    }
}

impl Settings {
    pub fn param_throttle(&self) -> Duration {
        Duration::from_millis(self.param_throttle_ms)
    }

    pub fn thumbnail_interval(&self) -> Duration {
        Duration::from_millis(self.thumbnail_interval_ms)
    }

    pub fn capture_retry_delay(&self) -> Duration {
        Duration::from_millis(self.capture_retry_delay_ms)
    }

    /// Copy with one field changed, addressed by its serialized name
    ///
    /// `raw` is parsed as JSON first (`true`, `250`, `null`), then taken as a
    /// plain string; `none` is accepted for null.
    pub fn with_field(&self, key: &str, raw: &str) -> Result<Settings, ConfigError> {
        let base = serde_json::to_value(self).map_err(ConfigError::Serialize)?;
        if base.get(key).is_none() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        let apply = |field: serde_json::Value| {
            let mut value = base.clone();
            value[key] = field;
            serde_json::from_value::<Settings>(value)
        };

        let parsed = match raw {
            "none" => serde_json::Value::Null,
            _ => serde_json::from_str(raw).unwrap_or_else(|_| raw.into()),
        };
        // Numeric-looking media ids are still ids
        apply(parsed)
            .or_else(|_| apply(raw.into()))
            .map_err(|source| ConfigError::InvalidValue {
                key: key.to_string(),
                source,
            })
    }

    /// Values forwarded to the native renderer on every refresh
    pub fn native_config(&self) -> NativeConfig {
        NativeConfig {
            play_sound: self.play_sound,
            verbose_logging: self.verbose_logging,
            manually_rotate: self.manually_rotate,
        }
    }
}

/// Renderer-side switches derived from [`Settings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeConfig {
    pub play_sound: bool,
    pub verbose_logging: bool,
    pub manually_rotate: bool,
}

/// Where settings come from
pub trait SettingsStore: Send + Sync {
    /// Load the current settings
    fn load(&self) -> Result<Settings, ConfigError>;

    /// Forget the selected media id
    fn clear_media_id(&self) -> Result<(), ConfigError>;
}

/// Settings stored as a JSON file
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<config dir>/camera-swap/settings.json`
    pub fn from_default_location() -> Result<Self, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(
            dir.join(constants::APP_DIR_NAME)
                .join(constants::SETTINGS_FILE_NAME),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write settings, creating the parent directory if needed
    pub fn save(&self, settings: &Settings) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(settings).map_err(ConfigError::Serialize)?;
        std::fs::write(&self.path, json).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<Settings, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            // A missing file means nobody configured anything yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Settings::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn clear_media_id(&self) -> Result<(), ConfigError> {
        let mut settings = self.load()?;
        settings.media_id = None;
        self.save(&settings)
    }
}

/// In-memory store, handy for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Option<Settings>>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(Some(settings)),
        }
    }

    /// Replace the stored settings
    pub fn set(&self, settings: Settings) {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = Some(settings);
    }

    /// Make every subsequent load fail, simulating an unreadable store
    pub fn make_unreadable(&self) {
        *self.settings.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Apply an in-place edit to the stored settings
    pub fn update(&self, edit: impl FnOnce(&mut Settings)) {
        let mut guard = self.settings.lock().unwrap_or_else(PoisonError::into_inner);
        let settings = guard.get_or_insert_with(Settings::default);
        edit(settings);
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, ConfigError> {
        self.settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ConfigError::Read {
                path: PathBuf::from("<memory>"),
                source: std::io::Error::other("store is unreadable"),
            })
    }

    fn clear_media_id(&self) -> Result<(), ConfigError> {
        if let Some(settings) = self
            .settings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            settings.media_id = None;
        }
        Ok(())
    }
}

/// Last successfully loaded settings
#[derive(Debug, Default)]
pub struct SettingsCell {
    current: RwLock<Settings>,
}

impl SettingsCell {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: RwLock::new(settings),
        }
    }

    /// Copy of the current settings
    pub fn get(&self) -> Settings {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read a single value without cloning the whole struct
    pub fn read<T>(&self, f: impl FnOnce(&Settings) -> T) -> T {
        f(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Reload from the store; on failure the previous values are kept
    ///
    /// Returns true when the reload succeeded.
    pub fn reload(&self, store: &dyn SettingsStore) -> bool {
        match store.load() {
            Ok(settings) => {
                *self.current.write().unwrap_or_else(PoisonError::into_inner) = settings;
                true
            }
            Err(e) => {
                debug!(error = %e, "Settings reload failed, keeping previous values");
                false
            }
        }
    }

    /// Clear the media id both here and in the store
    pub fn clear_media_id(&self, store: &dyn SettingsStore) {
        if let Err(e) = store.clear_media_id() {
            warn!(error = %e, "Failed to clear stale media id");
        }
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .media_id = None;
    }
}
