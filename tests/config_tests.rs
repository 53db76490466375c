// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use camera_swap::config::{JsonSettingsStore, Settings, SettingsStore};
use camera_swap::errors::ConfigError;
use std::fs;

fn store_in(dir: &tempfile::TempDir) -> JsonSettingsStore {
    JsonSettingsStore::new(dir.path().join("nested").join("settings.json"))
}

#[test]
fn test_settings_default() {
    let settings = Settings::default();

    // Feature on, but nothing to play until media is chosen
    assert!(settings.enabled, "Feature should be enabled by default");
    assert!(settings.media_id.is_none());
    assert!(!settings.verbose_logging);
    assert!(settings.capture_retry_attempts > 0);
}

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    assert_eq!(store.load().unwrap(), Settings::default());
    assert!(!store.path().exists(), "Loading should not create the file");
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    let settings = Settings {
        media_id: Some("holiday.mp4".into()),
        play_sound: true,
        param_throttle_ms: 500,
        ..Default::default()
    };

    store.save(&settings).unwrap();
    assert_eq!(store.load().unwrap(), settings);
}

#[test]
fn test_partial_file_fills_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    fs::write(store.path(), r#"{ "enabled": false }"#).unwrap();

    let settings = store.load().unwrap();
    assert!(!settings.enabled);
    assert_eq!(
        settings.capture_jpeg_quality,
        Settings::default().capture_jpeg_quality
    );
}

#[test]
fn test_corrupt_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    fs::write(store.path(), "{ not json").unwrap();

    assert!(matches!(store.load(), Err(ConfigError::Parse { .. })));
}

#[test]
fn test_clear_media_id_persists() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir);
    store
        .save(&Settings {
            media_id: Some("clip.mp4".into()),
            verbose_logging: true,
            ..Default::default()
        })
        .unwrap();

    store.clear_media_id().unwrap();
    let settings = store.load().unwrap();
    assert_eq!(settings.media_id, None);
    assert!(settings.verbose_logging, "Other fields must survive");
}

#[test]
fn test_with_field_values() {
    let settings = Settings::default();

    assert!(!settings.with_field("enabled", "false").unwrap().enabled);
    assert_eq!(
        settings
            .with_field("param_throttle_ms", "1000")
            .unwrap()
            .param_throttle_ms,
        1000
    );
    assert_eq!(
        settings.with_field("media_id", "clip.mp4").unwrap().media_id,
        Some("clip.mp4".to_string())
    );
    // Numeric ids stay ids
    assert_eq!(
        settings.with_field("media_id", "42").unwrap().media_id,
        Some("42".to_string())
    );

    let with_media = settings.with_field("media_id", "clip.mp4").unwrap();
    assert_eq!(with_media.with_field("media_id", "none").unwrap().media_id, None);
}

#[test]
fn test_with_field_rejects_bad_input() {
    let settings = Settings::default();
    assert!(matches!(
        settings.with_field("no_such_key", "1"),
        Err(ConfigError::UnknownKey(key)) if key == "no_such_key"
    ));
    assert!(matches!(
        settings.with_field("capture_jpeg_quality", "many"),
        Err(ConfigError::InvalidValue { .. })
    ));
}
