// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Simulating a camera app of either API generation against the
//!   synthetic renderer
//! - Inspecting and editing the settings file

use crate::ApiArg;
use camera_swap::bridge::{
    CallbackError, FrameBridge, FrameConsumer, LegacyPreviewCallback, PictureCallback,
    spawn_still_capture,
};
use camera_swap::config::{JsonSettingsStore, MemorySettingsStore, SettingsStore};
use camera_swap::constants::pixel_format;
use camera_swap::dispatch::{
    CallSite, Dispatcher, HookArgs, HookHost, HookPhase, HostSite, LegacySite, ModernSite, Size,
    StaticPlatform,
};
use camera_swap::engine::{
    DirectoryMediaResolver, EngineContext, InstanceHandle, OutputConfiguration, SessionOutput,
    SessionOutputs, Target, TextureHandle,
};
use camera_swap::errors::AttachError;
use camera_swap::gateway::{SyntheticRenderer, TargetInfo};
use camera_swap::main_context;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Default folder name for saving captures
const DEFAULT_SAVE_FOLDER: &str = "camera-swap";

/// Camera the simulated app opens
const SIMULATED_CAMERA: i32 = 0;

/// Options of the `simulate` command
pub struct SimulateOptions {
    pub api: ApiArg,
    pub media: Option<PathBuf>,
    pub duration: u64,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub output: Option<PathBuf>,
}

/// Host that can hook every call site
struct SimulatedHost;

impl HookHost for SimulatedHost {
    fn attach(&self, _site: CallSite, _phase: HookPhase) -> Result<(), AttachError> {
        Ok(())
    }
}

/// Counts frames the simulated app receives
#[derive(Default)]
struct FrameCounter {
    frames: AtomicU64,
}

impl LegacyPreviewCallback for FrameCounter {
    fn on_preview_frame(&self, _data: &[u8], _camera: &InstanceHandle) -> Result<(), CallbackError> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl FrameConsumer for FrameCounter {
    fn on_frame(&self, _data: &[u8], _width: u32, _height: u32) -> Result<(), CallbackError> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Keeps the JPEG handed to the simulated app
#[derive(Default)]
struct JpegSlot {
    jpeg: Mutex<Option<Vec<u8>>>,
}

impl PictureCallback for JpegSlot {
    fn on_picture_taken(&self, jpeg: &[u8], _camera: Option<&InstanceHandle>) {
        if let Ok(mut slot) = self.jpeg.lock() {
            *slot = Some(jpeg.to_vec());
        }
    }
}

/// Run a simulated preview session and save one still capture
pub fn simulate(options: SimulateOptions) -> Result<(), Box<dyn std::error::Error>> {
    let json_store = JsonSettingsStore::from_default_location()?;
    let mut settings = json_store.load().unwrap_or_default();

    // An explicit media file overrides the stored media id for this run only
    let media_root = match &options.media {
        Some(path) => {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or("Media path has no file name")?;
            settings.media_id = Some(name.to_string());
            path.parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        }
        None => get_default_media_dir(),
    };
    let Some(media_id) = settings.media_id.clone() else {
        return Err("No replacement media: pass --media or set media_id".into());
    };
    println!("Replacement media: {}", media_root.join(&media_id).display());

    let bridge = Arc::new(FrameBridge::new());
    let renderer = Arc::new(
        SyntheticRenderer::new(bridge.clone(), options.fps).with_default_info(TargetInfo::new(
            options.width,
            options.height,
            pixel_format::OPAQUE,
        )),
    );
    let (main, mut main_loop) = main_context::channel();
    let platform = StaticPlatform::new()
        .with_camera(SIMULATED_CAMERA.to_string(), 90)
        .with_display_rotation(0);

    let ctx = Arc::new(EngineContext::new(
        Arc::new(MemorySettingsStore::new(settings)),
        Arc::new(DirectoryMediaResolver::new(media_root)),
        renderer.clone(),
        Arc::new(platform),
        bridge.clone(),
        main.clone(),
    ));

    let dispatcher = Dispatcher::new(ctx.clone());
    let attached = dispatcher.attach(&SimulatedHost);
    println!("Hooks attached: {}", attached);

    let camera = InstanceHandle::new();
    dispatcher.dispatch(
        CallSite::Host(HostSite::ApplicationCreated),
        &camera,
        HookArgs::None,
    );
    if !ctx.is_ready() {
        return Err(format!("Replacement media '{}' is not usable", media_id).into());
    }

    let counter = Arc::new(FrameCounter::default());
    let size = Size::new(options.width, options.height);

    // Legacy texture and modern targets must outlive the preview
    let texture = TextureHandle::new();
    let preview_target = Target::new();
    let analysis_target = Target::new();
    renderer.set_target_info(
        &analysis_target,
        TargetInfo::new(320, 240, pixel_format::RAW_SINGLE_PLANE),
    );

    match options.api {
        ApiArg::Legacy => {
            let legacy = CallSite::Legacy;
            dispatcher.dispatch(
                legacy(LegacySite::Open),
                &camera,
                HookArgs::Open {
                    index: Some(SIMULATED_CAMERA),
                    default_size: Some(size),
                },
            );
            dispatcher.dispatch(
                legacy(LegacySite::SetPreviewTexture),
                &camera,
                HookArgs::Texture {
                    texture: texture.clone(),
                    matrix: None,
                },
            );
            dispatcher.dispatch(
                legacy(LegacySite::SetParameters),
                &camera,
                HookArgs::Parameters {
                    preview_size: Some(size),
                    picture_size: None,
                },
            );
            dispatcher.dispatch(
                legacy(LegacySite::SetPreviewCallback),
                &camera,
                HookArgs::PreviewCallback(Some(counter.clone())),
            );
            let outcome = dispatcher.dispatch(legacy(LegacySite::StartPreview), &camera, HookArgs::None);
            println!("startPreview: {:?}", outcome);
        }
        ApiArg::Modern => {
            let modern = CallSite::Modern;
            dispatcher.dispatch(
                modern(ModernSite::OpenCamera),
                &camera,
                HookArgs::CameraId(SIMULATED_CAMERA.to_string()),
            );
            dispatcher.dispatch(
                modern(ModernSite::DeviceOpened),
                &camera,
                HookArgs::CameraId(SIMULATED_CAMERA.to_string()),
            );
            ctx.bridge().set_modern_consumer(Some(counter.clone()));
            dispatcher.dispatch(
                modern(ModernSite::CreateCaptureSession),
                &camera,
                HookArgs::Outputs(SessionOutputs::List(vec![
                    SessionOutput::Target(analysis_target.clone()),
                    SessionOutput::Configuration(OutputConfiguration::new(preview_target.clone())),
                ])),
            );
            let outcome =
                dispatcher.dispatch(modern(ModernSite::SetRepeatingRequest), &camera, HookArgs::None);
            println!("setRepeatingRequest: {:?}", outcome);
        }
    }

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!();
    println!("Previewing... (press Ctrl+C to stop early)");
    let start = Instant::now();
    let target_duration = Duration::from_secs(options.duration);
    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }
        print!(
            "\rFrames delivered: {}",
            counter.frames.load(Ordering::Relaxed)
        );
        std::io::Write::flush(&mut std::io::stdout())?;
        std::thread::sleep(Duration::from_millis(100));
    }
    println!();

    // Still capture, delivered through the main context like on a device
    let jpeg_slot = Arc::new(JpegSlot::default());
    match options.api {
        ApiArg::Legacy => {
            dispatcher.dispatch(
                CallSite::Legacy(LegacySite::TakePicture),
                &camera,
                HookArgs::Picture(Some(jpeg_slot.clone())),
            );
        }
        ApiArg::Modern => spawn_still_capture(
            ctx.bridge().clone(),
            main.clone(),
            ctx.capture_policy(),
            Some(jpeg_slot.clone()),
            Some(camera.downgrade()),
        ),
    }
    let wait = ctx.capture_policy().max_wait() + Duration::from_secs(2);
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let delivered = rt.block_on(async {
        tokio::time::timeout(wait, main_loop.run_next())
            .await
            .unwrap_or(false)
    });

    // Teardown mirrors the app closing the camera
    match options.api {
        ApiArg::Legacy => {
            dispatcher.dispatch(CallSite::Legacy(LegacySite::StopPreview), &camera, HookArgs::None);
            dispatcher.dispatch(CallSite::Legacy(LegacySite::Release), &camera, HookArgs::None);
        }
        ApiArg::Modern => {
            dispatcher.dispatch(CallSite::Modern(ModernSite::Close), &camera, HookArgs::None);
        }
    }
    renderer.shutdown();

    println!(
        "Frames delivered: {} (rendered {})",
        counter.frames.load(Ordering::Relaxed),
        renderer.frames_rendered()
    );

    let jpeg = jpeg_slot
        .jpeg
        .lock()
        .map_err(|_| "Capture result unavailable")?
        .take()
        .unwrap_or_default();
    if !delivered || jpeg.is_empty() {
        println!("Still capture returned no image");
        return Ok(());
    }

    let output_path = match options.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            path
        }
        None => {
            let dir = get_default_capture_dir();
            std::fs::create_dir_all(&dir)?;
            let timestamp = Local::now().format("%Y%m%d_%H%M%S");
            dir.join(format!("capture_{}.jpg", timestamp))
        }
    };
    std::fs::write(&output_path, &jpeg)?;
    println!("Capture saved: {} ({} bytes)", output_path.display(), jpeg.len());
    Ok(())
}

/// Print the current settings as JSON
pub fn show_settings() -> Result<(), Box<dyn std::error::Error>> {
    let store = JsonSettingsStore::from_default_location()?;
    let settings = store.load()?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

/// Print where the settings file lives
pub fn settings_path() -> Result<(), Box<dyn std::error::Error>> {
    let store = JsonSettingsStore::from_default_location()?;
    println!("{}", store.path().display());
    Ok(())
}

/// Change one setting and save the file
pub fn set_setting(key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = JsonSettingsStore::from_default_location()?;
    let settings = store.load()?.with_field(key, value)?;
    store.save(&settings)?;
    println!("Saved {}", store.path().display());
    Ok(())
}

/// Get default capture directory
fn get_default_capture_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

/// Get default directory stored media ids are resolved in
fn get_default_media_dir() -> PathBuf {
    dirs::video_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}
