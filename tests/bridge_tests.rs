// SPDX-License-Identifier: MPL-2.0

//! Integration tests for the frame bridge fed by the synthetic renderer

use camera_swap::bridge::{
    CallbackError, CapturePolicy, FrameBridge, FrameConsumer, LegacyPreviewCallback,
    PictureCallback, ThumbnailSink, spawn_still_capture,
};
use camera_swap::config::{MemorySettingsStore, Settings};
use camera_swap::constants::{pixel_format, yuv420_frame_size};
use camera_swap::dispatch::{
    CallSite, Dispatcher, HookArgs, LegacySite, ModernSite, Size, StaticPlatform,
};
use camera_swap::engine::{
    DirectoryMediaResolver, EngineContext, InstanceHandle, OutputConfiguration, SessionOutputs,
    Target,
};
use camera_swap::gateway::{SyntheticRenderer, TargetInfo};
use camera_swap::main_context;
use image::RgbImage;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Poll until `condition` holds or the deadline passes
fn wait_for(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[derive(Default)]
struct Frames {
    count: AtomicUsize,
    sizes: Mutex<Vec<(u32, u32)>>,
}

impl FrameConsumer for Frames {
    fn on_frame(&self, data: &[u8], width: u32, height: u32) -> Result<(), CallbackError> {
        assert_eq!(data.len(), yuv420_frame_size(width, height));
        self.count.fetch_add(1, Ordering::SeqCst);
        self.sizes.lock().unwrap().push((width, height));
        Ok(())
    }
}

impl LegacyPreviewCallback for Frames {
    fn on_preview_frame(&self, data: &[u8], _: &InstanceHandle) -> Result<(), CallbackError> {
        if data.is_empty() {
            return Err("empty frame".into());
        }
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct Thumbnails(Mutex<Vec<(u32, u32)>>);

impl ThumbnailSink for Thumbnails {
    fn update_preview(&self, image: RgbImage) {
        self.0.lock().unwrap().push(image.dimensions());
    }
}

#[derive(Default)]
struct Jpegs(Mutex<Vec<Vec<u8>>>);

impl PictureCallback for Jpegs {
    fn on_picture_taken(&self, jpeg: &[u8], _: Option<&InstanceHandle>) {
        self.0.lock().unwrap().push(jpeg.to_vec());
    }
}

struct Rig {
    dispatcher: Dispatcher,
    renderer: Arc<SyntheticRenderer>,
    main_loop: main_context::MainLoop,
    _media: tempfile::TempDir,
}

fn rig(thumbnails: Option<Arc<Thumbnails>>) -> Rig {
    let media = tempfile::tempdir().unwrap();
    fs::write(media.path().join("clip.mp4"), b"replacement video").unwrap();

    let bridge = Arc::new(FrameBridge::new());
    let renderer = Arc::new(
        SyntheticRenderer::new(bridge.clone(), 120)
            .with_default_info(TargetInfo::new(64, 48, pixel_format::OPAQUE)),
    );
    let (main, main_loop) = main_context::channel();
    let store = Arc::new(MemorySettingsStore::new(Settings {
        media_id: Some("clip.mp4".into()),
        thumbnail_interval_ms: 0,
        ..Default::default()
    }));

    let mut ctx = EngineContext::new(
        store,
        Arc::new(DirectoryMediaResolver::new(media.path())),
        renderer.clone(),
        Arc::new(StaticPlatform::new().with_camera("0", 90)),
        bridge,
        main,
    );
    if let Some(sink) = thumbnails {
        ctx = ctx.with_thumbnail_sink(sink);
    }
    ctx.refresh();
    assert!(ctx.is_ready());

    Rig {
        dispatcher: Dispatcher::new(Arc::new(ctx)),
        renderer,
        main_loop,
        _media: media,
    }
}

#[test]
fn test_modern_session_streams_frames() {
    let thumbnails = Arc::new(Thumbnails::default());
    let rig = rig(Some(thumbnails.clone()));
    let frames = Arc::new(Frames::default());
    rig.dispatcher
        .context()
        .bridge()
        .set_modern_consumer(Some(frames.clone()));

    let camera = InstanceHandle::new();
    let preview = Target::new();
    rig.dispatcher.dispatch(
        CallSite::Modern(ModernSite::DeviceOpened),
        &camera,
        HookArgs::CameraId("0".into()),
    );
    rig.dispatcher.dispatch(
        CallSite::Modern(ModernSite::CreateCaptureSessionWithConfig),
        &camera,
        HookArgs::Outputs(SessionOutputs::SessionConfiguration(vec![
            OutputConfiguration::new(preview.clone()),
        ])),
    );

    assert!(wait_for(Duration::from_secs(2), || {
        frames.count.load(Ordering::SeqCst) >= 3
    }));
    assert!(frames.sizes.lock().unwrap().iter().all(|&s| s == (64, 48)));
    assert!(wait_for(Duration::from_secs(2), || {
        !thumbnails.0.lock().unwrap().is_empty()
    }));
    assert_eq!(thumbnails.0.lock().unwrap()[0], (16, 12));

    rig.dispatcher
        .dispatch(CallSite::Modern(ModernSite::Close), &camera, HookArgs::None);
    assert!(wait_for(Duration::from_secs(1), || !rig.renderer.is_producing()));
}

#[test]
fn test_legacy_preview_and_capture() {
    let mut rig = rig(None);
    let frames = Arc::new(Frames::default());
    let jpegs = Arc::new(Jpegs::default());
    let camera = InstanceHandle::new();
    let display = Target::new();
    let legacy = CallSite::Legacy;

    rig.dispatcher.dispatch(
        legacy(LegacySite::Open),
        &camera,
        HookArgs::Open {
            index: Some(0),
            default_size: Some(Size::new(32, 24)),
        },
    );
    rig.dispatcher.dispatch(
        legacy(LegacySite::SetPreviewDisplay),
        &camera,
        HookArgs::Display(Some(display.clone())),
    );
    rig.dispatcher.dispatch(
        legacy(LegacySite::SetPreviewCallback),
        &camera,
        HookArgs::PreviewCallback(Some(frames.clone())),
    );
    rig.dispatcher
        .dispatch(legacy(LegacySite::StartPreview), &camera, HookArgs::None);

    assert!(wait_for(Duration::from_secs(2), || {
        frames.count.load(Ordering::SeqCst) >= 2
    }));
    assert_eq!(rig.renderer.frame_size(), Some((32, 24)));

    rig.dispatcher.dispatch(
        legacy(LegacySite::TakePicture),
        &camera,
        HookArgs::Picture(Some(jpegs.clone())),
    );
    assert!(rig.main_loop.blocking_run_next());

    let jpegs = jpegs.0.lock().unwrap();
    assert_eq!(jpegs.len(), 1);
    let decoded = image::load_from_memory(&jpegs[0]).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 24));
}

#[test]
fn test_capture_without_renderer_reports_empty() {
    let bridge = Arc::new(FrameBridge::new());
    let (main, mut main_loop) = main_context::channel();
    let jpegs = Arc::new(Jpegs::default());
    let policy = CapturePolicy {
        attempts: 3,
        delay: Duration::from_millis(5),
        jpeg_quality: 80,
    };

    spawn_still_capture(bridge, main, policy, Some(jpegs.clone()), None);
    assert!(main_loop.blocking_run_next());
    assert_eq!(*jpegs.0.lock().unwrap(), vec![Vec::<u8>::new()]);
    // The worker dropped its context, so nothing else can arrive
    assert!(!main_loop.blocking_run_next());
}

#[test]
fn test_resize_never_exposes_partial_frame() {
    let bridge = FrameBridge::new();
    bridge.write_frame(8, 8, |buf| buf.fill(50));
    assert!(bridge.snapshot().is_some());

    bridge.ensure_buffer(yuv420_frame_size(16, 16));
    assert!(bridge.snapshot().is_none());

    {
        let mut writer = bridge.writer();
        writer.fill(60);
    }
    assert!(bridge.snapshot().is_none(), "Unpublished frame must stay hidden");
    assert!(bridge.publish(16, 16));
    let snapshot = bridge.snapshot().unwrap();
    assert!(snapshot.data.iter().all(|&b| b == 60));
}

struct Panicking;

impl FrameConsumer for Panicking {
    fn on_frame(&self, _: &[u8], _: u32, _: u32) -> Result<(), CallbackError> {
        panic!("consumer bug");
    }
}

#[test]
fn test_consumer_panic_does_not_stop_delivery() {
    let bridge = FrameBridge::new();
    let camera = InstanceHandle::new();
    let frames = Arc::new(Frames::default());
    bridge.set_legacy_callback(Some(frames.clone()), &camera);
    bridge.set_modern_consumer(Some(Arc::new(Panicking)));

    assert!(bridge.write_frame(4, 4, |_| {}));
    assert!(bridge.write_frame(4, 4, |_| {}));
    assert_eq!(frames.count.load(Ordering::SeqCst), 2);
    assert_eq!(bridge.published_frames(), 2);
}
