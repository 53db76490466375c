// SPDX-License-Identifier: GPL-3.0-only

//! Modern camera API hooks
//!
//! Here the preview target arrives with the capture-session creation call,
//! which carries every output the application wants. The selected target is
//! registered with force because a new session always means the renderer
//! has to rebind, even to the same target. A session created on a camera
//! that is no longer the active one only updates its own record.

use super::{
    CallSite, FnAdapter, HookAction, HookAdapter, HookArgs, HookOutcome, HookPhase, ModernSite,
    NeutralResult,
};
use crate::constants::session as defaults;
use crate::engine::EngineContext;
use crate::engine::handles::InstanceHandle;
use crate::engine::selector::select_target;
use crate::engine::session::{ApiGeneration, CameraSession, Orientation};
use crate::engine::store::lock_session;
use tracing::debug;

const GEN: ApiGeneration = ApiGeneration::Modern;

/// Adapter table for every modern call site
pub fn adapters() -> Vec<Box<dyn HookAdapter>> {
    use HookAction::*;
    use HookPhase::*;
    use ModernSite::*;

    let table: [(ModernSite, HookPhase, HookAction, super::HandlerFn); 9] = [
        (OpenCamera, Before, Observe, on_open_camera),
        (DeviceOpened, After, Observe, on_device_opened),
        (CreateCaptureSession, Before, Augment, on_create_capture_session),
        (CreateCaptureSessionWithConfig, Before, Augment, on_create_capture_session),
        (Close, Before, Observe, on_close),
        (Capture, Before, Suppress, suppress_request),
        (CaptureBurst, Before, Suppress, suppress_request),
        (SetRepeatingRequest, Before, Suppress, suppress_request),
        (SetRepeatingBurst, Before, Suppress, suppress_request),
    ];

    table
        .into_iter()
        .map(|(site, phase, action, handler)| {
            FnAdapter::boxed(CallSite::Modern(site), phase, action, handler)
        })
        .collect()
}

/// Re-read both orientations from the platform, falling back to defaults
fn refresh_orientations(ctx: &EngineContext, session: &mut CameraSession) {
    let sensor = ctx
        .platform()
        .modern_sensor_orientation(&session.camera_id)
        .unwrap_or_else(|e| {
            debug!(camera_id = %session.camera_id, error = %e, "Sensor orientation unavailable");
            defaults::MODERN_FALLBACK_SENSOR_ORIENTATION as i32
        });
    let display = ctx.platform().display_rotation().unwrap_or_else(|e| {
        debug!(error = %e, "Display rotation unavailable");
        defaults::FALLBACK_DISPLAY_ORIENTATION as i32
    });
    session.sensor_orientation = Orientation::from_degrees(sensor);
    session.display_orientation = Orientation::from_degrees(display);
}

fn on_open_camera(ctx: &EngineContext, _: &InstanceHandle, args: HookArgs) -> HookOutcome {
    if let HookArgs::CameraId(camera_id) = args {
        hook_log!(ctx, camera_id = %camera_id, "Application opening camera");
    }
    HookOutcome::Proceed
}

fn on_device_opened(ctx: &EngineContext, instance: &InstanceHandle, args: HookArgs) -> HookOutcome {
    let shared = ctx.sessions().get_or_create(instance, GEN);
    let mut session = lock_session(&shared);
    if let HookArgs::CameraId(camera_id) = args {
        session.camera_id = camera_id;
    }
    refresh_orientations(ctx, &mut session);
    ctx.active().set_active(GEN, instance);

    hook_log!(
        ctx,
        instance = %instance.id(),
        camera_id = %session.camera_id,
        sensor = %session.sensor_orientation,
        display = %session.display_orientation,
        "Modern camera opened"
    );
    HookOutcome::Proceed
}

fn on_create_capture_session(
    ctx: &EngineContext,
    instance: &InstanceHandle,
    args: HookArgs,
) -> HookOutcome {
    let candidates = match args {
        HookArgs::Outputs(outputs) => outputs.flatten(),
        _ => Vec::new(),
    };

    let shared = ctx.sessions().get_or_create(instance, GEN);
    let mut session = lock_session(&shared);
    refresh_orientations(ctx, &mut session);

    match select_target(&candidates, ctx.gateway()) {
        Some(selection) => {
            hook_log!(
                ctx,
                target = %selection.target.id(),
                width = selection.info.width,
                height = selection.info.height,
                format = selection.info.format,
                "Selected preview target"
            );
            session.set_target(Some(&selection.target));
            session.set_picture_size(selection.info.width, selection.info.height);
        }
        None => {
            hook_log!(ctx, candidates = candidates.len(), "No usable preview target");
            session.set_target(None);
        }
    }

    if !ctx.active().is_active(GEN, instance) {
        hook_log!(ctx, instance = %instance.id(), "Ignored session creation on inactive camera");
        return HookOutcome::Proceed;
    }

    ctx.throttle().reset();
    ctx.push_parameters(&session, false);
    ctx.register_session(&session, true);
    ctx.gateway().request_renderer_start();
    HookOutcome::Proceed
}

fn on_close(ctx: &EngineContext, instance: &InstanceHandle, _: HookArgs) -> HookOutcome {
    if ctx.release_instance(GEN, instance) {
        hook_log!(ctx, instance = %instance.id(), "Modern camera closed");
    } else {
        hook_log!(ctx, instance = %instance.id(), "Ignored stale close");
    }
    HookOutcome::Proceed
}

fn suppress_request(_: &EngineContext, _: &InstanceHandle, _: HookArgs) -> HookOutcome {
    HookOutcome::Suppress(NeutralResult::SequenceId(0))
}
