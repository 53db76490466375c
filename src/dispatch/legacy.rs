// SPDX-License-Identifier: GPL-3.0-only

//! Legacy camera API hooks
//!
//! The legacy API is a single camera object driven through open, preview
//! target, parameters, start/stop preview and release. Preview frames and
//! still captures are served from the replacement frame bridge, so the
//! application's buffers and the real capture path are never used.

use super::{
    CallSite, FnAdapter, HookAction, HookAdapter, HookArgs, HookOutcome, HookPhase, LegacySite,
    NeutralResult,
};
use crate::bridge::spawn_still_capture;
use crate::constants::session as defaults;
use crate::engine::EngineContext;
use crate::engine::handles::InstanceHandle;
use crate::engine::session::{ApiGeneration, Orientation};
use crate::engine::store::lock_session;
use std::sync::Arc;
use tracing::debug;

const GEN: ApiGeneration = ApiGeneration::Legacy;

const SUPPRESS: HookOutcome = HookOutcome::Suppress(NeutralResult::Unit);

/// Adapter table for every legacy call site
pub fn adapters() -> Vec<Box<dyn HookAdapter>> {
    use HookAction::*;
    use HookPhase::*;
    use LegacySite::*;

    let table: [(LegacySite, HookPhase, HookAction, super::HandlerFn); 12] = [
        (Open, After, Observe, on_open),
        (SetPreviewTexture, Before, Augment, on_set_preview_texture),
        (SetPreviewDisplay, Before, Augment, on_set_preview_display),
        (SetDisplayOrientation, Before, Augment, on_set_display_orientation),
        (SetParameters, After, Observe, on_set_parameters),
        (StartPreview, Before, Suppress, on_start_preview),
        (StopPreview, Before, Observe, on_stop_preview),
        (Release, Before, Observe, on_release),
        (SetPreviewCallback, Before, Suppress, on_set_preview_callback),
        (SetPreviewCallbackWithBuffer, Before, Suppress, on_set_preview_callback),
        (AddCallbackBuffer, Before, Suppress, on_add_callback_buffer),
        (TakePicture, Before, Suppress, on_take_picture),
    ];

    table
        .into_iter()
        .map(|(site, phase, action, handler)| {
            FnAdapter::boxed(CallSite::Legacy(site), phase, action, handler)
        })
        .collect()
}

fn on_open(ctx: &EngineContext, instance: &InstanceHandle, args: HookArgs) -> HookOutcome {
    let (index, default_size) = match args {
        HookArgs::Open {
            index,
            default_size,
        } => (index, default_size),
        _ => (None, None),
    };

    let camera_id = index
        .map(|i| i.to_string())
        .unwrap_or_else(|| defaults::LEGACY_DEFAULT_CAMERA_ID.to_string());
    let sensor_degrees = camera_id
        .parse::<i32>()
        .ok()
        .and_then(|i| match ctx.platform().legacy_sensor_orientation(i) {
            Ok(degrees) => Some(degrees),
            Err(e) => {
                debug!(camera_id = %camera_id, error = %e, "Sensor orientation unavailable");
                None
            }
        })
        .unwrap_or(defaults::LEGACY_FALLBACK_SENSOR_ORIENTATION as i32);

    let shared = ctx.sessions().get_or_create(instance, GEN);
    let mut session = lock_session(&shared);
    session.camera_id = camera_id;
    session.sensor_orientation = Orientation::from_degrees(sensor_degrees);
    ctx.active().set_active(GEN, instance);

    hook_log!(
        ctx,
        instance = %instance.id(),
        camera_id = %session.camera_id,
        sensor = %session.sensor_orientation,
        "Legacy camera opened"
    );

    if let Some(size) = default_size {
        session.set_picture_size(size.width, size.height);
        ctx.push_parameters(&session, false);
    }
    HookOutcome::Proceed
}

fn on_set_preview_texture(
    ctx: &EngineContext,
    instance: &InstanceHandle,
    args: HookArgs,
) -> HookOutcome {
    let HookArgs::Texture { texture, matrix } = args else {
        return HookOutcome::Proceed;
    };
    let target = match ctx.targets().resolve(&texture, ctx.platform()) {
        Ok(target) => Some(target),
        Err(e) => {
            debug!(texture = %texture.id(), error = %e, "Texture has no target");
            None
        }
    };

    let shared = ctx.sessions().get_or_create(instance, GEN);
    lock_session(&shared).set_target(target.as_ref());
    if let Some(matrix) = matrix.filter(|_| ctx.active().is_active(GEN, instance)) {
        ctx.gateway().update_external_matrix(&matrix);
    }
    hook_log!(ctx, instance = %instance.id(), texture = %texture.id(), "Preview texture set");
    HookOutcome::Proceed
}

fn on_set_preview_display(
    ctx: &EngineContext,
    instance: &InstanceHandle,
    args: HookArgs,
) -> HookOutcome {
    let target = match args {
        HookArgs::Display(target) => target,
        _ => None,
    };
    let shared = ctx.sessions().get_or_create(instance, GEN);
    lock_session(&shared).set_target(target.as_ref());
    hook_log!(ctx, instance = %instance.id(), has_target = target.is_some(), "Preview display set");
    HookOutcome::Proceed
}

fn on_set_display_orientation(
    ctx: &EngineContext,
    instance: &InstanceHandle,
    args: HookArgs,
) -> HookOutcome {
    let HookArgs::Degrees(degrees) = args else {
        return HookOutcome::Proceed;
    };
    let orientation = Orientation::from_degrees(degrees);
    let shared = ctx.sessions().get_or_create(instance, GEN);
    lock_session(&shared).display_orientation = orientation;

    if ctx.active().is_active(GEN, instance) {
        ctx.gateway().update_display_orientation(orientation);
    }
    hook_log!(ctx, instance = %instance.id(), %orientation, "Display orientation set");
    HookOutcome::Proceed
}

fn on_set_parameters(ctx: &EngineContext, instance: &InstanceHandle, args: HookArgs) -> HookOutcome {
    let HookArgs::Parameters {
        preview_size,
        picture_size,
    } = args
    else {
        return HookOutcome::Proceed;
    };
    let Some(size) = preview_size.or(picture_size) else {
        return HookOutcome::Proceed;
    };

    let shared = ctx.sessions().get_or_create(instance, GEN);
    let mut session = lock_session(&shared);
    session.set_picture_size(size.width, size.height);
    hook_log!(
        ctx,
        camera_id = %session.camera_id,
        width = size.width,
        height = size.height,
        "Application set parameters"
    );

    if ctx.active().is_active(GEN, instance) {
        ctx.push_parameters(&session, true);
    }
    HookOutcome::Proceed
}

fn on_start_preview(ctx: &EngineContext, instance: &InstanceHandle, _: HookArgs) -> HookOutcome {
    if !ctx.active().is_active(GEN, instance) {
        hook_log!(ctx, instance = %instance.id(), "Ignored start on inactive camera");
        return SUPPRESS;
    }

    let Some(shared) = ctx.sessions().get(instance) else {
        return SUPPRESS;
    };
    let session = lock_session(&shared);
    if session.target().is_none() {
        hook_log!(ctx, instance = %instance.id(), "No preview target yet, not starting");
        return SUPPRESS;
    }
    ctx.register_session(&session, false);
    ctx.gateway().request_renderer_start();
    hook_log!(ctx, instance = %instance.id(), "Preview started");
    SUPPRESS
}

fn on_stop_preview(ctx: &EngineContext, instance: &InstanceHandle, _: HookArgs) -> HookOutcome {
    if !ctx.active().is_active(GEN, instance) {
        hook_log!(ctx, instance = %instance.id(), "Ignored stale stop");
        return HookOutcome::Proceed;
    }
    ctx.gateway().request_renderer_stop();
    ctx.registration().forget();
    hook_log!(ctx, instance = %instance.id(), "Preview stopped");
    HookOutcome::Proceed
}

fn on_release(ctx: &EngineContext, instance: &InstanceHandle, _: HookArgs) -> HookOutcome {
    if ctx.release_instance(GEN, instance) {
        hook_log!(ctx, instance = %instance.id(), "Legacy camera released");
    } else {
        hook_log!(ctx, instance = %instance.id(), "Ignored stale release");
    }
    HookOutcome::Proceed
}

fn on_set_preview_callback(
    ctx: &EngineContext,
    instance: &InstanceHandle,
    args: HookArgs,
) -> HookOutcome {
    let callback = match args {
        HookArgs::PreviewCallback(callback) => callback,
        _ => None,
    };
    hook_log!(ctx, instance = %instance.id(), set = callback.is_some(), "Preview callback");
    ctx.bridge().set_legacy_callback(callback, instance);
    SUPPRESS
}

fn on_add_callback_buffer(_: &EngineContext, _: &InstanceHandle, _: HookArgs) -> HookOutcome {
    SUPPRESS
}

fn on_take_picture(ctx: &EngineContext, instance: &InstanceHandle, args: HookArgs) -> HookOutcome {
    let HookArgs::Picture(Some(callback)) = args else {
        hook_log!(ctx, instance = %instance.id(), "Capture without JPEG callback");
        return SUPPRESS;
    };
    spawn_still_capture(
        Arc::clone(ctx.bridge()),
        ctx.main().clone(),
        ctx.capture_policy(),
        Some(callback),
        Some(instance.downgrade()),
    );
    SUPPRESS
}
