// SPDX-License-Identifier: GPL-3.0-only

//! Host application hooks
//!
//! Application start and activity resume are where the engine re-reads its
//! settings, so a user who toggles the feature or picks other media sees the
//! change the next time the application comes to the foreground. Neither
//! site is gated: reloading is the only way a closed gate opens again.

use super::{
    CallSite, FnAdapter, HookAction, HookAdapter, HookArgs, HookOutcome, HookPhase, HostSite,
};
use crate::engine::EngineContext;
use crate::engine::handles::InstanceHandle;

/// Adapter table for every host call site
pub fn adapters() -> Vec<Box<dyn HookAdapter>> {
    use HookAction::*;
    use HookPhase::*;
    use HostSite::*;

    let table: [(HostSite, HookPhase, HookAction, super::HandlerFn); 3] = [
        (ApplicationCreated, After, Observe, on_lifecycle),
        (ActivityResumed, After, Observe, on_lifecycle),
        (UniformMatrix, Before, Observe, on_uniform_matrix),
    ];

    table
        .into_iter()
        .map(|(site, phase, action, handler)| {
            FnAdapter::boxed(CallSite::Host(site), phase, action, handler)
        })
        .collect()
}

fn on_lifecycle(ctx: &EngineContext, _: &InstanceHandle, _: HookArgs) -> HookOutcome {
    let update = ctx.refresh();
    hook_log!(ctx, ?update, ready = ctx.is_ready(), "Host resumed, settings reloaded");
    HookOutcome::Proceed
}

fn on_uniform_matrix(ctx: &EngineContext, _: &InstanceHandle, args: HookArgs) -> HookOutcome {
    if let HookArgs::Matrix(matrix) = args {
        ctx.gateway().update_external_matrix(&matrix);
    }
    HookOutcome::Proceed
}
