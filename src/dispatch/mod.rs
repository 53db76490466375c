// SPDX-License-Identifier: GPL-3.0-only

//! Interception of camera API calls
//!
//! The host binding attaches one hook per [`CallSite`] and forwards every
//! invocation to [`Dispatcher::dispatch`]. Each call site is served by a
//! [`HookAdapter`] from a per-generation table; the adapter reads and updates
//! session state through the [`EngineContext`] and tells the host what to do
//! with the real call through a [`HookOutcome`].
//!
//! While the gate is closed (feature disabled or no replacement source ready)
//! every camera dispatch is a pure pass-through. The host lifecycle sites are
//! the exception: they reload the settings, which is how the gate reopens.

/// Hook chatter: `info` when verbose logging is on, `trace` otherwise
macro_rules! hook_log {
    ($ctx:expr, $($arg:tt)+) => {
        if $ctx.verbose() {
            tracing::info!($($arg)+);
        } else {
            tracing::trace!($($arg)+);
        }
    };
}

pub mod host;
pub mod legacy;
pub mod modern;
pub mod platform;

pub use platform::{PlatformServices, StaticPlatform, TargetResolver};

use crate::bridge::{LegacyPreviewCallback, PictureCallback};
use crate::engine::EngineContext;
use crate::engine::handles::{InstanceHandle, Target, TextureHandle};
use crate::engine::selector::SessionOutputs;
use crate::engine::session::ApiGeneration;
use crate::errors::AttachError;
use crate::gateway::TransformMatrix;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Legacy-generation call sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LegacySite {
    Open,
    SetPreviewTexture,
    SetPreviewDisplay,
    SetDisplayOrientation,
    SetParameters,
    StartPreview,
    StopPreview,
    Release,
    SetPreviewCallback,
    SetPreviewCallbackWithBuffer,
    AddCallbackBuffer,
    TakePicture,
}

impl LegacySite {
    pub const ALL: [LegacySite; 12] = [
        LegacySite::Open,
        LegacySite::SetPreviewTexture,
        LegacySite::SetPreviewDisplay,
        LegacySite::SetDisplayOrientation,
        LegacySite::SetParameters,
        LegacySite::StartPreview,
        LegacySite::StopPreview,
        LegacySite::Release,
        LegacySite::SetPreviewCallback,
        LegacySite::SetPreviewCallbackWithBuffer,
        LegacySite::AddCallbackBuffer,
        LegacySite::TakePicture,
    ];

    pub fn method_name(&self) -> &'static str {
        match self {
            LegacySite::Open => "open",
            LegacySite::SetPreviewTexture => "setPreviewTexture",
            LegacySite::SetPreviewDisplay => "setPreviewDisplay",
            LegacySite::SetDisplayOrientation => "setDisplayOrientation",
            LegacySite::SetParameters => "setParameters",
            LegacySite::StartPreview => "startPreview",
            LegacySite::StopPreview => "stopPreview",
            LegacySite::Release => "release",
            LegacySite::SetPreviewCallback => "setPreviewCallback",
            LegacySite::SetPreviewCallbackWithBuffer => "setPreviewCallbackWithBuffer",
            LegacySite::AddCallbackBuffer => "addCallbackBuffer",
            LegacySite::TakePicture => "takePicture",
        }
    }
}

/// Modern-generation call sites
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModernSite {
    OpenCamera,
    DeviceOpened,
    CreateCaptureSession,
    CreateCaptureSessionWithConfig,
    Close,
    Capture,
    CaptureBurst,
    SetRepeatingRequest,
    SetRepeatingBurst,
}

impl ModernSite {
    pub const ALL: [ModernSite; 9] = [
        ModernSite::OpenCamera,
        ModernSite::DeviceOpened,
        ModernSite::CreateCaptureSession,
        ModernSite::CreateCaptureSessionWithConfig,
        ModernSite::Close,
        ModernSite::Capture,
        ModernSite::CaptureBurst,
        ModernSite::SetRepeatingRequest,
        ModernSite::SetRepeatingBurst,
    ];

    pub fn method_name(&self) -> &'static str {
        match self {
            ModernSite::OpenCamera => "openCamera",
            ModernSite::DeviceOpened => "onOpened",
            ModernSite::CreateCaptureSession => "createCaptureSession(List)",
            ModernSite::CreateCaptureSessionWithConfig => "createCaptureSession(SessionConfiguration)",
            ModernSite::Close => "close",
            ModernSite::Capture => "capture",
            ModernSite::CaptureBurst => "captureBurst",
            ModernSite::SetRepeatingRequest => "setRepeatingRequest",
            ModernSite::SetRepeatingBurst => "setRepeatingBurst",
        }
    }
}

/// Host application entry points outside the camera APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostSite {
    ApplicationCreated,
    ActivityResumed,
    /// GL uniform upload, carrying the preview texture transform
    UniformMatrix,
}

impl HostSite {
    pub const ALL: [HostSite; 3] = [
        HostSite::ApplicationCreated,
        HostSite::ActivityResumed,
        HostSite::UniformMatrix,
    ];

    pub fn method_name(&self) -> &'static str {
        match self {
            HostSite::ApplicationCreated => "Application.onCreate",
            HostSite::ActivityResumed => "Activity.onResume",
            HostSite::UniformMatrix => "GLES20.glUniformMatrix4fv",
        }
    }
}

/// One interceptable entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CallSite {
    Legacy(LegacySite),
    Modern(ModernSite),
    Host(HostSite),
}

impl CallSite {
    /// Camera API generation of the site; None for host sites
    pub fn generation(&self) -> Option<ApiGeneration> {
        match self {
            CallSite::Legacy(_) => Some(ApiGeneration::Legacy),
            CallSite::Modern(_) => Some(ApiGeneration::Modern),
            CallSite::Host(_) => None,
        }
    }

    /// Whether dispatch is skipped while the gate is closed
    pub fn is_gated(&self) -> bool {
        !matches!(
            self,
            CallSite::Host(HostSite::ApplicationCreated | HostSite::ActivityResumed)
        )
    }

    /// Every site of both generations and of the host
    pub fn all() -> impl Iterator<Item = CallSite> {
        LegacySite::ALL
            .into_iter()
            .map(CallSite::Legacy)
            .chain(ModernSite::ALL.into_iter().map(CallSite::Modern))
            .chain(HostSite::ALL.into_iter().map(CallSite::Host))
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallSite::Legacy(site) => write!(f, "legacy.{}", site.method_name()),
            CallSite::Modern(site) => write!(f, "modern.{}", site.method_name()),
            CallSite::Host(site) => write!(f, "host.{}", site.method_name()),
        }
    }
}

/// When the hook runs relative to the real call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    Before,
    After,
}

/// What a hook does to the real call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// Record state, let the call run unchanged
    Observe,
    /// Record state and inform the renderer, let the call run
    Augment,
    /// Replace the call with a neutral result
    Suppress,
}

/// Value returned to the application instead of running a suppressed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeutralResult {
    /// Void methods
    Unit,
    /// Capture submissions
    SequenceId(i32),
}

/// Verdict of a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// Gate closed or nothing to do; the host behaves as if unhooked
    PassThrough,
    /// State recorded; the host runs the real call
    Proceed,
    /// The host skips the real call and returns the neutral result
    Suppress(NeutralResult),
}

/// Width and height pair reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Arguments of an intercepted call, already converted by the host binding
#[derive(Clone, Default)]
pub enum HookArgs {
    #[default]
    None,
    /// Legacy open: camera index, and the default preview size if known
    Open {
        index: Option<i32>,
        default_size: Option<Size>,
    },
    /// Legacy preview texture, with its current transform if the host read it
    Texture {
        texture: TextureHandle,
        matrix: Option<TransformMatrix>,
    },
    Display(Option<Target>),
    Degrees(i32),
    Parameters {
        preview_size: Option<Size>,
        picture_size: Option<Size>,
    },
    PreviewCallback(Option<Arc<dyn LegacyPreviewCallback>>),
    /// JPEG completion of a still capture, if the application wants one
    Picture(Option<Arc<dyn PictureCallback>>),
    CameraId(String),
    Outputs(SessionOutputs),
    Matrix(TransformMatrix),
}

impl fmt::Debug for HookArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookArgs::None => write!(f, "None"),
            HookArgs::Open {
                index,
                default_size,
            } => f
                .debug_struct("Open")
                .field("index", index)
                .field("default_size", default_size)
                .finish(),
            HookArgs::Texture { texture, matrix } => f
                .debug_struct("Texture")
                .field("texture", &texture.id())
                .field("matrix", matrix)
                .finish(),
            HookArgs::Display(target) => {
                write!(f, "Display({:?})", target.as_ref().map(Target::id))
            }
            HookArgs::Degrees(degrees) => write!(f, "Degrees({})", degrees),
            HookArgs::Parameters {
                preview_size,
                picture_size,
            } => f
                .debug_struct("Parameters")
                .field("preview_size", preview_size)
                .field("picture_size", picture_size)
                .finish(),
            HookArgs::PreviewCallback(cb) => write!(f, "PreviewCallback(set={})", cb.is_some()),
            HookArgs::Picture(cb) => write!(f, "Picture(set={})", cb.is_some()),
            HookArgs::CameraId(id) => write!(f, "CameraId({})", id),
            HookArgs::Outputs(outputs) => write!(f, "Outputs({})", outputs.flatten().len()),
            HookArgs::Matrix(matrix) => write!(f, "Matrix({:?})", matrix),
        }
    }
}

/// Handler for one call site
pub trait HookAdapter: Send + Sync {
    fn site(&self) -> CallSite;
    fn phase(&self) -> HookPhase;
    fn action(&self) -> HookAction;

    /// Runs with the gate open
    fn handle(&self, ctx: &EngineContext, instance: &InstanceHandle, args: HookArgs)
    -> HookOutcome;
}

type HandlerFn = fn(&EngineContext, &InstanceHandle, HookArgs) -> HookOutcome;

/// Adapter backed by a plain function
pub struct FnAdapter {
    site: CallSite,
    phase: HookPhase,
    action: HookAction,
    handler: HandlerFn,
}

impl FnAdapter {
    pub fn new(site: CallSite, phase: HookPhase, action: HookAction, handler: HandlerFn) -> Self {
        Self {
            site,
            phase,
            action,
            handler,
        }
    }

    pub fn boxed(
        site: CallSite,
        phase: HookPhase,
        action: HookAction,
        handler: HandlerFn,
    ) -> Box<dyn HookAdapter> {
        Box::new(Self::new(site, phase, action, handler))
    }
}

impl HookAdapter for FnAdapter {
    fn site(&self) -> CallSite {
        self.site
    }

    fn phase(&self) -> HookPhase {
        self.phase
    }

    fn action(&self) -> HookAction {
        self.action
    }

    fn handle(
        &self,
        ctx: &EngineContext,
        instance: &InstanceHandle,
        args: HookArgs,
    ) -> HookOutcome {
        (self.handler)(ctx, instance, args)
    }
}

/// The host's hooking facility
pub trait HookHost {
    /// Install a hook on the site; fails if the method does not exist here
    fn attach(&self, site: CallSite, phase: HookPhase) -> Result<(), AttachError>;
}

/// Routes intercepted calls to their adapters
pub struct Dispatcher {
    ctx: Arc<EngineContext>,
    adapters: HashMap<CallSite, Box<dyn HookAdapter>>,
    attached: Mutex<BTreeSet<CallSite>>,
}

impl Dispatcher {
    /// Dispatcher with the built-in tables of both generations and the host
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        let mut dispatcher = Self::empty(ctx);
        let tables = legacy::adapters()
            .into_iter()
            .chain(modern::adapters())
            .chain(host::adapters());
        for adapter in tables {
            dispatcher.register(adapter);
        }
        dispatcher
    }

    /// Dispatcher without any adapter
    pub fn empty(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            adapters: HashMap::new(),
            attached: Mutex::new(BTreeSet::new()),
        }
    }

    /// Add or replace the adapter for its site
    pub fn register(&mut self, adapter: Box<dyn HookAdapter>) -> Option<Box<dyn HookAdapter>> {
        self.adapters.insert(adapter.site(), adapter)
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn adapter(&self, site: CallSite) -> Option<&dyn HookAdapter> {
        self.adapters.get(&site).map(|a| a.as_ref())
    }

    /// Attach every adapter's site; returns how many are live
    ///
    /// A site the host cannot attach is logged and skipped.
    pub fn attach(&self, host: &dyn HookHost) -> usize {
        let mut attached = self.attached.lock().unwrap_or_else(PoisonError::into_inner);
        let mut sites: Vec<_> = self.adapters.values().collect();
        sites.sort_by_key(|a| a.site());

        for adapter in sites {
            let site = adapter.site();
            if attached.contains(&site) {
                continue;
            }
            match host.attach(site, adapter.phase()) {
                Ok(()) => {
                    debug!(site = %site, "Hook attached");
                    attached.insert(site);
                }
                Err(e) => warn!(site = %site, error = %e, "Failed to attach hook"),
            }
        }

        info!(
            attached = attached.len(),
            total = self.adapters.len(),
            "Hook attachment finished"
        );
        attached.len()
    }

    pub fn attached_sites(&self) -> Vec<CallSite> {
        self.attached
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Handle one intercepted call
    pub fn dispatch(&self, site: CallSite, instance: &InstanceHandle, args: HookArgs) -> HookOutcome {
        if site.is_gated() && !self.ctx.is_ready() {
            return HookOutcome::PassThrough;
        }
        let Some(adapter) = self.adapters.get(&site) else {
            return HookOutcome::PassThrough;
        };

        hook_log!(self.ctx, site = %site, instance = %instance.id(), "Hook fired");
        let ctx = self.ctx.as_ref();
        match panic::catch_unwind(AssertUnwindSafe(|| adapter.handle(ctx, instance, args))) {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(site = %site, "Hook handler panicked, passing call through");
                HookOutcome::PassThrough
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_site_tables_complete() {
        assert_eq!(CallSite::all().count(), 24);
        let legacy = legacy::adapters();
        let modern = modern::adapters();
        let host = host::adapters();
        assert_eq!(legacy.len(), LegacySite::ALL.len());
        assert_eq!(modern.len(), ModernSite::ALL.len());
        assert_eq!(host.len(), HostSite::ALL.len());
        assert!(
            legacy
                .iter()
                .all(|a| a.site().generation() == Some(ApiGeneration::Legacy))
        );
        assert!(
            modern
                .iter()
                .all(|a| a.site().generation() == Some(ApiGeneration::Modern))
        );
        assert!(host.iter().all(|a| a.site().generation().is_none()));
    }

    #[test]
    fn test_site_phases_and_actions() {
        let table: HashMap<CallSite, (HookPhase, HookAction)> = legacy::adapters()
            .into_iter()
            .chain(modern::adapters())
            .chain(host::adapters())
            .map(|a| (a.site(), (a.phase(), a.action())))
            .collect();

        assert_eq!(
            table[&CallSite::Legacy(LegacySite::Open)],
            (HookPhase::After, HookAction::Observe)
        );
        assert_eq!(
            table[&CallSite::Legacy(LegacySite::StartPreview)],
            (HookPhase::Before, HookAction::Suppress)
        );
        assert_eq!(
            table[&CallSite::Modern(ModernSite::DeviceOpened)],
            (HookPhase::After, HookAction::Observe)
        );
        assert_eq!(
            table[&CallSite::Modern(ModernSite::CreateCaptureSessionWithConfig)],
            (HookPhase::Before, HookAction::Augment)
        );
        assert_eq!(
            table[&CallSite::Modern(ModernSite::SetRepeatingBurst)],
            (HookPhase::Before, HookAction::Suppress)
        );
        assert_eq!(
            table[&CallSite::Host(HostSite::ActivityResumed)],
            (HookPhase::After, HookAction::Observe)
        );
    }

    #[test]
    fn test_call_site_display() {
        assert_eq!(
            CallSite::Legacy(LegacySite::TakePicture).to_string(),
            "legacy.takePicture"
        );
        assert_eq!(CallSite::Modern(ModernSite::Close).to_string(), "modern.close");
        assert_eq!(
            CallSite::Host(HostSite::ActivityResumed).to_string(),
            "host.Activity.onResume"
        );
    }

    #[test]
    fn test_only_lifecycle_sites_skip_gate() {
        assert!(!CallSite::Host(HostSite::ApplicationCreated).is_gated());
        assert!(!CallSite::Host(HostSite::ActivityResumed).is_gated());
        assert!(CallSite::Host(HostSite::UniformMatrix).is_gated());
        assert!(CallSite::all().filter(|s| !s.is_gated()).count() == 2);
    }
}
