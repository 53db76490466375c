// SPDX-License-Identifier: MPL-2.0

//! camera-swap - camera interception and session synchronization engine
//!
//! The engine sits between a host application and its camera API. It
//! follows every camera instance through its lifecycle, decides which
//! rendering target the replacement video goes to, keeps the native renderer
//! registered to exactly that target, and feeds the rendered frames back into
//! the application's preview callbacks.
//!
//! # Architecture
//!
//! - [`dispatch`]: per-call-site hook adapters and the dispatcher
//! - [`engine`]: session registry, active-instance tracking, target
//!   selection, registration and the [`EngineContext`] tying them together
//! - [`gateway`]: the contract with the native renderer, plus a synthetic and
//!   a recording implementation
//! - [`bridge`]: replacement frame buffer, preview fan-out, still capture and
//!   thumbnails
//! - [`config`]: settings and where they are stored
//! - [`main_context`]: the host's main-thread task queue
//!
//! # Example
//!
//! ```ignore
//! let ctx = Arc::new(EngineContext::new(store, resolver, gateway, platform, bridge, main));
//! ctx.refresh();
//! let dispatcher = Dispatcher::new(ctx);
//! dispatcher.attach(&host);
//! let outcome = dispatcher.dispatch(
//!     CallSite::Legacy(LegacySite::StartPreview),
//!     &camera,
//!     HookArgs::None,
//! );
//! ```

pub mod bridge;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod main_context;
pub mod media;

// Re-export commonly used types
pub use bridge::{FrameBridge, FrameConsumer, LegacyPreviewCallback, PictureCallback, ThumbnailSink};
pub use config::{JsonSettingsStore, Settings, SettingsStore};
pub use dispatch::{
    CallSite, Dispatcher, HookArgs, HookHost, HookOutcome, HostSite, LegacySite, ModernSite,
    NeutralResult, PlatformServices,
};
pub use engine::{ApiGeneration, EngineContext, InstanceHandle, Orientation, Target, TextureHandle};
pub use errors::{EngineError, EngineResult};
pub use gateway::{RendererGateway, TargetInfo};
pub use main_context::{MainContext, MainLoop};
