// SPDX-License-Identifier: GPL-3.0-only

//! Session synchronization engine
//!
//! [`EngineContext`] owns every piece of shared state the hooks need. It is
//! built once when the host binding attaches and handed to the
//! [`Dispatcher`](crate::dispatch::Dispatcher) by reference.

pub mod active;
pub mod handles;
pub mod registration;
pub mod selector;
pub mod session;
pub mod source;
pub mod store;
pub mod throttle;

pub use active::ActiveSessionTracker;
pub use handles::{InstanceHandle, InstanceId, Target, TargetId, TextureHandle, TextureId};
pub use registration::{LastRegistration, RegistrationGuard};
pub use selector::{OutputConfiguration, Selection, SessionOutput, SessionOutputs, select_target};
pub use session::{ApiGeneration, CameraSession, Orientation};
pub use source::{DirectoryMediaResolver, MediaResolver, ReplacementSourceManager, SourceUpdate};
pub use store::{SessionStore, SharedSession, lock_session};
pub use throttle::ParameterThrottle;

use crate::bridge::{CapturePolicy, FrameBridge, ThumbnailSink, ThumbnailWorker};
use crate::config::{Settings, SettingsCell, SettingsStore};
use crate::dispatch::platform::{PlatformServices, TargetResolver};
use crate::gateway::{CameraParameters, RendererGateway, SharedGateway, TargetRegistration};
use crate::main_context::MainContext;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Shared state of one attached engine
pub struct EngineContext {
    settings: SettingsCell,
    settings_store: Arc<dyn SettingsStore>,
    resolver: Arc<dyn MediaResolver>,
    source: ReplacementSourceManager,
    sessions: SessionStore,
    active: ActiveSessionTracker,
    registration: RegistrationGuard,
    throttle: ParameterThrottle,
    targets: TargetResolver,
    bridge: Arc<FrameBridge>,
    gateway: SharedGateway,
    platform: Arc<dyn PlatformServices>,
    main: MainContext,
}

impl EngineContext {
    /// Build the context with a best-effort initial settings load
    ///
    /// Nothing is pushed to the renderer until [`refresh`](Self::refresh).
    pub fn new(
        settings_store: Arc<dyn SettingsStore>,
        resolver: Arc<dyn MediaResolver>,
        gateway: SharedGateway,
        platform: Arc<dyn PlatformServices>,
        bridge: Arc<FrameBridge>,
        main: MainContext,
    ) -> Self {
        let settings = settings_store.load().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load settings, using defaults");
            Settings::default()
        });

        Self {
            settings: SettingsCell::new(settings),
            settings_store,
            resolver,
            source: ReplacementSourceManager::new(),
            sessions: SessionStore::new(),
            active: ActiveSessionTracker::new(),
            registration: RegistrationGuard::new(),
            throttle: ParameterThrottle::new(),
            targets: TargetResolver::new(),
            bridge,
            gateway,
            platform,
            main,
        }
    }

    /// Start a thumbnail worker feeding `sink`, paced by the current settings
    pub fn with_thumbnail_sink(self, sink: Arc<dyn ThumbnailSink>) -> Self {
        let (interval, divisor) = self
            .settings
            .read(|s| (s.thumbnail_interval(), s.thumbnail_scale_divisor));
        match ThumbnailWorker::spawn(sink, interval, divisor) {
            Ok(worker) => self.bridge.set_thumbnail_worker(Some(worker)),
            Err(e) => warn!(error = %e, "Failed to start thumbnail worker"),
        }
        self
    }

    /// Gate: feature enabled and replacement source ready
    pub fn is_ready(&self) -> bool {
        self.settings.read(|s| s.enabled) && self.source.is_ready()
    }

    pub fn verbose(&self) -> bool {
        self.settings.read(|s| s.verbose_logging)
    }

    pub fn settings(&self) -> Settings {
        self.settings.get()
    }

    /// Re-read settings and reconcile the renderer with them
    ///
    /// If this closes the gate, the active preview is torn down here since
    /// hooks stop seeing calls from now on.
    pub fn refresh(&self) -> SourceUpdate {
        let was_ready = self.is_ready();

        if !self.settings.reload(self.settings_store.as_ref()) {
            debug!("Settings reload failed, keeping previous values");
        }
        let native = self.settings.read(Settings::native_config);
        self.gateway.update_native_config(&native);

        let update = self.source.update(
            &self.settings,
            self.settings_store.as_ref(),
            self.resolver.as_ref(),
            self.gateway.as_ref(),
        );

        let ready = self.is_ready();
        if was_ready && !ready {
            info!(?update, "Gate closed, tearing down active preview");
            self.teardown_all();
        }
        debug!(?update, ready, "Engine refreshed");
        update
    }

    fn teardown_all(&self) {
        if self.active.clear_all() {
            self.gateway.request_renderer_stop();
        }
        self.registration.forget();
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn active(&self) -> &ActiveSessionTracker {
        &self.active
    }

    pub fn registration(&self) -> &RegistrationGuard {
        &self.registration
    }

    pub fn throttle(&self) -> &ParameterThrottle {
        &self.throttle
    }

    pub fn targets(&self) -> &TargetResolver {
        &self.targets
    }

    pub fn source(&self) -> &ReplacementSourceManager {
        &self.source
    }

    pub fn bridge(&self) -> &Arc<FrameBridge> {
        &self.bridge
    }

    pub fn gateway(&self) -> &dyn RendererGateway {
        self.gateway.as_ref()
    }

    pub fn platform(&self) -> &dyn PlatformServices {
        self.platform.as_ref()
    }

    pub fn main(&self) -> &MainContext {
        &self.main
    }

    pub fn capture_policy(&self) -> CapturePolicy {
        self.settings.read(CapturePolicy::from_settings)
    }

    /// Push a session's geometry to the renderer
    ///
    /// Non-explicit pushes go through the throttle; returns true if sent.
    pub fn push_parameters(&self, session: &CameraSession, explicit: bool) -> bool {
        let window = self.settings.read(Settings::param_throttle);
        if !self
            .throttle
            .should_send(&session.camera_id, explicit, window, Instant::now())
        {
            debug!(camera_id = %session.camera_id, "Parameter update throttled");
            return false;
        }
        self.gateway.update_camera_parameters(&CameraParameters {
            camera_id: session.camera_id.clone(),
            sensor_orientation: session.sensor_orientation,
            width: session.picture_width,
            height: session.picture_height,
        });
        true
    }

    /// Register the session's target unless already registered
    ///
    /// Returns false if the session has no valid target or nothing changed.
    pub fn register_session(&self, session: &CameraSession, force: bool) -> bool {
        let Some(target) = session.target() else {
            return false;
        };
        let registration = TargetRegistration {
            api_generation: session.api_generation,
            camera_id: session.camera_id.clone(),
            sensor_orientation: session.sensor_orientation,
            width: session.picture_width,
            height: session.picture_height,
            display_orientation: session.display_orientation,
            target,
        };
        self.registration
            .register_if_changed(self.gateway.as_ref(), &registration, force)
    }

    /// Close/release of an instance; false if it was not the active one
    pub fn release_instance(&self, generation: ApiGeneration, instance: &InstanceHandle) -> bool {
        if !self.active.is_active(generation, instance) {
            return false;
        }
        self.gateway.request_renderer_stop();
        self.gateway.unregister_target();
        self.registration.forget();
        self.active.clear_if_active(generation, instance);
        if generation == ApiGeneration::Legacy {
            self.bridge.clear_legacy_callback_for(instance);
        }
        true
    }
}
