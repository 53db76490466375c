// SPDX-License-Identifier: GPL-3.0-only

//! Gateway that records calls instead of rendering

use super::{
    CameraParameters, MediaSource, RendererGateway, TargetInfo, TargetRegistration,
    TransformMatrix,
};
use crate::config::NativeConfig;
use crate::engine::handles::{Target, TargetId};
use crate::engine::session::{ApiGeneration, Orientation};
use crate::errors::GatewayError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// One recorded gateway call
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    Register {
        api_generation: ApiGeneration,
        camera_id: String,
        sensor_orientation: Orientation,
        width: u32,
        height: u32,
        display_orientation: Orientation,
        target: TargetId,
    },
    Unregister,
    QueryInfo(TargetId),
    Start,
    Stop,
    LoadSource { offset: u64, length: u64 },
    ResetSource,
    DisplayOrientation(Orientation),
    Parameters(CameraParameters),
    NativeConfig(NativeConfig),
    ExternalMatrix(TransformMatrix),
}

/// Renderer stand-in that remembers everything it was asked to do
///
/// Target infos are configured up front with [`set_target_info`]; querying an
/// unknown target fails like a renderer that cannot inspect it.
///
/// [`set_target_info`]: RecordingGateway::set_target_info
#[derive(Debug)]
pub struct RecordingGateway {
    calls: Mutex<Vec<GatewayCall>>,
    infos: Mutex<HashMap<TargetId, TargetInfo>>,
    load_result: AtomicBool,
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            infos: Mutex::new(HashMap::new()),
            load_result: AtomicBool::new(true),
        }
    }

    pub fn set_target_info(&self, target: &Target, info: TargetInfo) {
        self.infos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(target.id(), info);
    }

    /// What `load_replacement_source` answers from now on
    pub fn set_load_result(&self, ready: bool) {
        self.load_result.store(ready, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, predicate: impl Fn(&GatewayCall) -> bool) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|c| predicate(c))
            .count()
    }

    pub fn register_count(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::Register { .. }))
    }

    pub fn start_count(&self) -> usize {
        self.count(|c| *c == GatewayCall::Start)
    }

    pub fn stop_count(&self) -> usize {
        self.count(|c| *c == GatewayCall::Stop)
    }

    /// Lifecycle calls only, without queries
    pub fn lifecycle_calls(&self) -> Vec<GatewayCall> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, GatewayCall::QueryInfo(_)))
            .collect()
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, call: GatewayCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl RendererGateway for RecordingGateway {
    fn register_target(&self, registration: &TargetRegistration) {
        self.record(GatewayCall::Register {
            api_generation: registration.api_generation,
            camera_id: registration.camera_id.clone(),
            sensor_orientation: registration.sensor_orientation,
            width: registration.width,
            height: registration.height,
            display_orientation: registration.display_orientation,
            target: registration.target.id(),
        });
    }

    fn unregister_target(&self) {
        self.record(GatewayCall::Unregister);
    }

    fn query_target_info(&self, target: &Target) -> Result<TargetInfo, GatewayError> {
        self.record(GatewayCall::QueryInfo(target.id()));
        if !target.is_valid() {
            return Err(GatewayError::InvalidTarget);
        }
        self.infos
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&target.id())
            .copied()
            .ok_or(GatewayError::UnknownTarget)
    }

    fn request_renderer_start(&self) {
        self.record(GatewayCall::Start);
    }

    fn request_renderer_stop(&self) {
        self.record(GatewayCall::Stop);
    }

    fn load_replacement_source(&self, source: &MediaSource) -> bool {
        self.record(GatewayCall::LoadSource {
            offset: source.offset,
            length: source.length,
        });
        self.load_result.load(Ordering::SeqCst)
    }

    fn reset_replacement_source(&self) {
        self.record(GatewayCall::ResetSource);
    }

    fn update_display_orientation(&self, orientation: Orientation) {
        self.record(GatewayCall::DisplayOrientation(orientation));
    }

    fn update_camera_parameters(&self, parameters: &CameraParameters) {
        self.record(GatewayCall::Parameters(parameters.clone()));
    }

    fn update_native_config(&self, config: &NativeConfig) {
        self.record(GatewayCall::NativeConfig(*config));
    }

    fn update_external_matrix(&self, matrix: &TransformMatrix) {
        self.record(GatewayCall::ExternalMatrix(*matrix));
    }
}
