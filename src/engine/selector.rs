// SPDX-License-Identifier: GPL-3.0-only

//! Choosing the target the replacement video is drawn into
//!
//! Full-resolution preview streams are delivered in the opaque format while
//! auxiliary/analysis streams use the raw format, and the largest opaque
//! stream is the one actually shown to the user.

use super::handles::Target;
use crate::gateway::{RendererGateway, TargetInfo};
use tracing::debug;

/// A session-creation call's output descriptor
#[derive(Debug, Clone, Default)]
pub struct OutputConfiguration {
    pub targets: Vec<Target>,
}

impl OutputConfiguration {
    pub fn new(target: Target) -> Self {
        Self {
            targets: vec![target],
        }
    }

    /// Descriptor whose target is deferred and not yet attached
    pub fn deferred() -> Self {
        Self::default()
    }
}

/// One entry of a session-creation argument list
#[derive(Debug, Clone)]
pub enum SessionOutput {
    Target(Target),
    Configuration(OutputConfiguration),
}

/// The shapes a session-creation call may carry its outputs in
#[derive(Debug, Clone)]
pub enum SessionOutputs {
    /// Plain list mixing targets and output descriptors
    List(Vec<SessionOutput>),
    /// Session configuration wrapping output descriptors
    SessionConfiguration(Vec<OutputConfiguration>),
}

impl SessionOutputs {
    /// Flatten every form into a single candidate list, in input order
    pub fn flatten(&self) -> Vec<Target> {
        match self {
            SessionOutputs::SessionConfiguration(configs) => configs
                .iter()
                .flat_map(|config| config.targets.iter().cloned())
                .collect(),
            SessionOutputs::List(items) => items
                .iter()
                .flat_map(|item| match item {
                    SessionOutput::Target(target) => vec![target.clone()],
                    SessionOutput::Configuration(config) => config.targets.clone(),
                })
                .collect(),
        }
    }
}

/// Selected target and what the renderer reported about it
#[derive(Debug, Clone)]
pub struct Selection {
    pub target: Target,
    pub info: TargetInfo,
}

/// Pick the preview target among candidates
///
/// Largest opaque candidate wins (first one on equal area); otherwise the
/// first raw single-plane candidate; otherwise nothing.
pub fn select_target(candidates: &[Target], gateway: &dyn RendererGateway) -> Option<Selection> {
    let queried: Vec<Selection> = candidates
        .iter()
        .filter(|target| target.is_valid())
        .filter_map(|target| match gateway.query_target_info(target) {
            Ok(info) => Some(Selection {
                target: target.clone(),
                info,
            }),
            Err(e) => {
                debug!(target = %target.id(), error = %e, "Dropping candidate, info query failed");
                None
            }
        })
        .collect();

    let mut best: Option<&Selection> = None;
    for candidate in queried.iter().filter(|c| c.info.is_opaque()) {
        if best.is_none_or(|b| candidate.info.area() > b.info.area()) {
            best = Some(candidate);
        }
    }

    if best.is_none() {
        debug!(
            candidates = candidates.len(),
            "No opaque candidate, falling back to raw format"
        );
        best = queried.iter().find(|c| c.info.is_raw());
    }

    best.cloned()
}
