// SPDX-License-Identifier: MPL-2.0

//! Error types for the interception engine
//!
//! None of these ever reach the host application: hook entry points resolve
//! every failure into a [`HookOutcome`](crate::dispatch::HookOutcome). They
//! exist so the collaborators (settings, gateway, platform, media) can report
//! what went wrong to the layer that decides the fallback.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

/// Umbrella error for the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Settings could not be read or written
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// The native renderer rejected a request
    #[error("Renderer error: {0}")]
    Gateway(#[from] GatewayError),
    /// A platform metadata query failed
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
    /// A hook could not be attached
    #[error("Attach error: {0}")]
    Attach(#[from] AttachError),
    /// The replacement media could not be resolved or opened
    #[error("Media error: {0}")]
    Media(#[from] MediaError),
    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

/// Settings persistence errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No usable config directory on this system
    #[error("No configuration directory available")]
    NoConfigDir,
    /// Settings file could not be read
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Settings file could not be written
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Settings file is not valid JSON for our schema
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Settings could not be serialized
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[source] serde_json::Error),
    /// No setting with this name
    #[error("Unknown setting: {0}")]
    UnknownKey(String),
    /// Value does not fit the setting's type
    #[error("Invalid value for {key}: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Native renderer errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Target was released before or during the query
    #[error("Target is no longer valid")]
    InvalidTarget,
    /// Renderer has no information for this target
    #[error("Unknown target")]
    UnknownTarget,
    /// Renderer is not running or not loaded
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),
}

/// Platform metadata query errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    /// The camera id or index is not known to the platform
    #[error("Unknown camera: {0}")]
    UnknownCamera(String),
    /// The platform service is not reachable from this process
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Hook attachment errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttachError {
    /// The targeted method does not exist on this platform build
    #[error("Call site {0} not found")]
    MethodNotFound(String),
    /// The binding refused to install the hook
    #[error("Call site {site} rejected: {reason}")]
    Rejected { site: String, reason: String },
}

/// Replacement media errors
#[derive(Debug, Error)]
pub enum MediaError {
    /// The media id does not refer to any known media
    #[error("Media {0} not found")]
    NotFound(String),
    /// The media exists but could not be opened
    #[error("Failed to open media {id}: {source}")]
    Open {
        id: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<String> for EngineError {
    fn from(msg: String) -> Self {
        EngineError::Other(msg)
    }
}

impl From<&str> for EngineError {
    fn from(msg: &str) -> Self {
        EngineError::Other(msg.to_string())
    }
}
