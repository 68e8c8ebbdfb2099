//! Error types for detection, recording, replay and persistence.
//!
//! Collaborator-level failures ([`StorageError`], [`WorldError`]) are kept
//! separate from the operator-facing [`ForensicsError`] so callers can decide
//! whether a failure is worth surfacing or only worth logging.

use crate::timeline::RecordingId;
use std::path::PathBuf;

/// Failures raised by persistence backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem access failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A timeline could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Recording {0} not found in storage")]
    NotFound(RecordingId),

    /// A stored file exists but does not hold a usable timeline
    #[error("Malformed recording file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// Failures raised by the world collaborator.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error("Actor {0} is not online")]
    ActorOffline(String),

    #[error("Unknown world: {0}")]
    UnknownWorld(String),

    /// A visual update, teleport or message could not be delivered
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Operator-facing errors.
#[derive(Debug, thiserror::Error)]
pub enum ForensicsError {
    #[error("Recording {0} does not exist")]
    UnknownRecording(RecordingId),

    #[error("Invalid recording identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Recording {0} has no frames")]
    EmptyTimeline(RecordingId),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("World error: {0}")]
    World(#[from] WorldError),
}
