//! # Collaborator Interfaces
//!
//! The forensics core never talks to the game server, the filesystem or the
//! admin channel directly. It is handed implementations of three traits:
//!
//! - [`WorldCollaborator`] - live actor state, block materials and viewer-only
//!   visual output (block overlays, crack animations, effects, teleports)
//! - [`StorageCollaborator`] - persistence of finished timelines
//! - [`NotificationCollaborator`] - fire-and-forget admin notices
//!
//! ## Visual Isolation
//!
//! Every output method on [`WorldCollaborator`] is addressed to a single viewer.
//! Implementations must deliver it to that viewer's client only and must never
//! change the authoritative world.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`; the core calls them from the world-event
//! dispatch path and from the scheduler tick concurrently.

use crate::error::WorldError;
use crate::timeline::{RecordingId, Timeline};
use crate::types::{
    Actor, ActorId, ActorSnapshot, BlockPos, EffectKind, Location, Material, ViewerId, ViewerMode,
};
use async_trait::async_trait;
use std::fmt::Debug;

// ============================================================================
// World
// ============================================================================

/// Accessors and viewer-only output the core needs from the host world.
///
/// Accessors are synchronous and must not block; they are invoked from the
/// scheduler tick.
pub trait WorldCollaborator: Send + Sync + Debug {
    /// Looks up an actor's stable identity, online or not.
    fn actor_by_id(&self, id: ActorId) -> Option<Actor>;

    fn actor_connected(&self, id: ActorId) -> bool;

    /// Current position, orientation, flags and vitals of an online actor.
    fn actor_snapshot(&self, id: ActorId) -> Option<ActorSnapshot>;

    fn world_exists(&self, world: &str) -> bool;

    /// True material at a position; `None` when the world does not exist.
    fn block_material_at(&self, world: &str, pos: BlockPos) -> Option<Material>;

    /// Current interaction mode of a viewer; `None` when offline.
    fn viewer_mode(&self, viewer: ViewerId) -> Option<ViewerMode>;

    /// Shows `material` at `pos` to `viewer` only.
    fn send_visual_block_update(
        &self,
        viewer: ViewerId,
        world: &str,
        pos: BlockPos,
        material: &Material,
    ) -> Result<(), WorldError>;

    /// Shows a crack animation at `stage` (0..=9), or clears it when `stage` is `None`.
    fn send_break_animation(
        &self,
        viewer: ViewerId,
        world: &str,
        pos: BlockPos,
        stage: Option<u8>,
    ) -> Result<(), WorldError>;

    fn teleport_viewer(&self, viewer: ViewerId, location: &Location) -> Result<(), WorldError>;

    fn set_viewer_mode(&self, viewer: ViewerId, mode: ViewerMode) -> Result<(), WorldError>;

    /// Plays the sound and particle echo of a block change for `viewer` only.
    fn play_effect(
        &self,
        viewer: ViewerId,
        world: &str,
        pos: BlockPos,
        material: &Material,
        effect: EffectKind,
    ) -> Result<(), WorldError>;

    fn send_message(&self, viewer: ViewerId, message: &str) -> Result<(), WorldError>;
}

// ============================================================================
// Storage
// ============================================================================

/// Persistence of finished timelines.
///
/// Failures are reported as `false`/`None`/empty and logged by the implementation;
/// the registry never depends on a save succeeding.
#[async_trait]
pub trait StorageCollaborator: Send + Sync + Debug {
    async fn save(&self, timeline: &Timeline) -> bool;

    async fn load(&self, id: RecordingId) -> Option<Timeline>;

    /// Loads every readable timeline, skipping malformed entries.
    async fn load_all(&self) -> Vec<Timeline>;

    async fn delete(&self, id: RecordingId) -> bool;

    async fn exists(&self, id: RecordingId) -> bool;
}

// ============================================================================
// Notifications
// ============================================================================

/// Admin notice emitted by the recording registry.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordingNotice {
    RecordingStarted {
        actor_name: String,
        reason: String,
    },
    RecordingCompleted {
        actor_name: String,
        reason: String,
        frame_count: usize,
        recording_id: RecordingId,
    },
}

impl std::fmt::Display for RecordingNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordingNotice::RecordingStarted { actor_name, reason } => {
                write!(f, "Recording started for {actor_name}: {reason}")
            }
            RecordingNotice::RecordingCompleted {
                actor_name,
                reason,
                frame_count,
                recording_id,
            } => write!(
                f,
                "Recording {recording_id} of {actor_name} completed ({reason}, {frame_count} frames)"
            ),
        }
    }
}

/// Fire-and-forget sink for admin notices.
pub trait NotificationCollaborator: Send + Sync + Debug {
    fn notify(&self, notice: RecordingNotice);
}
