//! # World Events
//!
//! Notifications the host delivers to [`ForensicsService::handle_world_event`]
//! (directly or through the host's event channel).
//!
//! ## Event Kinds
//!
//! - Block damage lifecycle: [`WorldEvent::BlockDamageStarted`],
//!   [`WorldEvent::BlockDamageProgress`], [`WorldEvent::BlockDamageAborted`]
//! - Block changes: [`WorldEvent::BlockBroken`], [`WorldEvent::BlockPlaced`]
//! - Connectivity: [`WorldEvent::ActorDisconnected`]
//!
//! ## Serialization
//!
//! Events are tagged JSON objects so a host can forward them from any process:
//!
//! ```rust
//! use xray_forensics::{ActorId, BlockPos, Material, WorldEvent};
//!
//! let event = WorldEvent::BlockBroken {
//!     actor: ActorId::new(),
//!     world: "world".to_string(),
//!     pos: BlockPos::new(10, 12, -4),
//!     material: Material::new("diamond_ore"),
//! };
//! let json = serde_json::to_string(&event).unwrap();
//! assert!(json.contains("\"type\":\"block_broken\""));
//! ```
//!
//! [`ForensicsService::handle_world_event`]: crate::service::ForensicsService::handle_world_event

use crate::timeline::{BlockEvent, BlockEventKind};
use crate::types::{ActorId, BlockPos, Material};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldEvent {
    /// An actor started hitting a block
    BlockDamageStarted {
        actor: ActorId,
        world: String,
        pos: BlockPos,
        material: Material,
        #[serde(default)]
        origin_id: Option<i32>,
    },
    /// Break progress update, `progress` in `[0, 1]`
    BlockDamageProgress {
        actor: ActorId,
        world: String,
        pos: BlockPos,
        material: Material,
        progress: f32,
        #[serde(default)]
        origin_id: Option<i32>,
    },
    /// The actor stopped hitting the block before it broke
    BlockDamageAborted {
        actor: ActorId,
        world: String,
        pos: BlockPos,
        material: Material,
    },
    BlockBroken {
        actor: ActorId,
        world: String,
        pos: BlockPos,
        material: Material,
    },
    BlockPlaced {
        actor: ActorId,
        world: String,
        pos: BlockPos,
        material: Material,
    },
    ActorDisconnected { actor: ActorId },
}

impl WorldEvent {
    pub fn actor(&self) -> ActorId {
        match self {
            WorldEvent::BlockDamageStarted { actor, .. }
            | WorldEvent::BlockDamageProgress { actor, .. }
            | WorldEvent::BlockDamageAborted { actor, .. }
            | WorldEvent::BlockBroken { actor, .. }
            | WorldEvent::BlockPlaced { actor, .. }
            | WorldEvent::ActorDisconnected { actor } => *actor,
        }
    }

    /// The timeline event this world event becomes, stamped at `timestamp`.
    pub fn to_block_event(&self, timestamp: i64) -> Option<BlockEvent> {
        let event = match self {
            WorldEvent::BlockDamageStarted {
                world,
                pos,
                material,
                origin_id,
                ..
            } => with_origin(
                BlockEvent::new(BlockEventKind::BreakStart, timestamp, world.clone(), *pos, material.clone()),
                *origin_id,
            ),
            WorldEvent::BlockDamageProgress {
                world,
                pos,
                material,
                progress,
                origin_id,
                ..
            } => with_origin(
                BlockEvent::new(BlockEventKind::BreakProgress, timestamp, world.clone(), *pos, material.clone())
                    .with_progress(*progress),
                *origin_id,
            ),
            WorldEvent::BlockDamageAborted { world, pos, material, .. } => {
                BlockEvent::new(BlockEventKind::BreakCancel, timestamp, world.clone(), *pos, material.clone())
            }
            WorldEvent::BlockBroken { world, pos, material, .. } => {
                BlockEvent::new(BlockEventKind::BreakComplete, timestamp, world.clone(), *pos, material.clone())
            }
            WorldEvent::BlockPlaced { world, pos, material, .. } => {
                BlockEvent::new(BlockEventKind::Place, timestamp, world.clone(), *pos, material.clone())
            }
            WorldEvent::ActorDisconnected { .. } => return None,
        };
        Some(event)
    }
}

fn with_origin(event: BlockEvent, origin_id: Option<i32>) -> BlockEvent {
    match origin_id {
        Some(origin) => event.with_origin(origin),
        None => event,
    }
}
