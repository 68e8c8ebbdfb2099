//! Frame-by-frame playback: the viewer jumps exactly to each recorded frame.

use super::{Playback, PlaybackContext, PlaybackStep, ReplayVariant};
use crate::error::WorldError;
use tracing::warn;

#[derive(Debug, Default)]
pub struct DiscretePlayback {
    next_frame: usize,
}

impl DiscretePlayback {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Playback for DiscretePlayback {
    fn tick(&mut self, ctx: &mut PlaybackContext<'_>) -> PlaybackStep {
        if !ctx.frame_tick {
            return PlaybackStep::Continue;
        }
        let Some(frame) = ctx.timeline.frame(self.next_frame) else {
            return PlaybackStep::Finished;
        };
        if !ctx.world.world_exists(&frame.location.world) {
            return PlaybackStep::Aborted(format!("world '{}' no longer exists", frame.location.world));
        }

        match ctx.world.teleport_viewer(ctx.viewer, &frame.location) {
            Ok(()) => {}
            Err(WorldError::UnknownWorld(world)) => {
                return PlaybackStep::Aborted(format!("world '{world}' no longer exists"));
            }
            Err(e) => warn!(viewer = %ctx.viewer, "⚠️ Replay teleport failed: {}", e),
        }

        for event in &frame.block_events {
            ctx.overlay.apply(ctx.world, event, ctx.tick);
        }
        self.next_frame += 1;
        PlaybackStep::Continue
    }

    fn frame_index(&self) -> usize {
        self.next_frame
    }

    fn variant(&self) -> ReplayVariant {
        ReplayVariant::Discrete
    }
}
