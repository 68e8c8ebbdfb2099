//! Interpolated playback.
//!
//! On frame ticks the next frame's events are applied and a new target is
//! chosen (optionally nudged by second-order extrapolation). On every tick the
//! viewer's displayed location is blended towards that target, then damped
//! towards a weighted average of the lookahead window.

use super::interpolation::{blend, damp, extrapolate, mix_prediction, weighted_average};
use super::{Playback, PlaybackContext, PlaybackStep, ReplayVariant};
use crate::config::ReplaySettings;
use crate::error::WorldError;
use crate::timeline::Timeline;
use crate::types::Location;
use std::collections::VecDeque;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct SmoothedPlayback {
    settings: ReplaySettings,
    next_frame: usize,
    current: Location,
    target: Location,
    lookahead: VecDeque<Location>,
}

impl SmoothedPlayback {
    pub fn new(settings: ReplaySettings, start: Location) -> Self {
        Self {
            settings,
            next_frame: 0,
            current: start.clone(),
            target: start,
            lookahead: VecDeque::new(),
        }
    }

    pub fn current(&self) -> &Location {
        &self.current
    }

    pub fn target(&self) -> &Location {
        &self.target
    }

    /// Keeps the locations of frames `next_frame + 1 ..` (at most `lookahead_size`) buffered.
    fn refill_lookahead(&mut self, timeline: &Timeline) {
        let size = self.settings.lookahead_size.max(1);
        if self.lookahead.is_empty() {
            self.lookahead.extend(
                timeline
                    .frames()
                    .iter()
                    .skip(self.next_frame + 1)
                    .take(size)
                    .map(|frame| frame.location.clone()),
            );
            return;
        }
        self.lookahead.pop_front();
        if let Some(frame) = timeline.frame(self.next_frame + size) {
            self.lookahead.push_back(frame.location.clone());
        }
    }

    /// Blending only approaches a target, so the last recorded position is
    /// placed exactly once the frames run out.
    fn settle_on_last_frame(&mut self, ctx: &mut PlaybackContext<'_>) {
        let Some(last) = ctx.timeline.last_frame() else {
            return;
        };
        if self.current == last.location {
            return;
        }
        self.current = last.location.clone();
        self.target = last.location.clone();
        if let Err(e) = ctx.world.teleport_viewer(ctx.viewer, &self.current) {
            warn!(viewer = %ctx.viewer, "⚠️ Replay teleport failed: {}", e);
        }
    }

    /// Target for frame `index`, with a fraction of the predicted next position mixed in.
    fn target_for(&self, timeline: &Timeline, index: usize) -> Option<Location> {
        let frame = timeline.frame(index)?;
        let mut target = frame.location.clone();
        if self.settings.extrapolation_enabled && index >= 2 {
            let before_previous = &timeline.frames()[index - 2].location;
            let previous = &timeline.frames()[index - 1].location;
            if before_previous.world == target.world && previous.world == target.world {
                let predicted = extrapolate(before_previous.position, previous.position, target.position);
                target.position = mix_prediction(target.position, predicted, self.settings.extrapolation_fraction);
            }
        }
        Some(target)
    }
}

impl Playback for SmoothedPlayback {
    fn tick(&mut self, ctx: &mut PlaybackContext<'_>) -> PlaybackStep {
        if ctx.frame_tick {
            let Some(frame) = ctx.timeline.frame(self.next_frame) else {
                self.settle_on_last_frame(ctx);
                return PlaybackStep::Finished;
            };
            if !ctx.world.world_exists(&frame.location.world) {
                return PlaybackStep::Aborted(format!("world '{}' no longer exists", frame.location.world));
            }

            for event in &frame.block_events {
                ctx.overlay.apply(ctx.world, event, ctx.tick);
            }

            if let Some(target) = self.target_for(ctx.timeline, self.next_frame) {
                self.target = target;
            }
            if self.target.world != self.current.world {
                debug!(viewer = %ctx.viewer, world = %self.target.world, "Replay changed world, snapping");
                self.current = self.target.clone();
            }
            self.refill_lookahead(ctx.timeline);
            self.next_frame += 1;
        }

        let mut next = blend(
            &self.current,
            &self.target,
            self.settings.effective_blend_factor(),
            self.settings.use_smoothstep,
        );
        if self.settings.damping_enabled && self.lookahead.len() > 2 {
            let window = std::iter::once(&self.target).chain(self.lookahead.iter());
            if let Some(average) = weighted_average(window, self.settings.damping_window) {
                next = damp(&next, &average, self.settings.damping_weight);
            }
        }
        self.current = next;

        match ctx.world.teleport_viewer(ctx.viewer, &self.current) {
            Ok(()) => PlaybackStep::Continue,
            Err(WorldError::UnknownWorld(world)) => {
                PlaybackStep::Aborted(format!("world '{world}' no longer exists"))
            }
            Err(e) => {
                warn!(viewer = %ctx.viewer, "⚠️ Replay teleport failed: {}", e);
                PlaybackStep::Continue
            }
        }
    }

    fn frame_index(&self) -> usize {
        self.next_frame
    }

    fn lookahead_len(&self) -> usize {
        self.lookahead.len()
    }

    fn variant(&self) -> ReplayVariant {
        ReplayVariant::Smoothed
    }
}
