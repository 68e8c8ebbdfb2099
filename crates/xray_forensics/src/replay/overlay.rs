//! # Block Overlay
//!
//! Viewer-local visual substitute for the true world state during a replay.
//!
//! ## Protocol
//!
//! 1. [`BlockOverlay::prescan`] walks the timeline once. For every block position
//!    touched by an event it infers the material before the first change and
//!    after the last, captures the true live material, and shows the viewer the
//!    initial material wherever the live one differs.
//! 2. [`BlockOverlay::apply`] renders each event as it is reached (crack stages,
//!    break and place updates, sound/particle echoes).
//! 3. [`BlockOverlay::restore`] clears every crack animation, drops queued
//!    resends and re-sends the captured live material for every position the
//!    overlay changed, so the restoration is the last thing the viewer sees.
//!
//! Nothing here mutates the world; every call is addressed to one viewer.

use crate::collaborators::WorldCollaborator;
use crate::error::WorldError;
use crate::timeline::{BlockEvent, BlockEventKind, Timeline, MAX_BREAK_STAGE};
use crate::types::{BlockKey, EffectKind, Material, ViewerId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct QueuedResend {
    key: BlockKey,
    material: Material,
    remaining: u32,
    due_tick: u64,
}

#[derive(Debug)]
pub struct BlockOverlay {
    viewer: ViewerId,
    resend_count: u32,
    live: HashMap<BlockKey, Material>,
    initial: HashMap<BlockKey, Material>,
    final_state: HashMap<BlockKey, Material>,
    touched: HashSet<BlockKey>,
    breaking: HashMap<BlockKey, u8>,
    resends: Vec<QueuedResend>,
}

impl BlockOverlay {
    /// Scans `timeline` and sends the initial overlay to `viewer`.
    pub fn prescan(
        world: &dyn WorldCollaborator,
        viewer: ViewerId,
        timeline: &Timeline,
        resend_count: u32,
    ) -> Self {
        let mut overlay = Self {
            viewer,
            resend_count,
            live: HashMap::new(),
            initial: HashMap::new(),
            final_state: HashMap::new(),
            touched: HashSet::new(),
            breaking: HashMap::new(),
            resends: Vec::new(),
        };

        for event in timeline.frames().iter().flat_map(|f| f.block_events.iter()) {
            let key = event.key();
            overlay
                .initial
                .entry(key.clone())
                .or_insert_with(|| material_before(event));
            overlay.final_state.insert(key, material_after(event));
        }

        let keys: Vec<BlockKey> = overlay.initial.keys().cloned().collect();
        for key in keys {
            let Some(live) = world.block_material_at(&key.world, key.pos) else {
                debug!(block = %key, "World missing during prescan, skipping position");
                continue;
            };
            let initial = overlay.initial[&key].clone();
            if live != initial {
                overlay.send_block(world, &key, &initial);
            }
            overlay.live.insert(key, live);
        }

        debug!(
            viewer = %viewer,
            positions = overlay.live.len(),
            overlaid = overlay.touched.len(),
            "🧱 Block overlay prepared"
        );
        overlay
    }

    /// Renders one event for the viewer.
    pub fn apply(&mut self, world: &dyn WorldCollaborator, event: &BlockEvent, tick: u64) {
        let key = event.key();
        if !self.live.contains_key(&key) {
            return;
        }
        self.resends.retain(|queued| queued.key != key);

        match event.kind {
            BlockEventKind::BreakStart | BlockEventKind::BreakProgress => {
                let stage = event.break_stage().unwrap_or(0);
                self.send_animation(world, &key, Some(stage));
                self.breaking.insert(key, stage);
            }
            BlockEventKind::BreakComplete => {
                self.send_animation(world, &key, Some(MAX_BREAK_STAGE));
                self.send_animation(world, &key, None);
                self.send_effect(world, &key, &event.material, EffectKind::Break);
                let air = Material::air();
                self.send_block(world, &key, &air);
                self.queue_resend(key.clone(), air, tick);
                self.breaking.remove(&key);
            }
            BlockEventKind::BreakCancel => {
                self.send_animation(world, &key, None);
                self.breaking.remove(&key);
            }
            BlockEventKind::Place => {
                self.send_block(world, &key, &event.material);
                self.send_effect(world, &key, &event.material, EffectKind::Place);
                self.queue_resend(key, event.material.clone(), tick);
            }
        }
    }

    /// Re-sends queued break/place updates that are due at `tick`.
    pub fn flush_resends(&mut self, world: &dyn WorldCollaborator, tick: u64) {
        if self.resends.is_empty() {
            return;
        }
        let mut queue = std::mem::take(&mut self.resends);
        for queued in queue.iter_mut().filter(|q| q.due_tick <= tick) {
            self.send_block(world, &queued.key, &queued.material);
            queued.remaining -= 1;
            queued.due_tick = tick + 1;
        }
        queue.retain(|queued| queued.remaining > 0);
        self.resends = queue;
    }

    /// Undoes every visual change made by this overlay and clears its state.
    pub fn restore(&mut self, world: &dyn WorldCollaborator) {
        self.resends.clear();

        let breaking: Vec<BlockKey> = self.breaking.drain().map(|(key, _)| key).collect();
        for key in breaking {
            self.send_animation(world, &key, None);
        }

        let mut touched: Vec<BlockKey> = self.touched.drain().collect();
        touched.sort();
        for key in touched {
            if let Some(live) = self.live.get(&key).cloned() {
                self.send_block(world, &key, &live);
            }
        }

        self.live.clear();
        self.initial.clear();
        self.final_state.clear();
    }

    pub fn initial_material(&self, key: &BlockKey) -> Option<&Material> {
        self.initial.get(key)
    }

    pub fn final_material(&self, key: &BlockKey) -> Option<&Material> {
        self.final_state.get(key)
    }

    pub fn live_material(&self, key: &BlockKey) -> Option<&Material> {
        self.live.get(key)
    }

    /// Positions whose view currently differs from (or was changed away from) the world.
    pub fn overlay_positions(&self) -> usize {
        self.touched.len()
    }

    pub fn breaking_positions(&self) -> usize {
        self.breaking.len()
    }

    pub fn queued_resends(&self) -> usize {
        self.resends.len()
    }

    fn queue_resend(&mut self, key: BlockKey, material: Material, tick: u64) {
        if self.resend_count == 0 {
            return;
        }
        self.resends.push(QueuedResend {
            key,
            material,
            remaining: self.resend_count,
            due_tick: tick + 1,
        });
    }

    fn send_block(&mut self, world: &dyn WorldCollaborator, key: &BlockKey, material: &Material) {
        self.touched.insert(key.clone());
        report(world.send_visual_block_update(self.viewer, &key.world, key.pos, material), key);
    }

    fn send_animation(&self, world: &dyn WorldCollaborator, key: &BlockKey, stage: Option<u8>) {
        report(world.send_break_animation(self.viewer, &key.world, key.pos, stage), key);
    }

    fn send_effect(
        &self,
        world: &dyn WorldCollaborator,
        key: &BlockKey,
        material: &Material,
        effect: EffectKind,
    ) {
        report(
            world.play_effect(self.viewer, &key.world, key.pos, material, effect),
            key,
        );
    }
}

/// Material at a position before the event happened.
fn material_before(event: &BlockEvent) -> Material {
    match event.kind {
        BlockEventKind::Place => Material::air(),
        _ => event.material.clone(),
    }
}

/// Material at a position after the event happened.
fn material_after(event: &BlockEvent) -> Material {
    match event.kind {
        BlockEventKind::BreakComplete => Material::air(),
        _ => event.material.clone(),
    }
}

fn report(result: Result<(), WorldError>, key: &BlockKey) {
    if let Err(e) = result {
        warn!(block = %key, "⚠️ Visual update failed: {}", e);
    }
}
