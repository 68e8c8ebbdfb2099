//! # Replay Engine
//!
//! Reconstructs a recorded [`Timeline`] for a single viewer without touching
//! the shared world.
//!
//! ## Session lifecycle
//!
//! - **start**: save the viewer's location and mode, switch to spectator, run
//!   the block-overlay prescan, teleport to the first frame.
//! - **tick**: driven by the host scheduler; every `ticks_per_frame`-th tick is
//!   a frame tick. The [`Playback`] strategy decides how the viewer moves.
//! - **stop**: clear crack animations, restore every overlaid block, teleport
//!   back, restore the saved mode. Idempotent.
//!
//! A viewer has at most one replay. Starting a different recording stops the
//! current one first; starting the same recording again is a no-op.
//!
//! ## Locking
//!
//! Each replay lives in its own slot behind a mutex; the viewer map only holds
//! shared slots and is never locked while the world is called. Starts for one
//! viewer are serialized by a per-viewer gate. [`ReplayEngine::stop`] never
//! waits on a running tick: if the slot is busy it marks the replay stopped
//! and the tick that holds the slot finishes it.
//!
//! ## Variants
//!
//! - [`ReplayVariant::Discrete`] jumps to each frame exactly
//! - [`ReplayVariant::Smoothed`] eases between frames with damping and extrapolation

pub mod discrete;
pub mod interpolation;
pub mod overlay;
pub mod smoothed;

use crate::collaborators::WorldCollaborator;
use crate::config::ReplaySettings;
use crate::error::{ForensicsError, WorldError};
use crate::timeline::{RecordingId, Timeline};
use crate::types::{Location, ViewerId, ViewerMode};
use dashmap::DashMap;
use discrete::DiscretePlayback;
use overlay::BlockOverlay;
use serde::{Deserialize, Serialize};
use smoothed::SmoothedPlayback;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use tracing::{debug, info, warn};

/// Seconds per scheduler tick (20 ticks per second).
const SECONDS_PER_TICK: f64 = 0.05;

/// Playback strategy selectable by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayVariant {
    Discrete,
    #[default]
    Smoothed,
}

impl std::str::FromStr for ReplayVariant {
    type Err = ForensicsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discrete" | "normal" => Ok(ReplayVariant::Discrete),
            "smooth" | "smoothed" => Ok(ReplayVariant::Smoothed),
            other => Err(ForensicsError::InvalidIdentifier(other.to_string())),
        }
    }
}

impl std::fmt::Display for ReplayVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplayVariant::Discrete => f.write_str("discrete"),
            ReplayVariant::Smoothed => f.write_str("smoothed"),
        }
    }
}

/// Everything a playback strategy may touch during one tick.
pub struct PlaybackContext<'a> {
    pub world: &'a dyn WorldCollaborator,
    pub viewer: ViewerId,
    pub timeline: &'a Timeline,
    pub overlay: &'a mut BlockOverlay,
    pub tick: u64,
    pub frame_tick: bool,
}

/// What the engine should do after a playback tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackStep {
    Continue,
    /// Frames exhausted
    Finished,
    /// Unrecoverable for this replay only
    Aborted(String),
}

/// How a viewer moves through a timeline.
pub trait Playback: Send + Sync + std::fmt::Debug {
    fn tick(&mut self, ctx: &mut PlaybackContext<'_>) -> PlaybackStep;

    /// Index of the next frame to be played.
    fn frame_index(&self) -> usize;

    fn lookahead_len(&self) -> usize {
        0
    }

    fn variant(&self) -> ReplayVariant;
}

/// Outcome of [`ReplayEngine::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStart {
    Started,
    /// The viewer is already watching this recording
    AlreadyPlaying,
    /// A replay of another recording was stopped first
    Replaced { previous: RecordingId },
}

/// Snapshot of a running replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayProgress {
    pub recording_id: RecordingId,
    pub frame_index: usize,
    pub total_frames: usize,
    pub elapsed_secs: f64,
    pub total_secs: f64,
    pub overlay_positions: usize,
    pub breaking_positions: usize,
    pub lookahead_len: usize,
    pub variant: ReplayVariant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StopReason {
    Operator,
    Finished,
    Aborted(String),
}

#[derive(Debug)]
struct ReplaySession {
    viewer: ViewerId,
    timeline: Arc<Timeline>,
    playback: Box<dyn Playback>,
    overlay: BlockOverlay,
    saved_location: Location,
    saved_mode: ViewerMode,
    ticks: u64,
    ticks_per_frame: u32,
}

impl ReplaySession {
    fn tick(&mut self, world: &dyn WorldCollaborator) -> PlaybackStep {
        let tick = self.ticks;
        self.ticks += 1;
        self.overlay.flush_resends(world, tick);

        let mut ctx = PlaybackContext {
            world,
            viewer: self.viewer,
            timeline: &self.timeline,
            overlay: &mut self.overlay,
            tick,
            frame_tick: tick % u64::from(self.ticks_per_frame) == 0,
        };
        self.playback.tick(&mut ctx)
    }

    fn progress(&self) -> ReplayProgress {
        let secs_per_frame = SECONDS_PER_TICK * f64::from(self.ticks_per_frame);
        let frame_index = self.playback.frame_index().min(self.timeline.frame_count());
        ReplayProgress {
            recording_id: self.timeline.id,
            frame_index,
            total_frames: self.timeline.frame_count(),
            elapsed_secs: frame_index as f64 * secs_per_frame,
            total_secs: self.timeline.frame_count() as f64 * secs_per_frame,
            overlay_positions: self.overlay.overlay_positions(),
            breaking_positions: self.overlay.breaking_positions(),
            lookahead_len: self.playback.lookahead_len(),
            variant: self.playback.variant(),
        }
    }

    /// Restores the viewer. Consumes the session so it cannot be stopped twice.
    /// Returns the location and mode the viewer was given back.
    fn stop(mut self, world: &dyn WorldCollaborator, reason: StopReason) -> (Location, ViewerMode) {
        self.overlay.restore(world);

        if let Err(e) = world.teleport_viewer(self.viewer, &self.saved_location) {
            warn!(viewer = %self.viewer, "⚠️ Could not return viewer to saved location: {}", e);
        }
        if let Err(e) = world.set_viewer_mode(self.viewer, self.saved_mode) {
            warn!(viewer = %self.viewer, "⚠️ Could not restore viewer mode: {}", e);
        }

        let message = match &reason {
            StopReason::Operator => "Replay stopped".to_string(),
            StopReason::Finished => format!(
                "Replay finished ({} frames of recording {})",
                self.timeline.frame_count(),
                self.timeline.id
            ),
            StopReason::Aborted(cause) => format!("Replay aborted: {cause}"),
        };
        if let Err(e) = world.send_message(self.viewer, &message) {
            debug!(viewer = %self.viewer, "Replay message not delivered: {}", e);
        }

        info!(
            viewer = %self.viewer,
            recording_id = self.timeline.id.0,
            "⏹️ {}", message
        );
        (self.saved_location, self.saved_mode)
    }
}

/// One viewer's replay. The session is taken out exactly once, under the
/// lock, by whoever ends it.
#[derive(Debug)]
struct ReplaySlot {
    recording_id: RecordingId,
    stop_requested: AtomicBool,
    session: Mutex<Option<ReplaySession>>,
}

impl ReplaySlot {
    fn new(session: ReplaySession) -> Self {
        Self {
            recording_id: session.timeline.id,
            stop_requested: AtomicBool::new(false),
            session: Mutex::new(Some(session)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<ReplaySession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_lock(&self) -> Option<MutexGuard<'_, Option<ReplaySession>>> {
        match self.session.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn stopping(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }
}

/// Owns every running replay, keyed by viewer.
#[derive(Debug)]
pub struct ReplayEngine {
    world: Arc<dyn WorldCollaborator>,
    settings: ReplaySettings,
    sessions: DashMap<ViewerId, Arc<ReplaySlot>>,
    start_gates: DashMap<ViewerId, Arc<Mutex<()>>>,
}

impl ReplayEngine {
    pub fn new(world: Arc<dyn WorldCollaborator>, settings: ReplaySettings) -> Self {
        Self {
            world,
            settings,
            sessions: DashMap::new(),
            start_gates: DashMap::new(),
        }
    }

    fn slot(&self, viewer: ViewerId) -> Option<Arc<ReplaySlot>> {
        self.sessions.get(&viewer).map(|entry| entry.value().clone())
    }

    fn slots(&self) -> Vec<(ViewerId, Arc<ReplaySlot>)> {
        self.sessions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    fn viewer_state(&self, viewer: ViewerId) -> Result<(Location, ViewerMode), ForensicsError> {
        let location = self
            .world
            .actor_snapshot(viewer)
            .map(|snapshot| snapshot.location)
            .ok_or_else(|| WorldError::ActorOffline(viewer.to_string()))?;
        let mode = self
            .world
            .viewer_mode(viewer)
            .ok_or_else(|| WorldError::ActorOffline(viewer.to_string()))?;
        Ok((location, mode))
    }

    /// Ends the replay held in a locked slot: unmaps the slot and restores the
    /// viewer before the lock is released. `None` if it had already ended.
    fn end_locked(
        &self,
        viewer: ViewerId,
        slot: &Arc<ReplaySlot>,
        session: &mut Option<ReplaySession>,
        reason: StopReason,
    ) -> Option<(Location, ViewerMode)> {
        let session = session.take()?;
        self.sessions
            .remove_if(&viewer, |_, current| Arc::ptr_eq(current, slot));
        Some(session.stop(self.world.as_ref(), reason))
    }

    /// Starts replaying `timeline` for `viewer`.
    ///
    /// Validation failures (empty timeline, offline viewer, missing world) are
    /// returned before anything changes, including any replay already running.
    pub fn start(
        &self,
        timeline: Arc<Timeline>,
        viewer: ViewerId,
        variant: ReplayVariant,
    ) -> Result<ReplayStart, ForensicsError> {
        let gate = self.start_gates.entry(viewer).or_default().clone();
        let _gate = gate.lock().unwrap_or_else(PoisonError::into_inner);

        let current = self.slot(viewer);
        if let Some(current) = &current {
            if current.recording_id == timeline.id && !current.stopping() {
                return Ok(ReplayStart::AlreadyPlaying);
            }
        }

        let first = timeline
            .frame(0)
            .ok_or(ForensicsError::EmptyTimeline(timeline.id))?
            .location
            .clone();
        let observed = self.viewer_state(viewer)?;
        if !self.world.world_exists(&first.world) {
            return Err(WorldError::UnknownWorld(first.world).into());
        }

        // The replaced session knows the viewer's state from before any replay.
        let mut previous = None;
        let (saved_location, saved_mode) = match current {
            Some(slot) => {
                let mut guard = slot.lock();
                match self.end_locked(viewer, &slot, &mut guard, StopReason::Operator) {
                    Some(restored) => {
                        previous = Some(slot.recording_id);
                        restored
                    }
                    // Ended by a tick or a stop while we waited; it restored the viewer.
                    None => {
                        drop(guard);
                        self.viewer_state(viewer)?
                    }
                }
            }
            None => observed,
        };

        self.world.set_viewer_mode(viewer, ViewerMode::Spectator)?;
        let overlay = BlockOverlay::prescan(
            self.world.as_ref(),
            viewer,
            &timeline,
            self.settings.visual_resend_count,
        );
        let playback: Box<dyn Playback> = match variant {
            ReplayVariant::Discrete => Box::new(DiscretePlayback::new()),
            ReplayVariant::Smoothed => Box::new(SmoothedPlayback::new(self.settings.clone(), first.clone())),
        };
        let session = ReplaySession {
            viewer,
            timeline: timeline.clone(),
            playback,
            overlay,
            saved_location,
            saved_mode,
            ticks: 0,
            ticks_per_frame: self.settings.effective_ticks_per_frame(),
        };

        if let Err(e) = self.world.teleport_viewer(viewer, &first) {
            session.stop(self.world.as_ref(), StopReason::Aborted(e.to_string()));
            return Err(e.into());
        }

        if let Some(displaced) = self.sessions.insert(viewer, Arc::new(ReplaySlot::new(session))) {
            warn!(viewer = %viewer, "⚠️ Replay slot was taken during start, stopping it");
            let mut guard = displaced.lock();
            self.end_locked(viewer, &displaced, &mut guard, StopReason::Operator);
        }
        info!(
            viewer = %viewer,
            recording_id = timeline.id.0,
            frames = timeline.frame_count(),
            %variant,
            "▶️ Replay started"
        );

        Ok(match previous {
            Some(previous) => ReplayStart::Replaced { previous },
            None => ReplayStart::Started,
        })
    }

    /// Stops the viewer's replay. Returns false when none was running.
    ///
    /// Never waits on a running tick; a busy replay is ended by that tick.
    pub fn stop(&self, viewer: ViewerId) -> bool {
        let Some(slot) = self.slot(viewer) else {
            return false;
        };
        let first_request = !slot.stop_requested.swap(true, Ordering::SeqCst);
        let stopped = match slot.try_lock() {
            Some(mut guard) => self
                .end_locked(viewer, &slot, &mut guard, StopReason::Operator)
                .is_some(),
            None => {
                debug!(viewer = %viewer, "Replay busy, stop handed to its tick");
                first_request
            }
        };
        stopped
    }

    /// Stops every replay. Iterates a snapshot of the running viewers.
    pub fn stop_all(&self) -> usize {
        self.slots()
            .into_iter()
            .filter(|(viewer, _)| self.stop(*viewer))
            .count()
    }

    /// Advances every replay by one scheduler tick.
    pub fn tick(&self) {
        for (viewer, slot) in self.slots() {
            let mut guard = slot.lock();
            let Some(session) = guard.as_mut() else {
                continue;
            };

            let reason = if slot.stopping() {
                Some(StopReason::Operator)
            } else {
                match session.tick(self.world.as_ref()) {
                    PlaybackStep::Continue => None,
                    PlaybackStep::Finished => Some(StopReason::Finished),
                    PlaybackStep::Aborted(cause) => {
                        warn!(viewer = %viewer, "❌ Replay aborted: {}", cause);
                        Some(StopReason::Aborted(cause))
                    }
                }
            };
            // Also catches a stop requested from inside this tick's world calls.
            let reason = reason.or_else(|| slot.stopping().then_some(StopReason::Operator));

            if let Some(reason) = reason {
                self.end_locked(viewer, &slot, &mut guard, reason);
            }
        }
    }

    pub fn progress(&self, viewer: ViewerId) -> Option<ReplayProgress> {
        let slot = self.slot(viewer)?;
        if slot.stopping() {
            return None;
        }
        let progress = slot.lock().as_ref().map(ReplaySession::progress);
        progress
    }

    pub fn is_replaying(&self, viewer: ViewerId) -> bool {
        self.slot(viewer).is_some_and(|slot| !slot.stopping())
    }

    pub fn active_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| !entry.value().stopping())
            .count()
    }
}
