//! A single active recording.
//!
//! The session is a small state machine driven by the host scheduler: every
//! `interval_ticks`-th tick samples the actor, drains the pending buffer into
//! the new frame, and reports whether the session should stop.
//! [`RecordingSession::finish`] consumes the session, so a completed timeline
//! can never be appended to again.
//!
//! A tick is split in three steps so the owner can keep its locks off the
//! world: [`RecordingSession::advance`] and [`RecordingSession::record_sample`]
//! touch only session state, while [`observe`] talks to the world.

use super::end_reason;
use super::pending::PendingEvents;
use crate::collaborators::WorldCollaborator;
use crate::timeline::{BlockEvent, Frame, RecordingId, Timeline};
use crate::types::{ActorId, ActorSnapshot};
use tracing::{debug, warn};

/// Result of one scheduler tick for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was appended
    Sampled,
    /// Not a sampling tick
    Idle,
    /// The session must be stopped with this reason
    Stop(&'static str),
}

#[derive(Debug)]
pub struct RecordingSession {
    timeline: Timeline,
    interval_ticks: u32,
    ticks_seen: u64,
}

impl RecordingSession {
    pub fn new(timeline: Timeline, interval_ticks: u32) -> Self {
        Self {
            timeline,
            interval_ticks: interval_ticks.max(1),
            ticks_seen: 0,
        }
    }

    pub fn id(&self) -> RecordingId {
        self.timeline.id
    }

    pub fn actor_id(&self) -> ActorId {
        self.timeline.actor_id
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Counts one scheduler tick. True when this tick is a sampling tick.
    pub fn advance(&mut self) -> bool {
        let due = self.ticks_seen % u64::from(self.interval_ticks) == 0;
        self.ticks_seen += 1;
        due
    }

    /// Appends a frame for `snapshot` carrying every event buffered so far.
    pub fn record_sample(&mut self, pending: &PendingEvents, now: i64, snapshot: &ActorSnapshot) {
        let events = pending.drain(self.timeline.actor_id);
        self.timeline
            .push_frame(Frame::from_snapshot(now, snapshot, events));
    }

    /// Advances the session by one scheduler tick.
    pub fn on_tick(
        &mut self,
        world: &dyn WorldCollaborator,
        pending: &PendingEvents,
        now: i64,
        max_duration_millis: i64,
    ) -> TickOutcome {
        if !self.advance() {
            return TickOutcome::Idle;
        }
        match observe(
            world,
            self.timeline.actor_id,
            self.timeline.start_time,
            now,
            max_duration_millis,
        ) {
            Ok(snapshot) => {
                self.record_sample(pending, now, &snapshot);
                TickOutcome::Sampled
            }
            Err(reason) => TickOutcome::Stop(reason),
        }
    }

    /// Completes the session and returns the immutable timeline.
    ///
    /// `leftover` holds the events still buffered when the pending buffer was
    /// closed. With `flush_pending` set they become one final frame, which
    /// uses the live actor state when available and otherwise repeats the
    /// state of the last sampled frame.
    pub fn finish(
        mut self,
        world: &dyn WorldCollaborator,
        leftover: Vec<BlockEvent>,
        now: i64,
        reason: &str,
        flush_pending: bool,
    ) -> Timeline {
        if !leftover.is_empty() {
            if flush_pending {
                let state = world
                    .actor_snapshot(self.timeline.actor_id)
                    .or_else(|| self.timeline.last_frame().map(frame_state));
                match state {
                    Some(snapshot) => {
                        debug!(
                            recording_id = self.timeline.id.0,
                            events = leftover.len(),
                            "📥 Flushing pending events into final frame"
                        );
                        self.timeline
                            .push_frame(Frame::from_snapshot(now, &snapshot, leftover));
                    }
                    None => warn!(
                        recording_id = self.timeline.id.0,
                        events = leftover.len(),
                        "⚠️ No actor state available, dropping pending events"
                    ),
                }
            } else {
                debug!(
                    recording_id = self.timeline.id.0,
                    events = leftover.len(),
                    "🗑️ Discarding pending events at stop"
                );
            }
        }

        self.timeline.finish(now, reason);
        self.timeline
    }
}

/// Checks the stop conditions for a sampling tick and reads the actor state.
pub fn observe(
    world: &dyn WorldCollaborator,
    actor: ActorId,
    start_time: i64,
    now: i64,
    max_duration_millis: i64,
) -> Result<ActorSnapshot, &'static str> {
    if !world.actor_connected(actor) {
        return Err(end_reason::DISCONNECTED);
    }
    if now - start_time >= max_duration_millis {
        return Err(end_reason::TIMED_OUT);
    }
    world
        .actor_snapshot(actor)
        .ok_or(end_reason::DISCONNECTED)
}

fn frame_state(frame: &Frame) -> ActorSnapshot {
    ActorSnapshot {
        location: frame.location.clone(),
        flags: frame.flags,
        vitals: frame.vitals,
    }
}
