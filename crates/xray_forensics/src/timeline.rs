//! # Timeline Data Model
//!
//! A [`Timeline`] is the evidence produced by one recording session: metadata
//! about who was recorded and why, plus an ordered list of sampled [`Frame`]s.
//! Each frame carries the [`BlockEvent`]s that arrived since the previous sample.
//!
//! ## Invariants
//!
//! - Frame timestamps within a timeline never decrease; [`Timeline::push_frame`]
//!   clamps late samples to the previous timestamp.
//! - A timeline is immutable once [`Timeline::finish`] has stamped its end.
//! - Recording ids are allocated monotonically by [`RecordingIdAllocator`].

use crate::error::ForensicsError;
use crate::types::{ActorId, ActorSnapshot, BlockKey, BlockPos, Location, Material, MovementFlags, Vitals};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::debug;

/// Highest break animation stage understood by clients.
pub const MAX_BREAK_STAGE: u8 = 9;

// ============================================================================
// Recording identifiers
// ============================================================================

/// Numeric identifier of a recording, shown to operators as `#id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(pub u32);

impl std::fmt::Display for RecordingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::str::FromStr for RecordingId {
    type Err = ForensicsError;

    /// Parses operator input such as `"12"` or `"#12"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        digits
            .parse::<u32>()
            .map(RecordingId)
            .map_err(|_| ForensicsError::InvalidIdentifier(s.to_string()))
    }
}

/// Process-wide monotonic source of recording ids.
#[derive(Debug)]
pub struct RecordingIdAllocator {
    next: AtomicU32,
}

impl RecordingIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU32::new(1),
        }
    }

    /// Returns a fresh id, never handed out before by this allocator.
    pub fn allocate(&self) -> RecordingId {
        RecordingId(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Ensures future ids are strictly greater than `id` (used after loading the archive).
    pub fn advance_past(&self, id: RecordingId) {
        self.next.fetch_max(id.0.saturating_add(1), Ordering::SeqCst);
    }
}

impl Default for RecordingIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Block events
// ============================================================================

/// Kind of world mutation captured in a [`BlockEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockEventKind {
    BreakStart,
    BreakProgress,
    BreakComplete,
    BreakCancel,
    Place,
}

impl BlockEventKind {
    /// Whether this kind changes the block itself rather than only its crack overlay.
    pub fn changes_block(self) -> bool {
        matches!(self, BlockEventKind::BreakComplete | BlockEventKind::Place)
    }

    pub fn is_breaking(self) -> bool {
        matches!(
            self,
            BlockEventKind::BreakStart | BlockEventKind::BreakProgress | BlockEventKind::BreakComplete
        )
    }
}

/// A discrete world mutation attributed to the recorded actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEvent {
    /// Epoch milliseconds at which the mutation was observed
    pub timestamp: i64,
    pub kind: BlockEventKind,
    pub world: String,
    pub pos: BlockPos,
    /// Material of the block involved (the broken block, or the placed one)
    pub material: Material,
    /// Break progress in `[0, 1]`
    pub progress: f32,
    /// Entity id used by clients to attribute the crack animation
    #[serde(default)]
    pub origin_id: Option<i32>,
}

impl BlockEvent {
    /// Creates an event with the default progress for its kind.
    pub fn new(
        kind: BlockEventKind,
        timestamp: i64,
        world: impl Into<String>,
        pos: BlockPos,
        material: Material,
    ) -> Self {
        let progress = match kind {
            BlockEventKind::BreakStart => 0.1,
            BlockEventKind::BreakComplete => 1.0,
            _ => 0.0,
        };
        Self {
            timestamp,
            kind,
            world: world.into(),
            pos,
            material,
            progress,
            origin_id: None,
        }
    }

    /// Sets the break progress, clamped to `[0, 1]`.
    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        self
    }

    pub fn with_origin(mut self, origin_id: i32) -> Self {
        self.origin_id = Some(origin_id);
        self
    }

    /// Crack animation stage for this event.
    ///
    /// `None` means "clear the animation" (cancel and complete events);
    /// otherwise `clamp(floor(progress * 9), 0, 9)`.
    pub fn break_stage(&self) -> Option<u8> {
        match self.kind {
            BlockEventKind::BreakComplete | BlockEventKind::BreakCancel => None,
            _ => {
                let stage = (self.progress * MAX_BREAK_STAGE as f32).floor();
                Some(stage.clamp(0.0, MAX_BREAK_STAGE as f32) as u8)
            }
        }
    }

    pub fn key(&self) -> BlockKey {
        BlockKey::new(self.world.clone(), self.pos)
    }
}

// ============================================================================
// Frames
// ============================================================================

/// Which kinds of block activity a frame contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameActivity {
    pub breaking: bool,
    pub placing: bool,
}

/// One sampled snapshot of the recorded actor plus the events since the previous sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub timestamp: i64,
    pub location: Location,
    pub flags: MovementFlags,
    pub vitals: Vitals,
    #[serde(default)]
    pub block_events: Vec<BlockEvent>,
}

impl Frame {
    pub fn from_snapshot(timestamp: i64, snapshot: &ActorSnapshot, block_events: Vec<BlockEvent>) -> Self {
        Self {
            timestamp,
            location: snapshot.location.clone(),
            flags: snapshot.flags,
            vitals: snapshot.vitals,
            block_events,
        }
    }

    pub fn has_block_events(&self) -> bool {
        !self.block_events.is_empty()
    }

    pub fn activity(&self) -> FrameActivity {
        self.block_events
            .iter()
            .fold(FrameActivity::default(), |mut activity, event| {
                activity.breaking |= event.kind.is_breaking();
                activity.placing |= event.kind == BlockEventKind::Place;
                activity
            })
    }
}

// ============================================================================
// Timeline
// ============================================================================

/// A recording: metadata plus ordered frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub id: RecordingId,
    pub actor_id: ActorId,
    pub actor_name: String,
    pub trigger_reason: String,
    pub start_time: i64,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub end_reason: Option<String>,
    #[serde(default)]
    frames: Vec<Frame>,
}

impl Timeline {
    pub fn new(
        id: RecordingId,
        actor_id: ActorId,
        actor_name: impl Into<String>,
        trigger_reason: impl Into<String>,
        start_time: i64,
    ) -> Self {
        Self {
            id,
            actor_id,
            actor_name: actor_name.into(),
            trigger_reason: trigger_reason.into(),
            start_time,
            end_time: None,
            end_reason: None,
            frames: Vec::new(),
        }
    }

    /// Appends a frame, keeping timestamps non-decreasing.
    pub fn push_frame(&mut self, mut frame: Frame) {
        if let Some(last) = self.frames.last() {
            if frame.timestamp < last.timestamp {
                debug!(
                    "⏱️ Clamping out-of-order frame for recording {} ({} < {})",
                    self.id, frame.timestamp, last.timestamp
                );
                frame.timestamp = last.timestamp;
            }
        }
        self.frames.push(frame);
    }

    /// Stamps the end of the recording. Has no effect on an already finished timeline.
    pub fn finish(&mut self, end_time: i64, end_reason: impl Into<String>) {
        if self.is_complete() {
            return;
        }
        self.end_time = Some(end_time.max(self.start_time));
        self.end_reason = Some(end_reason.into());
    }

    pub fn is_complete(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn total_block_events(&self) -> usize {
        self.frames.iter().map(|f| f.block_events.len()).sum()
    }

    /// Recorded wall-clock span in whole seconds (0 while still recording).
    pub fn duration_secs(&self) -> u64 {
        self.end_time
            .map(|end| ((end - self.start_time).max(0) / 1000) as u64)
            .unwrap_or(0)
    }

    /// Whether frame timestamps are non-decreasing. Always true for timelines
    /// built through [`Timeline::push_frame`]; checked for deserialized data.
    pub fn is_well_ordered(&self) -> bool {
        self.frames.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
    }
}
