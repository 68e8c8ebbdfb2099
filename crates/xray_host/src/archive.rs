//! Offline inspection of a recording directory.
//!
//! These operations work directly on a [`JsonFileStorage`] and never need a
//! running world, so operators can review or clean up recordings while the
//! server is down.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::info;
use xray_forensics::{JsonFileStorage, RecordingId, StorageError, Timeline};

/// One row of `xray-archive list`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveEntry {
    pub id: RecordingId,
    pub actor_name: String,
    pub trigger_reason: String,
    pub started_at: String,
    pub duration_secs: u64,
    pub frame_count: usize,
    pub block_events: usize,
    pub end_reason: Option<String>,
}

impl From<&Timeline> for ArchiveEntry {
    fn from(timeline: &Timeline) -> Self {
        Self {
            id: timeline.id,
            actor_name: timeline.actor_name.clone(),
            trigger_reason: timeline.trigger_reason.clone(),
            started_at: format_timestamp(timeline.start_time),
            duration_secs: timeline.duration_secs(),
            frame_count: timeline.frame_count(),
            block_events: timeline.total_block_events(),
            end_reason: timeline.end_reason.clone(),
        }
    }
}

impl fmt::Display for ArchiveEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<6} {:<16} {}  {:>5}s {:>5} frames {:>4} events  {:<20} {}",
            self.id.to_string(),
            self.actor_name,
            self.started_at,
            self.duration_secs,
            self.frame_count,
            self.block_events,
            self.end_reason.as_deref().unwrap_or("in progress"),
            self.trigger_reason,
        )
    }
}

/// Formats epoch milliseconds as a UTC timestamp.
pub fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| millis.to_string())
}

/// Summaries of every readable recording, newest id first.
pub async fn list(storage: &JsonFileStorage) -> Result<Vec<ArchiveEntry>, StorageError> {
    let mut timelines = storage.try_load_all().await?;
    timelines.sort_by(|a, b| b.id.cmp(&a.id));
    Ok(timelines.iter().map(ArchiveEntry::from).collect())
}

/// Multi-line description of one recording, listing every frame with block activity.
pub fn describe(timeline: &Timeline) -> String {
    let entry = ArchiveEntry::from(timeline);
    let mut lines = vec![
        format!("Recording {} of {}", entry.id, entry.actor_name),
        format!("  reason:   {}", entry.trigger_reason),
        format!("  started:  {}", entry.started_at),
        format!(
            "  ended:    {} ({})",
            timeline
                .end_time
                .map(format_timestamp)
                .unwrap_or_else(|| "-".to_string()),
            entry.end_reason.as_deref().unwrap_or("in progress")
        ),
        format!(
            "  length:   {}s, {} frames, {} block events",
            entry.duration_secs, entry.frame_count, entry.block_events
        ),
    ];

    for (index, frame) in timeline.frames().iter().enumerate() {
        if !frame.has_block_events() {
            continue;
        }
        let activity = frame.activity();
        let label = match (activity.breaking, activity.placing) {
            (true, true) => "breaking+placing",
            (true, false) => "breaking",
            (false, true) => "placing",
            (false, false) => "other",
        };
        lines.push(format!("  frame {index:>4} [{label}]"));
        for event in &frame.block_events {
            lines.push(format!(
                "    {:?} {} at {} {}",
                event.kind, event.material, event.world, event.pos
            ));
        }
    }
    lines.join("\n")
}

/// Deletes all but the `keep` newest recordings. Returns the deleted ids, oldest first.
pub async fn prune(storage: &JsonFileStorage, keep: usize) -> Result<Vec<RecordingId>, StorageError> {
    let ids = storage.list_ids().await?;
    let excess = ids.len().saturating_sub(keep);
    let mut deleted = Vec::with_capacity(excess);
    for id in ids.into_iter().take(excess) {
        if storage.try_delete(id).await? {
            deleted.push(id);
        }
    }
    info!("🧹 Pruned {} recordings, kept {}", deleted.len(), keep);
    Ok(deleted)
}
