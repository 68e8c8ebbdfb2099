//! Owner of active recording sessions and the completed-recordings archive.
//!
//! The active map holds at most one session per actor; insertion goes through
//! a vacant-entry check so concurrent triggers for the same actor cannot both
//! succeed. The archive is kept newest-id-first and bounded by
//! `max_retained`, evicting (and deleting from storage) the oldest entries.
//!
//! Map entries are shared slots. The tick clones the slots out of the map and
//! talks to the world with no map guard and no session lock held, so block
//! events and status queries never wait on sampling. Block events go straight
//! to the actor's pending buffer, which is open exactly while a session is.

use super::end_reason;
use super::pending::PendingEvents;
use super::session::{observe, RecordingSession};
use crate::clock::Clock;
use crate::collaborators::{
    NotificationCollaborator, RecordingNotice, StorageCollaborator, WorldCollaborator,
};
use crate::config::RecordingSettings;
use crate::detector::RecordingProbe;
use crate::error::ForensicsError;
use crate::timeline::{BlockEvent, RecordingId, RecordingIdAllocator, Timeline};
use crate::types::ActorId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Read-only view of an active session.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRecording {
    pub id: RecordingId,
    pub actor_id: ActorId,
    pub actor_name: String,
    pub reason: String,
    pub start_time: i64,
    pub frame_count: usize,
    pub pending_events: usize,
}

/// One active map entry. The session is taken out exactly once, by whoever
/// stops it.
#[derive(Debug)]
struct ActiveSlot {
    actor_id: ActorId,
    start_time: i64,
    session: Mutex<Option<RecordingSession>>,
}

impl ActiveSlot {
    fn lock(&self) -> MutexGuard<'_, Option<RecordingSession>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug)]
pub struct RecordingRegistry {
    settings: RecordingSettings,
    world: Arc<dyn WorldCollaborator>,
    storage: Arc<dyn StorageCollaborator>,
    notifier: Arc<dyn NotificationCollaborator>,
    clock: Arc<dyn Clock>,
    ids: RecordingIdAllocator,
    active: DashMap<ActorId, Arc<ActiveSlot>>,
    pending: PendingEvents,
    archive: RwLock<VecDeque<Arc<Timeline>>>,
}

impl RecordingRegistry {
    pub fn new(
        settings: RecordingSettings,
        world: Arc<dyn WorldCollaborator>,
        storage: Arc<dyn StorageCollaborator>,
        notifier: Arc<dyn NotificationCollaborator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            world,
            storage,
            notifier,
            clock,
            ids: RecordingIdAllocator::new(),
            active: DashMap::new(),
            pending: PendingEvents::new(),
            archive: RwLock::new(VecDeque::new()),
        }
    }

    /// Restores the archive from storage: newest id first, capped at
    /// `max_retained`, with the id allocator moved past every loaded id.
    /// Entries beyond the cap are deleted from storage.
    pub async fn load_archive(&self) -> usize {
        let mut loaded = self.storage.load_all().await;
        loaded.sort_by(|a, b| b.id.cmp(&a.id));

        if let Some(newest) = loaded.first() {
            self.ids.advance_past(newest.id);
        }

        let overflow = if self.settings.max_retained > 0 && loaded.len() > self.settings.max_retained {
            loaded.split_off(self.settings.max_retained)
        } else {
            Vec::new()
        };

        let count = loaded.len();
        {
            let mut archive = self.archive.write().await;
            archive.clear();
            archive.extend(loaded.into_iter().map(Arc::new));
        }

        for timeline in overflow {
            debug!(recording_id = timeline.id.0, "🧹 Dropping stored recording beyond retention cap");
            self.storage.delete(timeline.id).await;
        }

        info!("📂 Loaded {} recordings from storage", count);
        count
    }

    /// Starts recording `actor_id`. Returns `None` without side effects when
    /// recording is disabled, the actor is unknown, or it is already recorded.
    pub fn start_recording(&self, actor_id: ActorId, reason: &str) -> Option<RecordingId> {
        if !self.settings.enabled {
            return None;
        }
        let Some(actor) = self.world.actor_by_id(actor_id) else {
            debug!(actor = %actor_id, "Ignoring recording request for unknown actor");
            return None;
        };

        let id = match self.active.entry(actor_id) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(slot) => {
                let id = self.ids.allocate();
                let start_time = self.clock.now_millis();
                let timeline = Timeline::new(id, actor_id, actor.name.clone(), reason, start_time);
                self.pending.open(actor_id);
                slot.insert(Arc::new(ActiveSlot {
                    actor_id,
                    start_time,
                    session: Mutex::new(Some(RecordingSession::new(
                        timeline,
                        self.settings.interval_ticks,
                    ))),
                }));
                id
            }
        };

        info!(recording_id = id.0, actor = %actor.name, "🎥 Recording started: {}", reason);
        self.notifier.notify(RecordingNotice::RecordingStarted {
            actor_name: actor.name,
            reason: reason.to_string(),
        });
        Some(id)
    }

    /// Stops the actor's session, if any. Idempotent.
    pub async fn stop_recording(&self, actor_id: ActorId, reason: &str) -> Option<Arc<Timeline>> {
        let slot = self.active.get(&actor_id).map(|entry| entry.value().clone())?;
        self.stop_slot(&slot, reason).await
    }

    /// Stops the session held by `slot`. Only the first caller gets the session.
    async fn stop_slot(&self, slot: &Arc<ActiveSlot>, reason: &str) -> Option<Arc<Timeline>> {
        // Closing the buffer under the session lock orders it after any
        // in-flight sample: each accepted event is in a frame or in `leftover`.
        let (session, leftover) = {
            let mut guard = slot.lock();
            let session = guard.take()?;
            (session, self.pending.close(slot.actor_id))
        };
        self.active
            .remove_if(&slot.actor_id, |_, current| Arc::ptr_eq(current, slot));

        let timeline = session.finish(
            self.world.as_ref(),
            leftover,
            self.clock.now_millis(),
            reason,
            self.settings.flush_pending_on_stop,
        );
        let timeline = Arc::new(timeline);

        let evicted = self.archive_timeline(timeline.clone()).await;

        if !self.storage.save(&timeline).await {
            error!(recording_id = timeline.id.0, "❌ Failed to persist recording");
        }
        for id in evicted {
            debug!(recording_id = id.0, "🧹 Evicting recording from archive");
            self.storage.delete(id).await;
        }

        info!(
            recording_id = timeline.id.0,
            actor = %timeline.actor_name,
            frames = timeline.frame_count(),
            "⏹️ Recording stopped: {}", reason
        );
        self.notifier.notify(RecordingNotice::RecordingCompleted {
            actor_name: timeline.actor_name.clone(),
            reason: reason.to_string(),
            frame_count: timeline.frame_count(),
            recording_id: timeline.id,
        });
        Some(timeline)
    }

    /// Inserts in newest-id-first order and returns the ids evicted over the cap.
    async fn archive_timeline(&self, timeline: Arc<Timeline>) -> Vec<RecordingId> {
        let mut archive = self.archive.write().await;
        let index = archive
            .iter()
            .position(|existing| existing.id < timeline.id)
            .unwrap_or(archive.len());
        archive.insert(index, timeline);

        let mut evicted = Vec::new();
        if self.settings.max_retained > 0 {
            while archive.len() > self.settings.max_retained {
                if let Some(oldest) = archive.pop_back() {
                    evicted.push(oldest.id);
                }
            }
        }
        evicted
    }

    /// Buffers a world mutation for the actor's next frame. Returns `false`
    /// (and drops the event) when the actor is not being recorded.
    pub fn record_block_event(&self, actor_id: ActorId, event: BlockEvent) -> bool {
        self.pending.append(actor_id, event)
    }

    pub fn is_recording(&self, actor_id: ActorId) -> bool {
        self.active.contains_key(&actor_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn get_active(&self) -> Vec<ActiveRecording> {
        let mut active: Vec<ActiveRecording> = self
            .slots()
            .iter()
            .filter_map(|slot| {
                let guard = slot.lock();
                let timeline = guard.as_ref()?.timeline();
                Some(ActiveRecording {
                    id: timeline.id,
                    actor_id: timeline.actor_id,
                    actor_name: timeline.actor_name.clone(),
                    reason: timeline.trigger_reason.clone(),
                    start_time: timeline.start_time,
                    frame_count: timeline.frame_count(),
                    pending_events: self.pending.len(timeline.actor_id),
                })
            })
            .collect();
        active.sort_by_key(|recording| recording.id);
        active
    }

    /// Completed recordings, newest first.
    pub async fn get_completed(&self) -> Vec<Arc<Timeline>> {
        self.archive.read().await.iter().cloned().collect()
    }

    /// Looks up a completed recording in the archive, then in storage.
    pub async fn get_by_id(&self, id: RecordingId) -> Option<Arc<Timeline>> {
        if let Some(found) = self.archive.read().await.iter().find(|t| t.id == id) {
            return Some(found.clone());
        }
        self.storage.load(id).await.map(Arc::new)
    }

    pub async fn get_required(&self, id: RecordingId) -> Result<Arc<Timeline>, ForensicsError> {
        self.get_by_id(id)
            .await
            .ok_or(ForensicsError::UnknownRecording(id))
    }

    /// Removes a recording from the archive and from storage. True iff it was
    /// found in either place.
    pub async fn delete(&self, id: RecordingId) -> bool {
        let in_archive = {
            let mut archive = self.archive.write().await;
            match archive.iter().position(|t| t.id == id) {
                Some(index) => archive.remove(index).is_some(),
                None => false,
            }
        };
        let in_storage = self.storage.delete(id).await;

        if in_archive || in_storage {
            info!(recording_id = id.0, "🗑️ Recording deleted");
        } else {
            debug!(recording_id = id.0, "Delete requested for unknown recording");
        }
        in_archive || in_storage
    }

    /// Stops every active session. Iterates a snapshot of the active actors.
    pub async fn stop_all(&self, reason: &str) -> usize {
        let actors: Vec<ActorId> = self.active.iter().map(|entry| *entry.key()).collect();
        let mut stopped = 0;
        for actor in actors {
            if self.stop_recording(actor, reason).await.is_some() {
                stopped += 1;
            }
        }
        if stopped > 0 {
            info!("⏹️ Stopped {} active recordings ({})", stopped, reason);
        }
        stopped
    }

    fn slots(&self) -> Vec<Arc<ActiveSlot>> {
        self.active.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Advances every active session by one scheduler tick.
    pub async fn tick(&self) {
        let now = self.clock.now_millis();
        let max_duration = self.settings.max_duration_millis();

        let mut to_stop = Vec::new();
        for slot in self.slots() {
            let due = slot.lock().as_mut().map(RecordingSession::advance).unwrap_or(false);
            if !due {
                continue;
            }
            match observe(self.world.as_ref(), slot.actor_id, slot.start_time, now, max_duration) {
                Ok(snapshot) => {
                    // A stop may have taken the session while the world was sampled.
                    if let Some(session) = slot.lock().as_mut() {
                        session.record_sample(&self.pending, now, &snapshot);
                    }
                }
                Err(reason) => to_stop.push((slot, reason)),
            }
        }

        for (slot, reason) in to_stop {
            if reason == end_reason::DISCONNECTED {
                warn!(actor = %slot.actor_id, "📴 Recorded actor went offline");
            }
            self.stop_slot(&slot, reason).await;
        }
    }
}

impl RecordingProbe for RecordingRegistry {
    fn is_recording(&self, actor: ActorId) -> bool {
        RecordingRegistry::is_recording(self, actor)
    }
}
