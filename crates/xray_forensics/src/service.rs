//! # Forensics Service
//!
//! The single entry point a host talks to. It owns the detector, the recording
//! registry and the replay engine, receives [`WorldEvent`]s from the dispatch
//! path and is ticked by the host scheduler.
//!
//! ## Dispatch path
//!
//! [`ForensicsService::handle_world_event`] is synchronous and never waits on
//! the tick: detection and recording only append to per-actor state.
//!
//! ## Scheduler path
//!
//! [`ForensicsService::tick`] samples active recordings and advances replays.

use crate::clock::Clock;
use crate::collaborators::{NotificationCollaborator, StorageCollaborator, WorldCollaborator};
use crate::config::ForensicsConfig;
use crate::detector::SuspicionDetector;
use crate::error::ForensicsError;
use crate::events::WorldEvent;
use crate::recording::{end_reason, RecordingRegistry};
use crate::replay::{ReplayEngine, ReplayStart, ReplayVariant};
use crate::timeline::{RecordingId, Timeline};
use crate::types::{ActorId, BlockKey, ViewerId};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct ForensicsService {
    config: ForensicsConfig,
    clock: Arc<dyn Clock>,
    detector: SuspicionDetector,
    registry: Arc<RecordingRegistry>,
    replays: ReplayEngine,
    breaking: DashMap<ActorId, (BlockKey, f32)>,
}

impl ForensicsService {
    pub fn new(
        config: ForensicsConfig,
        world: Arc<dyn WorldCollaborator>,
        storage: Arc<dyn StorageCollaborator>,
        notifier: Arc<dyn NotificationCollaborator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let detector = SuspicionDetector::new(config.detector.clone(), clock.clone());
        let registry = Arc::new(RecordingRegistry::new(
            config.recording.clone(),
            world.clone(),
            storage,
            notifier,
            clock.clone(),
        ));
        let replays = ReplayEngine::new(world, config.replay.clone());

        Self {
            config,
            clock,
            detector,
            registry,
            replays,
            breaking: DashMap::new(),
        }
    }

    /// Loads persisted recordings into the archive.
    pub async fn initialize(&self) -> usize {
        let loaded = self.registry.load_archive().await;
        info!("🔧 Forensics service ready ({} archived recordings)", loaded);
        loaded
    }

    /// Feeds one world notification to the detector and the recording buffers.
    /// Returns the id of a recording started by this event, if any.
    pub fn handle_world_event(&self, event: &WorldEvent) -> Option<RecordingId> {
        let actor = event.actor();
        let mut started = None;

        match event {
            WorldEvent::ActorDisconnected { .. } => {
                self.detector.forget(actor);
                self.breaking.remove(&actor);
                if self.replays.stop(actor) {
                    debug!(viewer = %actor, "Viewer left during replay");
                }
                return None;
            }
            WorldEvent::BlockDamageStarted { world, pos, .. } => {
                self.breaking.insert(actor, (BlockKey::new(world.clone(), *pos), 0.0));
            }
            WorldEvent::BlockDamageProgress { world, pos, progress, .. } => {
                self.breaking
                    .insert(actor, (BlockKey::new(world.clone(), *pos), progress.clamp(0.0, 1.0)));
            }
            WorldEvent::BlockDamageAborted { .. } => {
                self.breaking.remove(&actor);
            }
            WorldEvent::BlockBroken { material, .. } => {
                self.breaking.remove(&actor);
                if let Some(category) = self.detector.classify(material) {
                    if let Some(trigger) =
                        self.detector
                            .on_resource_break(actor, category, self.registry.as_ref())
                    {
                        started = self.registry.start_recording(actor, &trigger.reason);
                    }
                }
            }
            WorldEvent::BlockPlaced { .. } => {}
        }

        if let Some(block_event) = event.to_block_event(self.clock.now_millis()) {
            self.registry.record_block_event(actor, block_event);
        }
        started
    }

    /// One scheduler tick: sample recordings, then advance replays.
    pub async fn tick(&self) {
        self.registry.tick().await;
        self.replays.tick();
    }

    /// Starts an operator-requested recording.
    pub fn start_recording(&self, actor: ActorId, reason: &str) -> Option<RecordingId> {
        self.registry.start_recording(actor, reason)
    }

    pub async fn stop_recording(&self, actor: ActorId) -> Option<Arc<Timeline>> {
        self.registry.stop_recording(actor, end_reason::OPERATOR).await
    }

    /// Starts a replay from operator input such as `"#12"`.
    pub async fn start_replay_by_input(
        &self,
        input: &str,
        viewer: ViewerId,
        variant: ReplayVariant,
    ) -> Result<ReplayStart, ForensicsError> {
        let id: RecordingId = input.parse()?;
        self.start_replay(id, viewer, variant).await
    }

    pub async fn start_replay(
        &self,
        id: RecordingId,
        viewer: ViewerId,
        variant: ReplayVariant,
    ) -> Result<ReplayStart, ForensicsError> {
        let timeline = self.registry.get_required(id).await?;
        self.replays.start(timeline, viewer, variant)
    }

    pub fn stop_replay(&self, viewer: ViewerId) -> bool {
        self.replays.stop(viewer)
    }

    pub async fn delete_recording(&self, id: RecordingId) -> bool {
        self.registry.delete(id).await
    }

    /// Current block being broken by `actor` and its progress.
    pub fn breaking_progress(&self, actor: ActorId) -> Option<(BlockKey, f32)> {
        self.breaking.get(&actor).map(|entry| entry.value().clone())
    }

    /// Stops every replay (restoring viewers) and then every recording.
    pub async fn shutdown(&self) {
        let replays = self.replays.stop_all();
        let recordings = self.registry.stop_all(end_reason::PLUGIN_DISABLED).await;
        info!(
            "🛑 Forensics service shut down ({} replays, {} recordings stopped)",
            replays, recordings
        );
    }

    pub fn config(&self) -> &ForensicsConfig {
        &self.config
    }

    pub fn detector(&self) -> &SuspicionDetector {
        &self.detector
    }

    pub fn registry(&self) -> &Arc<RecordingRegistry> {
        &self.registry
    }

    pub fn replays(&self) -> &ReplayEngine {
        &self.replays
    }
}
