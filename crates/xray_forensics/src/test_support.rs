//! In-memory collaborators for unit tests.

use crate::collaborators::{
    NotificationCollaborator, RecordingNotice, StorageCollaborator, WorldCollaborator,
};
use crate::error::WorldError;
use crate::timeline::{RecordingId, Timeline};
use crate::types::{
    Actor, ActorId, ActorSnapshot, BlockKey, BlockPos, EffectKind, Location, Material,
    MovementFlags, Orientation, Position, ViewerId, ViewerMode, Vitals,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One viewer-addressed output captured by [`MockWorld`].
#[derive(Debug, Clone, PartialEq)]
pub enum VisualCall {
    Block { viewer: ViewerId, key: BlockKey, material: Material },
    Animation { viewer: ViewerId, key: BlockKey, stage: Option<u8> },
    Effect { viewer: ViewerId, key: BlockKey, material: Material, effect: EffectKind },
    Teleport { viewer: ViewerId, location: Location },
    Mode { viewer: ViewerId, mode: ViewerMode },
    Message { viewer: ViewerId, text: String },
}

type HookFn = Arc<dyn Fn(ActorId) + Send + Sync>;

/// Test code run from inside a world call, with no mock locks held.
#[derive(Default)]
struct Hook(Mutex<Option<HookFn>>);

impl Hook {
    fn set(&self, hook: HookFn) {
        *self.0.lock().unwrap() = Some(hook);
    }

    fn run(&self, id: ActorId) {
        let hook = self.0.lock().unwrap().clone();
        if let Some(hook) = hook {
            hook(id);
        }
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

#[derive(Debug, Clone)]
struct MockActor {
    name: String,
    connected: bool,
    snapshot: ActorSnapshot,
    mode: ViewerMode,
}

#[derive(Debug)]
pub struct MockWorld {
    actors: Mutex<HashMap<ActorId, MockActor>>,
    worlds: Mutex<HashSet<String>>,
    blocks: Mutex<HashMap<BlockKey, Material>>,
    calls: Mutex<Vec<VisualCall>>,
    fail_delivery: AtomicBool,
    on_snapshot: Hook,
    on_teleport: Hook,
}

impl MockWorld {
    /// A world store containing only the world named `"world"`.
    pub fn new() -> Self {
        Self {
            actors: Mutex::new(HashMap::new()),
            worlds: Mutex::new(HashSet::from(["world".to_string()])),
            blocks: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            fail_delivery: AtomicBool::new(false),
            on_snapshot: Hook::default(),
            on_teleport: Hook::default(),
        }
    }

    pub fn spawn_actor(&self, name: &str, world: &str) -> ActorId {
        let id = ActorId::new();
        self.worlds.lock().unwrap().insert(world.to_string());
        self.actors.lock().unwrap().insert(
            id,
            MockActor {
                name: name.to_string(),
                connected: true,
                snapshot: ActorSnapshot {
                    location: Location::new(world, Position::new(0.0, 64.0, 0.0), Orientation::default()),
                    flags: MovementFlags::default(),
                    vitals: Vitals::default(),
                },
                mode: ViewerMode::Survival,
            },
        );
        id
    }

    pub fn disconnect(&self, id: ActorId) {
        if let Some(actor) = self.actors.lock().unwrap().get_mut(&id) {
            actor.connected = false;
        }
    }

    pub fn move_actor(&self, id: ActorId, location: Location) {
        if let Some(actor) = self.actors.lock().unwrap().get_mut(&id) {
            actor.snapshot.location = location;
        }
    }

    pub fn location_of(&self, id: ActorId) -> Option<Location> {
        self.actors
            .lock()
            .unwrap()
            .get(&id)
            .map(|actor| actor.snapshot.location.clone())
    }

    pub fn add_world(&self, world: &str) {
        self.worlds.lock().unwrap().insert(world.to_string());
    }

    pub fn remove_world(&self, world: &str) {
        self.worlds.lock().unwrap().remove(world);
    }

    pub fn set_block(&self, world: &str, pos: BlockPos, material: &str) {
        self.blocks
            .lock()
            .unwrap()
            .insert(BlockKey::new(world, pos), Material::new(material));
    }

    pub fn set_fail_delivery(&self, fail: bool) {
        self.fail_delivery.store(fail, Ordering::SeqCst);
    }

    /// Runs `hook` at the start of every `actor_snapshot` call.
    pub fn on_snapshot(&self, hook: impl Fn(ActorId) + Send + Sync + 'static) {
        self.on_snapshot.set(Arc::new(hook));
    }

    /// Runs `hook` at the start of every `teleport_viewer` call.
    pub fn on_teleport(&self, hook: impl Fn(ViewerId) + Send + Sync + 'static) {
        self.on_teleport.set(Arc::new(hook));
    }

    pub fn calls(&self) -> Vec<VisualCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Visual block updates sent to `viewer`, in order.
    pub fn block_updates(&self, viewer: ViewerId) -> Vec<(BlockKey, Material)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VisualCall::Block { viewer: v, key, material } if v == viewer => Some((key, material)),
                _ => None,
            })
            .collect()
    }

    /// The most recent visual update per position for `viewer`.
    pub fn last_block_updates(&self, viewer: ViewerId) -> HashMap<BlockKey, Material> {
        self.block_updates(viewer).into_iter().collect()
    }

    pub fn animations(&self, viewer: ViewerId) -> Vec<(BlockKey, Option<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VisualCall::Animation { viewer: v, key, stage } if v == viewer => Some((key, stage)),
                _ => None,
            })
            .collect()
    }

    pub fn effects(&self, viewer: ViewerId) -> Vec<(BlockKey, EffectKind)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VisualCall::Effect { viewer: v, key, effect, .. } if v == viewer => Some((key, effect)),
                _ => None,
            })
            .collect()
    }

    pub fn teleports(&self, viewer: ViewerId) -> Vec<Location> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VisualCall::Teleport { viewer: v, location } if v == viewer => Some(location),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self, viewer: ViewerId) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                VisualCall::Message { viewer: v, text } if v == viewer => Some(text),
                _ => None,
            })
            .collect()
    }

    fn deliver(&self, call: VisualCall) -> Result<(), WorldError> {
        if self.fail_delivery.load(Ordering::SeqCst) {
            return Err(WorldError::Delivery("mock delivery failure".to_string()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    fn require_online(&self, viewer: ViewerId) -> Result<(), WorldError> {
        if self.actor_connected(viewer) {
            Ok(())
        } else {
            Err(WorldError::ActorOffline(viewer.to_string()))
        }
    }
}

impl Default for MockWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldCollaborator for MockWorld {
    fn actor_by_id(&self, id: ActorId) -> Option<Actor> {
        self.actors
            .lock()
            .unwrap()
            .get(&id)
            .map(|actor| Actor::new(id, actor.name.clone()))
    }

    fn actor_connected(&self, id: ActorId) -> bool {
        self.actors
            .lock()
            .unwrap()
            .get(&id)
            .map(|actor| actor.connected)
            .unwrap_or(false)
    }

    fn actor_snapshot(&self, id: ActorId) -> Option<ActorSnapshot> {
        self.on_snapshot.run(id);
        self.actors
            .lock()
            .unwrap()
            .get(&id)
            .filter(|actor| actor.connected)
            .map(|actor| actor.snapshot.clone())
    }

    fn world_exists(&self, world: &str) -> bool {
        self.worlds.lock().unwrap().contains(world)
    }

    fn block_material_at(&self, world: &str, pos: BlockPos) -> Option<Material> {
        if !self.world_exists(world) {
            return None;
        }
        Some(
            self.blocks
                .lock()
                .unwrap()
                .get(&BlockKey::new(world, pos))
                .cloned()
                .unwrap_or_else(Material::air),
        )
    }

    fn viewer_mode(&self, viewer: ViewerId) -> Option<ViewerMode> {
        self.actors
            .lock()
            .unwrap()
            .get(&viewer)
            .filter(|actor| actor.connected)
            .map(|actor| actor.mode)
    }

    fn send_visual_block_update(
        &self,
        viewer: ViewerId,
        world: &str,
        pos: BlockPos,
        material: &Material,
    ) -> Result<(), WorldError> {
        self.deliver(VisualCall::Block {
            viewer,
            key: BlockKey::new(world, pos),
            material: material.clone(),
        })
    }

    fn send_break_animation(
        &self,
        viewer: ViewerId,
        world: &str,
        pos: BlockPos,
        stage: Option<u8>,
    ) -> Result<(), WorldError> {
        self.deliver(VisualCall::Animation {
            viewer,
            key: BlockKey::new(world, pos),
            stage,
        })
    }

    fn teleport_viewer(&self, viewer: ViewerId, location: &Location) -> Result<(), WorldError> {
        self.on_teleport.run(viewer);
        self.require_online(viewer)?;
        if !self.world_exists(&location.world) {
            return Err(WorldError::UnknownWorld(location.world.clone()));
        }
        self.deliver(VisualCall::Teleport {
            viewer,
            location: location.clone(),
        })?;
        self.move_actor(viewer, location.clone());
        Ok(())
    }

    fn set_viewer_mode(&self, viewer: ViewerId, mode: ViewerMode) -> Result<(), WorldError> {
        self.require_online(viewer)?;
        self.deliver(VisualCall::Mode { viewer, mode })?;
        if let Some(actor) = self.actors.lock().unwrap().get_mut(&viewer) {
            actor.mode = mode;
        }
        Ok(())
    }

    fn play_effect(
        &self,
        viewer: ViewerId,
        world: &str,
        pos: BlockPos,
        material: &Material,
        effect: EffectKind,
    ) -> Result<(), WorldError> {
        self.deliver(VisualCall::Effect {
            viewer,
            key: BlockKey::new(world, pos),
            material: material.clone(),
            effect,
        })
    }

    fn send_message(&self, viewer: ViewerId, message: &str) -> Result<(), WorldError> {
        self.deliver(VisualCall::Message {
            viewer,
            text: message.to_string(),
        })
    }
}

/// Storage backed by a map, with switchable save failures.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    timelines: Mutex<HashMap<RecordingId, Timeline>>,
    fail_saves: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, timeline: Timeline) {
        self.timelines.lock().unwrap().insert(timeline.id, timeline);
    }

    pub fn contains(&self, id: RecordingId) -> bool {
        self.timelines.lock().unwrap().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.timelines.lock().unwrap().len()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageCollaborator for MemoryStorage {
    async fn save(&self, timeline: &Timeline) -> bool {
        if self.fail_saves.load(Ordering::SeqCst) {
            return false;
        }
        self.insert(timeline.clone());
        true
    }

    async fn load(&self, id: RecordingId) -> Option<Timeline> {
        self.timelines.lock().unwrap().get(&id).cloned()
    }

    async fn load_all(&self) -> Vec<Timeline> {
        self.timelines.lock().unwrap().values().cloned().collect()
    }

    async fn delete(&self, id: RecordingId) -> bool {
        self.timelines.lock().unwrap().remove(&id).is_some()
    }

    async fn exists(&self, id: RecordingId) -> bool {
        self.contains(id)
    }
}

/// Keeps every notice it receives.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    notices: Mutex<Vec<RecordingNotice>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<RecordingNotice> {
        self.notices.lock().unwrap().clone()
    }

    /// `(actor_name, reason)` of every start notice.
    pub fn started(&self) -> Vec<(String, String)> {
        self.notices()
            .into_iter()
            .filter_map(|notice| match notice {
                RecordingNotice::RecordingStarted { actor_name, reason } => Some((actor_name, reason)),
                _ => None,
            })
            .collect()
    }

    /// `(recording_id, frame_count)` of every completion notice.
    pub fn completed(&self) -> Vec<(RecordingId, usize)> {
        self.notices()
            .into_iter()
            .filter_map(|notice| match notice {
                RecordingNotice::RecordingCompleted {
                    recording_id,
                    frame_count,
                    ..
                } => Some((recording_id, frame_count)),
                _ => None,
            })
            .collect()
    }
}

impl NotificationCollaborator for CollectingNotifier {
    fn notify(&self, notice: RecordingNotice) {
        self.notices.lock().unwrap().push(notice);
    }
}
