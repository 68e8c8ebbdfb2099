//! End-to-end flows over real JSON storage.

use crate::clock::ManualClock;
use crate::config::ForensicsConfig;
use crate::events::WorldEvent;
use crate::replay::{ReplayStart, ReplayVariant};
use crate::service::ForensicsService;
use crate::storage::JsonFileStorage;
use crate::test_support::{CollectingNotifier, MockWorld};
use crate::collaborators::WorldCollaborator;
use crate::timeline::{BlockEventKind, RecordingId};
use crate::types::{BlockPos, Location, Material, Orientation, Position, ViewerMode};
use std::sync::Arc;

fn broke(actor: crate::types::ActorId, x: i32) -> WorldEvent {
    WorldEvent::BlockBroken {
        actor,
        world: "world".to_string(),
        pos: BlockPos::new(x, 11, 5),
        material: Material::new("diamond_ore"),
    }
}

async fn service(
    dir: &std::path::Path,
    world: Arc<MockWorld>,
    clock: Arc<ManualClock>,
) -> (ForensicsService, Arc<CollectingNotifier>) {
    let storage = Arc::new(JsonFileStorage::open(dir).await.unwrap());
    let notifier = Arc::new(CollectingNotifier::new());
    let service = ForensicsService::new(ForensicsConfig::default(), world, storage, notifier.clone(), clock);
    service.initialize().await;
    (service, notifier)
}

#[tokio::test]
async fn test_detect_record_persist_reload_and_replay() {
    let dir = tempfile::tempdir().unwrap();
    let world = Arc::new(MockWorld::new());
    let clock = Arc::new(ManualClock::new(10_000_000));
    let miner = world.spawn_actor("Miner", "world");
    let admin = world.spawn_actor("Admin", "world");

    let id = {
        let (service, notifier) = service(dir.path(), world.clone(), clock.clone()).await;
        let mut started = None;
        for x in 0..5 {
            started = started.or(service.handle_world_event(&broke(miner, x)));
            clock.advance_secs(2);
        }
        let id = started.unwrap();

        for step in 0..6 {
            world.move_actor(
                miner,
                Location::new("world", Position::new(step as f64, 11.0, 5.0), Orientation::new(step as f32 * 30.0, 0.0)),
            );
            if step == 2 {
                service.handle_world_event(&broke(miner, 10));
            }
            service.tick().await;
            clock.advance(50);
        }
        world.disconnect(miner);
        service.tick().await;
        service.tick().await;

        assert!(!service.registry().is_recording(miner));
        assert_eq!(notifier.completed().len(), 1);
        id
    };

    let (service, _) = service(dir.path(), world.clone(), clock.clone()).await;
    let timeline = service.registry().get_by_id(id).await.unwrap();
    assert_eq!(timeline.end_reason.as_deref(), Some("disconnected"));
    assert_eq!(timeline.total_block_events(), 2);
    assert!(timeline.is_well_ordered());
    assert_eq!(timeline.frames()[0].block_events[0].kind, BlockEventKind::BreakComplete);

    let next = service.start_recording(admin, "allocator check").unwrap();
    assert!(next > id);
    service.stop_recording(admin).await;

    world.set_block("world", BlockPos::new(4, 11, 5), "stone");
    let started = service.start_replay(id, admin, ReplayVariant::Smoothed).await.unwrap();
    assert_eq!(started, ReplayStart::Started);
    assert_eq!(world.viewer_mode(admin), Some(ViewerMode::Spectator));

    let mut guard = 0;
    while service.replays().is_replaying(admin) {
        service.tick().await;
        guard += 1;
        assert!(guard < 500);
    }

    assert_eq!(world.viewer_mode(admin), Some(ViewerMode::Survival));
    for (key, material) in world.last_block_updates(admin) {
        assert_eq!(Some(material), world.block_material_at(&key.world, key.pos));
    }
    assert!(world
        .messages(admin)
        .iter()
        .any(|m| m.starts_with("Replay finished")));
}

#[tokio::test]
async fn test_delete_removes_from_archive_and_disk() {
    let dir = tempfile::tempdir().unwrap();
    let world = Arc::new(MockWorld::new());
    let clock = Arc::new(ManualClock::new(0));
    let (service, _) = service(dir.path(), world.clone(), clock).await;
    let actor = world.spawn_actor("Steve", "world");

    assert!(!service.delete_recording(RecordingId(1234)).await);

    let id = service.start_recording(actor, "manual").unwrap();
    service.tick().await;
    service.stop_recording(actor).await;
    assert!(dir.path().join(format!("recording-{}.json", id.0)).exists());

    assert!(service.delete_recording(id).await);
    assert!(service.registry().get_by_id(id).await.is_none());
    assert!(!dir.path().join(format!("recording-{}.json", id.0)).exists());
}
