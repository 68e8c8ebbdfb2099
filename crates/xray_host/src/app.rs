//! Application lifecycle for the forensics host.
//!
//! The `Application` owns a [`ForensicsService`] and the two host-side paths
//! that drive it:
//!
//! * **Event pump**: world notifications sent through a [`WorldEventSender`]
//!   are handed to [`ForensicsService::handle_world_event`] on their own task,
//!   so the game's dispatch thread never waits on sampling or replay work.
//! * **Tick loop**: a tokio interval calls [`ForensicsService::tick`] once per
//!   configured tick. Ticks never overlap.
//!
//! On shutdown both paths stop, events accepted before the signal are still
//! handled, and the service stops every replay and recording.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    shutdown::ShutdownState,
    signals::{wait_for_shutdown_signal, wait_for_signal_silent},
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use xray_forensics::{
    BroadcastNotifier, CompositeNotifier, ForensicsService, JsonFileStorage, RecordingNotice,
    SystemClock, WorldCollaborator, WorldEvent,
};

/// Cloneable handle the game uses to deliver world notifications.
#[derive(Debug, Clone)]
pub struct WorldEventSender {
    sender: mpsc::UnboundedSender<WorldEvent>,
    shutdown: ShutdownState,
}

impl WorldEventSender {
    /// Queues an event without blocking. Returns false once shutdown has started.
    pub fn send(&self, event: WorldEvent) -> bool {
        if self.shutdown.is_shutdown_initiated() {
            return false;
        }
        self.sender.send(event).is_ok()
    }
}

/// Everything the game needs to drive a running host.
#[derive(Debug)]
pub struct HostHandles {
    /// World notifications go here
    pub events: WorldEventSender,
    /// Operator commands (replay, stop, delete)
    pub service: Arc<ForensicsService>,
    /// Admin alerts, when `notifications.admin_alerts` is enabled
    pub alerts: Option<broadcast::Receiver<RecordingNotice>>,
    /// Stops the host when the game server stops
    pub shutdown: ShutdownState,
}

pub struct Application {
    config: AppConfig,
    service: Arc<ForensicsService>,
    events_tx: mpsc::UnboundedSender<WorldEvent>,
    events_rx: mpsc::UnboundedReceiver<WorldEvent>,
    alerts: Option<BroadcastNotifier>,
    shutdown: ShutdownState,
}

impl Application {
    /// Creates the application from command-line arguments.
    ///
    /// 1. Load configuration from file (creating a default if missing)
    /// 2. Apply command-line overrides
    /// 3. Validate the merged configuration
    /// 4. Open storage and load the recording archive
    pub async fn new(
        args: CliArgs,
        world: Arc<dyn WorldCollaborator>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        args.apply_to(&mut config);

        display_banner();
        Self::from_config(config, world).await
    }

    /// Creates the application from an already loaded configuration.
    pub async fn from_config(
        config: AppConfig,
        world: Arc<dyn WorldCollaborator>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration validated");

        let storage = Arc::new(JsonFileStorage::open(&config.storage.directory).await?);
        let (notifier, alerts) = CompositeNotifier::from_settings(&config.forensics.notifications);

        let service = Arc::new(ForensicsService::new(
            config.forensics.clone(),
            world,
            storage,
            Arc::new(notifier),
            Arc::new(SystemClock),
        ));
        service.initialize().await;

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        info!(
            "📂 Storage: {} | Tick: {}ms | Retained: {}",
            config.storage.directory,
            config.host.tick_interval_ms,
            config.forensics.recording.max_retained
        );

        Ok(Self {
            config,
            service,
            events_tx,
            events_rx,
            alerts,
            shutdown: ShutdownState::new(),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The service, for operator commands (replay, stop, delete).
    pub fn service(&self) -> Arc<ForensicsService> {
        self.service.clone()
    }

    pub fn event_sender(&self) -> WorldEventSender {
        WorldEventSender {
            sender: self.events_tx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }

    /// Receives admin alerts, when `notifications.admin_alerts` is enabled.
    pub fn subscribe_alerts(&self) -> Option<broadcast::Receiver<RecordingNotice>> {
        self.alerts.as_ref().map(BroadcastNotifier::subscribe)
    }

    /// Handle that stops [`run`](Self::run) from outside, e.g. when the game server stops.
    pub fn shutdown_handle(&self) -> ShutdownState {
        self.shutdown.clone()
    }

    pub fn handles(&self) -> HostHandles {
        HostHandles {
            events: self.event_sender(),
            service: self.service(),
            alerts: self.subscribe_alerts(),
            shutdown: self.shutdown_handle(),
        }
    }

    /// Runs until SIGINT/SIGTERM. A second signal exits immediately.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let state = self.shutdown.clone();
        self.run_until(async move {
            if let Err(e) = wait_for_shutdown_signal(&state).await {
                error!("❌ Failed to listen for shutdown signals: {}", e);
                // Only the shutdown handle can stop the host now.
                std::future::pending::<()>().await;
            }

            tokio::spawn(async {
                if wait_for_signal_silent().await.is_ok() {
                    warn!("⚠️ Second shutdown signal received - exiting without cleanup");
                    std::process::exit(1);
                }
            });
        })
        .await
    }

    /// Runs until `stop` resolves or the shutdown handle is triggered.
    pub async fn run_until<F>(self, stop: F) -> Result<(), Box<dyn std::error::Error>>
    where
        F: Future<Output = ()>,
    {
        info!("🌟 Starting forensics host");
        let Self {
            config,
            service,
            events_tx,
            events_rx,
            shutdown,
            ..
        } = self;

        let period = Duration::from_millis(config.host.tick_interval_ms);
        let tick_task = tokio::spawn(tick_loop(service.clone(), period, shutdown.clone()));
        let pump_task = tokio::spawn(event_pump(service.clone(), events_rx, shutdown.clone()));

        tokio::select! {
            _ = stop => shutdown.initiate_shutdown(),
            _ = shutdown.wait_initiated() => {}
        }
        drop(events_tx);

        match tick_task.await {
            Ok(ticks) => debug!("Tick loop stopped after {} ticks", ticks),
            Err(e) => error!("❌ Tick loop failed: {}", e),
        }
        match pump_task.await {
            Ok(handled) => info!("📊 Handled {} world events", handled),
            Err(e) => error!("❌ Event pump failed: {}", e),
        }

        service.shutdown().await;
        shutdown.complete_shutdown();
        info!(
            "👋 Forensics host stopped ({} recordings archived)",
            service.registry().get_completed().await.len()
        );
        Ok(())
    }
}

async fn tick_loop(service: Arc<ForensicsService>, period: Duration, shutdown: ShutdownState) -> u64 {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                service.tick().await;
                ticks += 1;
            }
            _ = shutdown.wait_initiated() => break,
        }
    }
    ticks
}

async fn event_pump(
    service: Arc<ForensicsService>,
    mut events: mpsc::UnboundedReceiver<WorldEvent>,
    shutdown: ShutdownState,
) -> usize {
    let mut handled = 0;

    loop {
        tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => {
                    service.handle_world_event(&event);
                    handled += 1;
                }
                None => break,
            },
            _ = shutdown.wait_initiated() => break,
        }
    }

    // Events accepted before shutdown are still handled.
    events.close();
    while let Ok(event) = events.try_recv() {
        service.handle_world_event(&event);
        handled += 1;
    }
    handled
}

#[cfg(test)]
mod tests {
    use super::*;
    use xray_forensics::{
        Actor, ActorId, ActorSnapshot, BlockPos, EffectKind, Location, Material, MovementFlags,
        Orientation, Position, RecordingId, StorageCollaborator, ViewerId, ViewerMode, Vitals,
        WorldError,
    };

    /// A world with a single actor standing still.
    #[derive(Debug)]
    struct StillWorld {
        actor: ActorId,
    }

    impl WorldCollaborator for StillWorld {
        fn actor_by_id(&self, id: ActorId) -> Option<Actor> {
            (id == self.actor).then(|| Actor::new(id, "Miner"))
        }

        fn actor_connected(&self, id: ActorId) -> bool {
            id == self.actor
        }

        fn actor_snapshot(&self, id: ActorId) -> Option<ActorSnapshot> {
            (id == self.actor).then(|| ActorSnapshot {
                location: Location::new("world", Position::new(0.5, 12.0, 0.5), Orientation::new(0.0, 45.0)),
                flags: MovementFlags::default(),
                vitals: Vitals::default(),
            })
        }

        fn world_exists(&self, world: &str) -> bool {
            world == "world"
        }

        fn block_material_at(&self, _world: &str, _pos: BlockPos) -> Option<Material> {
            Some(Material::air())
        }

        fn viewer_mode(&self, _viewer: ViewerId) -> Option<ViewerMode> {
            Some(ViewerMode::Survival)
        }

        fn send_visual_block_update(&self, _: ViewerId, _: &str, _: BlockPos, _: &Material) -> Result<(), WorldError> {
            Ok(())
        }

        fn send_break_animation(&self, _: ViewerId, _: &str, _: BlockPos, _: Option<u8>) -> Result<(), WorldError> {
            Ok(())
        }

        fn teleport_viewer(&self, _: ViewerId, _: &Location) -> Result<(), WorldError> {
            Ok(())
        }

        fn set_viewer_mode(&self, _: ViewerId, _: ViewerMode) -> Result<(), WorldError> {
            Ok(())
        }

        fn play_effect(&self, _: ViewerId, _: &str, _: BlockPos, _: &Material, _: EffectKind) -> Result<(), WorldError> {
            Ok(())
        }

        fn send_message(&self, _: ViewerId, _: &str) -> Result<(), WorldError> {
            Ok(())
        }
    }

    fn test_config(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.directory = dir.to_string_lossy().to_string();
        config.host.tick_interval_ms = 5;
        config
    }

    fn diamond(actor: ActorId, x: i32) -> WorldEvent {
        WorldEvent::BlockBroken {
            actor,
            world: "world".to_string(),
            pos: BlockPos::new(x, 12, 0),
            material: Material::new("diamond_ore"),
        }
    }

    #[tokio::test]
    async fn test_events_flow_through_pump_and_shutdown_persists() {
        let dir = tempfile::tempdir().unwrap();
        let actor = ActorId::new();
        let app = Application::from_config(test_config(dir.path()), Arc::new(StillWorld { actor }))
            .await
            .unwrap();

        let sender = app.event_sender();
        let handle = app.shutdown_handle();
        let service = app.service();
        let mut alerts = app.subscribe_alerts().unwrap();

        let driver = async {
            for x in 0..5 {
                assert!(sender.send(diamond(actor, x)));
            }

            let notice = tokio::time::timeout(Duration::from_secs(2), alerts.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(notice, RecordingNotice::RecordingStarted { .. }));
            assert!(service.registry().is_recording(actor));

            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.initiate_shutdown();
        };
        let (result, ()) = tokio::join!(app.run_until(std::future::pending()), driver);
        result.unwrap();

        assert!(handle.is_shutdown_complete());
        assert!(!sender.send(diamond(actor, 9)));
        assert!(!service.registry().is_recording(actor));

        let storage = JsonFileStorage::open(dir.path()).await.unwrap();
        let stored = storage.load(RecordingId(1)).await.unwrap();
        assert_eq!(stored.end_reason.as_deref(), Some("plugin disabled"));
        assert!(stored.frame_count() >= 1);
        assert_eq!(stored.total_block_events(), 1);
    }

    #[tokio::test]
    async fn test_stop_future_ends_run() {
        let dir = tempfile::tempdir().unwrap();
        let app = Application::from_config(test_config(dir.path()), Arc::new(StillWorld { actor: ActorId::new() }))
            .await
            .unwrap();
        let handle = app.shutdown_handle();

        app.run_until(tokio::time::sleep(Duration::from_millis(20)))
            .await
            .unwrap();
        assert!(handle.is_shutdown_initiated());
        assert!(handle.is_shutdown_complete());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.host.tick_interval_ms = 0;
        let result = Application::from_config(config, Arc::new(StillWorld { actor: ActorId::new() })).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_init_hands_out_working_handles() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("xray.toml");
        let storage_dir = dir.path().join("store");
        let args = CliArgs::try_parse_from([
            "xray-host".to_string(),
            "--config".to_string(),
            config_path.to_string_lossy().to_string(),
            "--storage-dir".to_string(),
            storage_dir.to_string_lossy().to_string(),
            "--log-level".to_string(),
            "warn".to_string(),
        ])
        .unwrap();
        let actor = ActorId::new();
        let captured = Arc::new(std::sync::Mutex::new(None));
        let sink = captured.clone();

        crate::init_with_args(args, Arc::new(StillWorld { actor }), move |handles: HostHandles| {
            assert!(handles.alerts.is_some());
            *sink.lock().unwrap() = Some(handles.service.clone());
            let HostHandles { events, shutdown, .. } = handles;
            tokio::spawn(async move {
                for x in 0..5 {
                    events.send(diamond(actor, x));
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
                shutdown.initiate_shutdown();
            });
        })
        .await
        .unwrap();

        let service = captured.lock().unwrap().take().unwrap();
        assert!(config_path.exists());
        assert_eq!(service.registry().get_completed().await.len(), 1);
        let storage = JsonFileStorage::open(&storage_dir).await.unwrap();
        assert!(storage.exists(RecordingId(1)).await);
    }

    #[tokio::test]
    async fn test_new_applies_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("xray.toml");
        let storage_dir = dir.path().join("store");
        let args = CliArgs::try_parse_from([
            "xray-host".to_string(),
            "--config".to_string(),
            config_path.to_string_lossy().to_string(),
            "--storage-dir".to_string(),
            storage_dir.to_string_lossy().to_string(),
            "--log-level".to_string(),
            "debug".to_string(),
        ])
        .unwrap();

        let app = Application::new(args, Arc::new(StillWorld { actor: ActorId::new() }))
            .await
            .unwrap();
        assert!(config_path.exists());
        assert!(storage_dir.is_dir());
        assert_eq!(app.config().logging.level, "debug");
    }
}
