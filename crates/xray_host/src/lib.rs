//! # X-Ray Forensics Host
//!
//! Runs the forensics service inside a game server process: configuration
//! loading, logging, the tick loop, the world-event pump and graceful
//! shutdown. The game supplies its [`WorldCollaborator`] and forwards world
//! notifications through [`WorldEventSender`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xray_forensics::WorldCollaborator;
//! use xray_host::HostHandles;
//!
//! async fn start(world: Arc<dyn WorldCollaborator>) -> Result<(), Box<dyn std::error::Error>> {
//!     // Parses --config/--log-level/--json-logs/--storage-dir and runs until SIGINT/SIGTERM.
//!     xray_host::init(world, |handles: HostHandles| {
//!         // Keep `handles.events` for the game's listeners and
//!         // `handles.service` for operator commands.
//!         drop(handles);
//!     })
//!     .await
//! }
//! ```
//!
//! ## Configuration
//!
//! The host loads a TOML file (default: `xray.toml`). If the file doesn't
//! exist, a default configuration is written there first.
//!
//! ## Archive CLI
//!
//! The `xray-archive` binary inspects a recording directory offline:
//!
//! ```bash
//! xray-archive --dir recordings list
//! xray-archive show 12
//! xray-archive prune --keep 20
//! ```

use std::sync::Arc;
use tracing::{error, info};
use xray_forensics::WorldCollaborator;

pub mod app;
pub mod archive;
pub mod cli;
pub mod config;
pub mod logging;
pub mod shutdown;
pub mod signals;

pub use app::{Application, HostHandles, WorldEventSender};
pub use cli::CliArgs;
pub use config::{AppConfig, HostSettings, LoggingSettings, StorageSettings};
pub use shutdown::ShutdownState;

/// Parses CLI arguments, sets up logging and runs the host until a shutdown signal.
///
/// `setup` receives the host's handles once the service is ready and before
/// the tick loop starts. Call this from inside the game server's tokio runtime.
pub async fn init<F>(world: Arc<dyn WorldCollaborator>, setup: F) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(HostHandles),
{
    init_with_args(CliArgs::parse(), world, setup).await
}

/// [`init`] with explicit arguments.
pub async fn init_with_args<F>(
    args: CliArgs,
    world: Arc<dyn WorldCollaborator>,
    setup: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(HostHandles),
{
    let mut config = match AppConfig::load_from_file(&args.config_path).await {
        Ok(config) => config,
        Err(e) => {
            // Log with defaults so the failure is visible.
            let mut fallback = AppConfig::default();
            args.apply_to(&mut fallback);
            logging::setup_logging(&fallback.logging, args.json_logs)?;
            error!("❌ Failed to load configuration from {}: {e}", args.config_path.display());
            return Err(e);
        }
    };
    args.apply_to(&mut config);

    logging::setup_logging(&config.logging, args.json_logs)?;
    info!("🔧 Configuration loaded from: {}", args.config_path.display());
    logging::display_banner();

    let app = match Application::from_config(config, world).await {
        Ok(app) => app,
        Err(e) => {
            error!("❌ Failed to start forensics host: {e}");
            return Err(e);
        }
    };
    setup(app.handles());

    if let Err(e) = app.run().await {
        error!("❌ Forensics host error: {e}");
        return Err(e);
    }
    Ok(())
}
