//! # X-Ray Forensics
//!
//! Detection, recording and non-destructive replay of suspicious resource
//! extraction in a multiplayer voxel world.
//!
//! ## Core Features
//!
//! - **Suspicion detection**: per-actor sliding break counters per resource category
//! - **Recording**: bounded, tick-sampled timelines of movement and block events
//! - **Archive**: newest-first, capacity-bounded, persisted through a storage collaborator
//! - **Replay**: viewer-local reconstruction with a block overlay, in discrete or
//!   smoothed playback
//!
//! ## Architecture Overview
//!
//! ```text
//! WorldEvent ─▶ SuspicionDetector ─▶ RecordingRegistry.start
//!     │                                   │
//!     └──────▶ PendingEvents ◀── tick ── RecordingSession ─▶ Timeline ─▶ archive + storage
//!                                                                  │
//!                              operator ─▶ ReplayEngine.start ◀────┘
//! ```
//!
//! The host supplies three collaborators ([`WorldCollaborator`],
//! [`StorageCollaborator`], [`NotificationCollaborator`]), forwards world
//! notifications to [`ForensicsService::handle_world_event`] and calls
//! [`ForensicsService::tick`] once per scheduler tick.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use xray_forensics::*;
//!
//! async fn run(world: Arc<dyn WorldCollaborator>) -> Result<(), Box<dyn std::error::Error>> {
//!     let storage = Arc::new(JsonFileStorage::open("recordings").await?);
//!     let service = ForensicsService::new(
//!         ForensicsConfig::default(),
//!         world,
//!         storage,
//!         Arc::new(TracingNotifier),
//!         Arc::new(SystemClock),
//!     );
//!     service.initialize().await;
//!
//!     loop {
//!         service.tick().await;
//!         tokio::time::sleep(std::time::Duration::from_millis(50)).await;
//!     }
//! }
//! ```

#[cfg(test)]
mod test_integration;
#[cfg(test)]
pub(crate) mod test_support;

pub mod clock;
pub mod collaborators;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod notify;
pub mod recording;
pub mod replay;
pub mod service;
pub mod storage;
pub mod timeline;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{
    NotificationCollaborator, RecordingNotice, StorageCollaborator, WorldCollaborator,
};
pub use config::{
    CategorySettings, DetectorSettings, ForensicsConfig, NotificationSettings, RecordingSettings,
    ReplaySettings,
};
pub use detector::{RecordingProbe, SuspicionDetector, SuspicionTrigger};
pub use error::{ForensicsError, StorageError, WorldError};
pub use events::WorldEvent;
pub use notify::{BroadcastNotifier, CompositeNotifier, TracingNotifier};
pub use recording::{end_reason, ActiveRecording, RecordingRegistry};
pub use replay::{ReplayEngine, ReplayProgress, ReplayStart, ReplayVariant};
pub use service::ForensicsService;
pub use storage::JsonFileStorage;
pub use timeline::{
    BlockEvent, BlockEventKind, Frame, FrameActivity, RecordingId, RecordingIdAllocator, Timeline,
};
pub use types::*;

pub use async_trait::async_trait;
