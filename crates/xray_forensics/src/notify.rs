//! Notification sinks.
//!
//! [`TracingNotifier`] writes notices to the log, [`BroadcastNotifier`] fans them
//! out to any number of subscribed operator channels, and [`CompositeNotifier`]
//! forwards to several sinks at once.

use crate::collaborators::{NotificationCollaborator, RecordingNotice};
use crate::config::NotificationSettings;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Logs every notice through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationCollaborator for TracingNotifier {
    fn notify(&self, notice: RecordingNotice) {
        match &notice {
            RecordingNotice::RecordingStarted { actor_name, reason } => {
                warn!(actor = %actor_name, "🚨 Suspicious activity detected, recording started: {}", reason);
            }
            RecordingNotice::RecordingCompleted {
                actor_name,
                recording_id,
                frame_count,
                reason,
            } => {
                info!(
                    actor = %actor_name,
                    recording_id = recording_id.0,
                    frame_count,
                    "📼 Recording completed ({})", reason
                );
            }
        }
    }
}

/// Publishes notices on a tokio broadcast channel.
///
/// Sends never block; with no subscribers the notice is simply dropped.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<RecordingNotice>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RecordingNotice> {
        self.sender.subscribe()
    }
}

impl NotificationCollaborator for BroadcastNotifier {
    fn notify(&self, notice: RecordingNotice) {
        let _ = self.sender.send(notice);
    }
}

/// Forwards each notice to every inner sink.
#[derive(Debug, Default, Clone)]
pub struct CompositeNotifier {
    sinks: Vec<Arc<dyn NotificationCollaborator>>,
}

impl CompositeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationCollaborator>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Builds the sink set selected by `settings`. The returned broadcast
    /// notifier is present when admin alerts are enabled.
    pub fn from_settings(settings: &NotificationSettings) -> (Self, Option<BroadcastNotifier>) {
        let mut composite = Self::new();
        if settings.console_logging {
            composite = composite.with(Arc::new(TracingNotifier));
        }
        let broadcast = settings.admin_alerts.then(|| BroadcastNotifier::new(64));
        if let Some(ref alerts) = broadcast {
            composite = composite.with(Arc::new(alerts.clone()));
        }
        (composite, broadcast)
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationCollaborator for CompositeNotifier {
    fn notify(&self, notice: RecordingNotice) {
        for sink in &self.sinks {
            sink.notify(notice.clone());
        }
    }
}
