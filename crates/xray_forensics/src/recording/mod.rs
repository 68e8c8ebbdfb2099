//! # Recording
//!
//! Active sessions, their pending-event buffers and the bounded archive of
//! completed timelines.
//!
//! ## Lifecycle
//!
//! 1. [`RecordingRegistry::start_recording`] creates a session (at most one per actor).
//! 2. World mutations by that actor go into [`PendingEvents`] via
//!    [`RecordingRegistry::record_block_event`].
//! 3. [`RecordingRegistry::tick`] samples every active session on its interval.
//! 4. [`RecordingRegistry::stop_recording`] finalizes the timeline, archives it,
//!    persists it and notifies admins.

pub mod pending;
pub mod registry;
pub mod session;

pub use pending::PendingEvents;
pub use registry::{ActiveRecording, RecordingRegistry};
pub use session::{RecordingSession, TickOutcome};

/// Reasons stamped on completed timelines.
pub mod end_reason {
    pub const DISCONNECTED: &str = "disconnected";
    pub const TIMED_OUT: &str = "timed out";
    pub const PLUGIN_DISABLED: &str = "plugin disabled";
    pub const OPERATOR: &str = "stopped by operator";
}
