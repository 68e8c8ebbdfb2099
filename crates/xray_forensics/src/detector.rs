//! Suspicion heuristic.
//!
//! Counts consecutive resource breaks per actor and category. Counts reset when
//! the gap since the actor's previous break exceeds the configured window; a
//! category reaching its threshold produces a [`SuspicionTrigger`] unless the
//! actor is already being recorded, and clears all of that actor's counts.

use crate::clock::Clock;
use crate::config::DetectorSettings;
use crate::types::{ActorId, Material};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Answers whether an actor already has an active recording.
pub trait RecordingProbe {
    fn is_recording(&self, actor: ActorId) -> bool;
}

/// Threshold crossing that should start a recording.
#[derive(Debug, Clone, PartialEq)]
pub struct SuspicionTrigger {
    pub actor: ActorId,
    pub category: String,
    pub count: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
struct SuspicionCounter {
    counts: HashMap<String, u32>,
    last_break: i64,
}

/// Per-actor sliding break counters.
#[derive(Debug)]
pub struct SuspicionDetector {
    settings: DetectorSettings,
    counters: DashMap<ActorId, SuspicionCounter>,
    clock: Arc<dyn Clock>,
}

impl SuspicionDetector {
    pub fn new(settings: DetectorSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            counters: DashMap::new(),
            clock,
        }
    }

    /// Maps a broken material to its watched category name.
    pub fn classify(&self, material: &Material) -> Option<&str> {
        self.settings
            .categories
            .iter()
            .find(|category| category.contains(material))
            .map(|category| category.name.as_str())
    }

    fn threshold(&self, category: &str) -> Option<u32> {
        self.settings
            .categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.threshold)
    }

    /// Registers one break of `category` by `actor`.
    ///
    /// The counter entry stays locked for the whole update, so concurrent breaks
    /// by the same actor are serialized and at most one of them triggers.
    pub fn on_resource_break(
        &self,
        actor: ActorId,
        category: &str,
        probe: &dyn RecordingProbe,
    ) -> Option<SuspicionTrigger> {
        if !self.settings.enabled {
            return None;
        }
        let threshold = self.threshold(category)?;
        let now = self.clock.now_millis();
        let window = (self.settings.reset_window_secs as i64).saturating_mul(1000);

        let mut counter = self.counters.entry(actor).or_default();
        if !counter.counts.is_empty() && now - counter.last_break > window {
            debug!(actor = %actor, "🔄 Break streak expired, resetting counters");
            counter.counts.clear();
        }

        let count = {
            let entry = counter.counts.entry(category.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        counter.last_break = now;

        if count < threshold || probe.is_recording(actor) {
            return None;
        }

        counter.counts.clear();
        let reason = format!("Broke {count} {category} in a row");
        info!(actor = %actor, category, count, "🔍 Suspicion threshold reached");
        Some(SuspicionTrigger {
            actor,
            category: category.to_string(),
            count,
            reason,
        })
    }

    /// Drops all state for an actor (on disconnect).
    pub fn forget(&self, actor: ActorId) {
        self.counters.remove(&actor);
    }

    /// Current count for one category.
    pub fn count(&self, actor: ActorId, category: &str) -> u32 {
        self.counters
            .get(&actor)
            .and_then(|counter| counter.counts.get(category).copied())
            .unwrap_or(0)
    }

    pub fn tracked_actors(&self) -> usize {
        self.counters.len()
    }
}
