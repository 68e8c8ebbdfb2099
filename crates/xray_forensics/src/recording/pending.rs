//! Per-actor pending-event buffers.
//!
//! A buffer exists exactly while its actor is being recorded: it is opened
//! when the session starts and closed when the session stops. Appends to a
//! closed buffer are rejected, so an event is either drained into a frame of
//! the session that accepted it or refused at the call site, never parked.
//!
//! Every operation holds a single map entry for the duration of a `Vec`
//! push or swap; nothing here waits on the sampling path.

use crate::timeline::BlockEvent;
use crate::types::ActorId;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct PendingEvents {
    buffers: DashMap<ActorId, Vec<BlockEvent>>,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens an empty buffer for `actor`. Returns false if one was already open.
    pub fn open(&self, actor: ActorId) -> bool {
        match self.buffers.entry(actor) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Vec::new());
                true
            }
        }
    }

    pub fn is_open(&self, actor: ActorId) -> bool {
        self.buffers.contains_key(&actor)
    }

    /// Buffers `event` if `actor` has an open buffer.
    pub fn append(&self, actor: ActorId, event: BlockEvent) -> bool {
        match self.buffers.get_mut(&actor) {
            Some(mut events) => {
                events.push(event);
                true
            }
            None => false,
        }
    }

    /// Takes every buffered event for `actor`, leaving the buffer open and empty.
    pub fn drain(&self, actor: ActorId) -> Vec<BlockEvent> {
        self.buffers
            .get_mut(&actor)
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    /// Closes the buffer and returns whatever it still held.
    pub fn close(&self, actor: ActorId) -> Vec<BlockEvent> {
        self.buffers
            .remove(&actor)
            .map(|(_, events)| events)
            .unwrap_or_default()
    }

    pub fn len(&self, actor: ActorId) -> usize {
        self.buffers.get(&actor).map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, actor: ActorId) -> bool {
        self.len(actor) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::BlockEventKind;
    use crate::types::{BlockPos, Material};

    fn place(ts: i64) -> BlockEvent {
        BlockEvent::new(BlockEventKind::Place, ts, "world", BlockPos::new(0, 0, 0), Material::new("stone"))
    }

    #[test]
    fn test_drain_takes_everything_once() {
        let pending = PendingEvents::new();
        let actor = ActorId::new();
        assert!(pending.open(actor));
        pending.append(actor, place(1));
        pending.append(actor, place(2));
        assert_eq!(pending.len(actor), 2);

        let drained = pending.drain(actor);
        assert_eq!(drained.iter().map(|e| e.timestamp).collect::<Vec<_>>(), vec![1, 2]);
        assert!(pending.drain(actor).is_empty());
        assert!(pending.is_open(actor));
    }

    #[test]
    fn test_closed_buffers_reject_appends() {
        let pending = PendingEvents::new();
        let actor = ActorId::new();
        assert!(!pending.append(actor, place(1)));

        pending.open(actor);
        assert!(!pending.open(actor));
        assert!(pending.append(actor, place(2)));
        assert_eq!(pending.close(actor).len(), 1);

        assert!(!pending.append(actor, place(3)));
        assert!(pending.close(actor).is_empty());
        assert!(!pending.is_open(actor));
    }

    #[test]
    fn test_buffers_are_per_actor() {
        let pending = PendingEvents::new();
        let (a, b) = (ActorId::new(), ActorId::new());
        pending.open(a);
        pending.open(b);
        pending.append(a, place(1));
        pending.append(b, place(2));
        assert_eq!(pending.close(a).len(), 1);
        assert_eq!(pending.len(b), 1);
    }
}
