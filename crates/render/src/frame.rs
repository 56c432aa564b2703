use std::collections::{BTreeSet, HashSet};

use cubebatch_common::{ChunkIndex, EntityId};

use crate::graphic::GraphicId;

/// Phase of the frame state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Clearing,
    Recording,
    Replaying,
    Resetting,
}

/// Counters gathered while running one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Batch slots re-recorded.
    pub slots_recorded: usize,
    /// Rebuilds avoided because the slot was already recorded this frame.
    pub slots_skipped: usize,
    /// Entities drawn into some batch, queued or swept in.
    pub entities_swept: usize,
    /// Queued entities skipped because an earlier rebuild already drew them.
    pub queued_skipped_seen: usize,
    pub quads_emitted: usize,
    pub batches_replayed: usize,
    /// Ids returned by the reverse index that the world could not resolve.
    pub missing_entities: usize,
}

/// Per-frame collections. Emptied in the `Resetting` phase.
#[derive(Debug, Default)]
pub struct FrameState {
    pub(crate) queue: HashSet<EntityId>,
    pub(crate) seen: HashSet<EntityId>,
    pub(crate) invalidated: BTreeSet<(GraphicId, ChunkIndex)>,
    pub(crate) phase: FramePhase,
}

impl FrameState {
    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queued(&self, id: EntityId) -> bool {
        self.queue.contains(&id)
    }

    pub fn seen(&self) -> &HashSet<EntityId> {
        &self.seen
    }

    pub(crate) fn enter(&mut self, phase: FramePhase) {
        tracing::trace!(from = ?self.phase, to = ?phase, "frame phase");
        self.phase = phase;
    }

    /// Clear the queue and the seen set; forced invalidations are consumed too.
    pub(crate) fn reset(&mut self) {
        self.enter(FramePhase::Resetting);
        self.queue.clear();
        self.seen.clear();
        self.invalidated.clear();
        self.phase = FramePhase::Clearing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_empties_frame_collections() {
        let mut state = FrameState::default();
        let id = EntityId::new();
        state.queue.insert(id);
        state.seen.insert(id);
        state.invalidated.insert((GraphicId(0), ChunkIndex(1)));
        state.enter(FramePhase::Replaying);

        state.reset();
        assert_eq!(state.queue_len(), 0);
        assert!(state.seen().is_empty());
        assert!(state.invalidated.is_empty());
        assert_eq!(state.phase(), FramePhase::Clearing);
    }
}
