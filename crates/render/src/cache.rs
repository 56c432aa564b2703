use std::collections::HashMap;

use cubebatch_common::ChunkIndex;

use crate::backend::{BackendError, BatchHandle, RenderBackend};
use crate::error::RenderError;
use crate::graphic::GraphicId;

/// Occupancy of a batch slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Allocated, never recorded. Replays as an empty batch.
    Unrecorded,
    /// Re-recorded during the current frame.
    RecordedThisFrame,
    /// Recorded in an earlier frame and still replayed verbatim.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct BatchSlot {
    handle: BatchHandle,
    state: SlotState,
}

/// Per-graphic, per-chunk compiled batches.
///
/// Every registered graphic owns exactly `chunk_count` slots. Handles are
/// allocated once and reused for the process lifetime; re-recording a slot
/// overwrites its content in place.
#[derive(Debug)]
pub struct BatchCache {
    chunk_count: usize,
    slots: HashMap<GraphicId, Vec<BatchSlot>>,
    open: Option<(GraphicId, ChunkIndex)>,
}

impl BatchCache {
    pub fn new(chunk_count: usize) -> Self {
        Self {
            chunk_count,
            slots: HashMap::new(),
            open: None,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Allocate the slot array of a newly registered graphic. A graphic that
    /// already owns slots keeps them.
    pub fn allocate(
        &mut self,
        graphic: GraphicId,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), BackendError> {
        if self.slots.contains_key(&graphic) {
            return Ok(());
        }
        let handles = backend.allocate_batches(self.chunk_count)?;
        let slots = handles
            .into_iter()
            .map(|handle| BatchSlot {
                handle,
                state: SlotState::Unrecorded,
            })
            .collect();
        self.slots.insert(graphic, slots);
        tracing::debug!(%graphic, chunks = self.chunk_count, "allocated batch slots");
        Ok(())
    }

    pub fn contains(&self, graphic: GraphicId) -> bool {
        self.slots.contains_key(&graphic)
    }

    pub fn slot_count(&self, graphic: GraphicId) -> usize {
        self.slots.get(&graphic).map_or(0, Vec::len)
    }

    pub fn handle(&self, graphic: GraphicId, chunk: ChunkIndex) -> Option<BatchHandle> {
        self.slot(graphic, chunk).map(|s| s.handle)
    }

    pub fn state(&self, graphic: GraphicId, chunk: ChunkIndex) -> Option<SlotState> {
        self.slot(graphic, chunk).map(|s| s.state)
    }

    pub fn is_recorded_this_frame(&self, graphic: GraphicId, chunk: ChunkIndex) -> bool {
        self.state(graphic, chunk) == Some(SlotState::RecordedThisFrame)
    }

    /// The slot currently open for recording.
    pub fn open_slot(&self) -> Option<(GraphicId, ChunkIndex)> {
        self.open
    }

    fn slot(&self, graphic: GraphicId, chunk: ChunkIndex) -> Option<&BatchSlot> {
        self.slots.get(&graphic).and_then(|s| s.get(chunk.get()))
    }

    /// Open the slot for `(graphic, chunk)`; backend drawing goes into it
    /// until [`end_recording`](Self::end_recording).
    pub fn begin_recording(
        &mut self,
        graphic: GraphicId,
        chunk: ChunkIndex,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), RenderError> {
        if let Some((open_graphic, open_chunk)) = self.open {
            return Err(RenderError::RecordingAlreadyOpen {
                graphic,
                chunk,
                open_graphic,
                open_chunk,
            });
        }
        let handle = self
            .handle(graphic, chunk)
            .ok_or(RenderError::MissingBatchSlot { graphic, chunk })?;
        backend
            .begin_batch(handle)
            .map_err(|source| RenderError::Batch { handle, source })?;
        self.open = Some((graphic, chunk));
        tracing::trace!(%graphic, %chunk, "recording batch");
        Ok(())
    }

    /// Close and commit the open slot.
    pub fn end_recording(
        &mut self,
        backend: &mut dyn RenderBackend,
    ) -> Result<(GraphicId, ChunkIndex), RenderError> {
        let (graphic, chunk) = self.open.ok_or(RenderError::NoOpenRecording)?;
        let slot = self
            .slots
            .get_mut(&graphic)
            .and_then(|s| s.get_mut(chunk.get()))
            .ok_or(RenderError::MissingBatchSlot { graphic, chunk })?;
        let handle = slot.handle;
        self.open = None;
        backend
            .end_batch()
            .map_err(|source| RenderError::Batch { handle, source })?;
        slot.state = SlotState::RecordedThisFrame;
        Ok((graphic, chunk))
    }

    /// Drop an open recording; the slot keeps its previous content.
    pub fn abort_recording(&mut self, backend: &mut dyn RenderBackend) {
        if let Some((graphic, chunk)) = self.open.take() {
            tracing::warn!(%graphic, %chunk, "aborting open batch recording");
            backend.abort_batch();
        }
    }

    /// Replay every slot of `graphic` in chunk-index order. Returns the number
    /// of batches issued.
    pub fn replay_all(
        &self,
        graphic: GraphicId,
        backend: &mut dyn RenderBackend,
    ) -> Result<usize, RenderError> {
        let slots = self.slots.get(&graphic).ok_or(RenderError::MissingBatchSlot {
            graphic,
            chunk: ChunkIndex(0),
        })?;
        for slot in slots {
            backend
                .call_batch(slot.handle)
                .map_err(|source| RenderError::Batch {
                    handle: slot.handle,
                    source,
                })?;
        }
        Ok(slots.len())
    }

    /// Slots recorded this frame become stale-but-valid.
    pub fn finish_frame(&mut self) {
        for slot in self.slots.values_mut().flatten() {
            if slot.state == SlotState::RecordedThisFrame {
                slot.state = SlotState::Stale;
            }
        }
    }
}
