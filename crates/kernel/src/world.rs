use std::collections::{BTreeMap, BTreeSet, HashMap};

use cubebatch_common::{ChunkGrid, ChunkIndex, EntityId, Face, FaceMask};
use cubebatch_render::{
    GraphicBinding, GraphicId, RenderBackend, RenderEntity, RenderError, RenderSubsystem,
    WorldView,
};
use glam::{IVec3, Vec3};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    #[error("cell {0} is already occupied")]
    Occupied(IVec3),
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
}

/// An event record produced by every mutation to the world.
///
/// Replaying the log into an empty world with the same grid rebuilds the same
/// blocks, bindings and exposure.
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    Placed {
        id: EntityId,
        cell: IVec3,
        bindings: Vec<GraphicBinding>,
    },
    Removed {
        id: EntityId,
        cell: IVec3,
    },
    Moved {
        id: EntityId,
        from: IVec3,
        to: IVec3,
    },
    Rebound {
        id: EntityId,
        bindings: Vec<GraphicBinding>,
    },
}

/// A unit cube occupying one integer cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub cell: IVec3,
    pub exposed: FaceMask,
    pub bindings: Vec<GraphicBinding>,
}

impl RenderEntity for Block {
    fn position(&self) -> Vec3 {
        self.cell.as_vec3()
    }

    fn exposed_faces(&self) -> FaceMask {
        self.exposed
    }

    fn bindings(&self) -> &[GraphicBinding] {
        &self.bindings
    }
}

/// Reference block world.
///
/// Keeps the graphic -> users reverse index and each block's exposed-face mask
/// up to date on every mutation, and records which entities must be queued
/// and which batch slots must be rebuilt for the next frame.
///
/// Uses BTree collections for deterministic iteration order.
#[derive(Debug, Clone)]
pub struct World {
    grid: ChunkGrid,
    blocks: BTreeMap<EntityId, Block>,
    occupancy: HashMap<IVec3, EntityId>,
    users: BTreeMap<GraphicId, BTreeSet<EntityId>>,
    dirty: BTreeSet<EntityId>,
    invalidated: BTreeSet<(GraphicId, ChunkIndex)>,
    event_log: Vec<WorldEvent>,
}

impl World {
    pub fn new(grid: ChunkGrid) -> Self {
        Self {
            grid,
            blocks: BTreeMap::new(),
            occupancy: HashMap::new(),
            users: BTreeMap::new(),
            dirty: BTreeSet::new(),
            invalidated: BTreeSet::new(),
            event_log: Vec::new(),
        }
    }

    pub fn grid(&self) -> &ChunkGrid {
        &self.grid
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn get(&self, id: EntityId) -> Option<&Block> {
        self.blocks.get(&id)
    }

    pub fn block_at(&self, cell: IVec3) -> Option<EntityId> {
        self.occupancy.get(&cell).copied()
    }

    /// Read-only access to all blocks (deterministic order).
    pub fn blocks(&self) -> &BTreeMap<EntityId, Block> {
        &self.blocks
    }

    pub fn events(&self) -> &[WorldEvent] {
        &self.event_log
    }

    pub fn drain_events(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.event_log)
    }

    pub fn dirty(&self) -> &BTreeSet<EntityId> {
        &self.dirty
    }

    pub fn drain_dirty(&mut self) -> Vec<EntityId> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    pub fn take_invalidations(&mut self) -> Vec<(GraphicId, ChunkIndex)> {
        std::mem::take(&mut self.invalidated).into_iter().collect()
    }

    /// Total exposed faces over all blocks.
    pub fn exposed_face_count(&self) -> usize {
        self.blocks.values().map(|b| b.exposed.count() as usize).sum()
    }

    /// Place a block. Fails if the cell is taken.
    pub fn place(
        &mut self,
        cell: IVec3,
        bindings: Vec<GraphicBinding>,
    ) -> Result<EntityId, WorldError> {
        let id = EntityId::new();
        self.place_with_id(id, cell, bindings)?;
        Ok(id)
    }

    /// Place a block with a specific id (used for replay).
    pub fn place_with_id(
        &mut self,
        id: EntityId,
        cell: IVec3,
        bindings: Vec<GraphicBinding>,
    ) -> Result<(), WorldError> {
        if self.occupancy.contains_key(&cell) {
            return Err(WorldError::Occupied(cell));
        }
        for binding in &bindings {
            self.users.entry(binding.graphic).or_default().insert(id);
        }
        self.occupancy.insert(cell, id);
        self.invalidate_slots(cell, &bindings);
        self.blocks.insert(
            id,
            Block {
                cell,
                exposed: FaceMask::NONE,
                bindings: bindings.clone(),
            },
        );
        self.refresh_exposure(cell);
        self.dirty.insert(id);
        self.event_log.push(WorldEvent::Placed { id, cell, bindings });
        tracing::trace!(entity = %id, %cell, "block placed");
        Ok(())
    }

    /// Place one block per cell of the inclusive box `min..=max`.
    pub fn fill(
        &mut self,
        min: IVec3,
        max: IVec3,
        bindings: &[GraphicBinding],
    ) -> Result<Vec<EntityId>, WorldError> {
        let mut ids = Vec::new();
        for y in min.y..=max.y {
            for z in min.z..=max.z {
                for x in min.x..=max.x {
                    ids.push(self.place(IVec3::new(x, y, z), bindings.to_vec())?);
                }
            }
        }
        tracing::debug!(count = ids.len(), %min, %max, "filled box");
        Ok(ids)
    }

    /// Remove a block, re-exposing its neighbors.
    pub fn remove(&mut self, id: EntityId) -> Result<Block, WorldError> {
        let block = self
            .blocks
            .remove(&id)
            .ok_or(WorldError::UnknownEntity(id))?;
        self.occupancy.remove(&block.cell);
        self.unlink_users(id, &block.bindings);
        self.invalidate_slots(block.cell, &block.bindings);
        self.dirty.remove(&id);
        self.refresh_exposure(block.cell);
        self.event_log.push(WorldEvent::Removed {
            id,
            cell: block.cell,
        });
        Ok(block)
    }

    /// Move a block to an empty cell.
    pub fn move_to(&mut self, id: EntityId, to: IVec3) -> Result<(), WorldError> {
        let from = self.get(id).ok_or(WorldError::UnknownEntity(id))?.cell;
        if from == to {
            return Ok(());
        }
        if self.occupancy.contains_key(&to) {
            return Err(WorldError::Occupied(to));
        }
        let bindings = self.blocks[&id].bindings.clone();
        self.invalidate_slots(from, &bindings);

        self.occupancy.remove(&from);
        self.occupancy.insert(to, id);
        if let Some(block) = self.blocks.get_mut(&id) {
            block.cell = to;
        }
        self.invalidate_slots(to, &bindings);
        self.refresh_exposure(from);
        self.refresh_exposure(to);
        self.dirty.insert(id);
        self.event_log.push(WorldEvent::Moved { id, from, to });
        Ok(())
    }

    /// Replace a block's graphic bindings.
    pub fn set_bindings(
        &mut self,
        id: EntityId,
        bindings: Vec<GraphicBinding>,
    ) -> Result<(), WorldError> {
        let block = self.blocks.get(&id).ok_or(WorldError::UnknownEntity(id))?;
        let (cell, old) = (block.cell, block.bindings.clone());

        self.unlink_users(id, &old);
        self.invalidate_slots(cell, &old);
        self.invalidate_slots(cell, &bindings);
        for binding in &bindings {
            self.users.entry(binding.graphic).or_default().insert(id);
        }
        if let Some(block) = self.blocks.get_mut(&id) {
            block.bindings = bindings.clone();
        }
        self.dirty.insert(id);
        self.event_log.push(WorldEvent::Rebound { id, bindings });
        Ok(())
    }

    /// Queue dirty blocks and forward slot invalidations to `render`.
    /// Returns the number of entities enqueued.
    ///
    /// Every slot a block's bindings touch is invalidated on mutation, so a
    /// block swept into one graphic's slot by a neighbor still gets its other
    /// slots rebuilt. On error, invalidations not yet forwarded and the dirty
    /// set stay pending.
    pub fn submit_changes<B: RenderBackend>(
        &mut self,
        render: &mut RenderSubsystem<B>,
    ) -> Result<usize, RenderError> {
        let pending: Vec<(GraphicId, ChunkIndex)> = self.invalidated.iter().copied().collect();
        for slot in pending {
            render.invalidate(slot.0, slot.1)?;
            self.invalidated.remove(&slot);
        }
        let dirty = self.drain_dirty();
        for id in &dirty {
            render.enqueue(*id);
        }
        Ok(dirty.len())
    }

    /// Rebuild a world from its event log.
    pub fn replay(grid: ChunkGrid, events: &[WorldEvent]) -> Result<Self, WorldError> {
        let mut world = Self::new(grid);
        for event in events {
            match event {
                WorldEvent::Placed { id, cell, bindings } => {
                    world.place_with_id(*id, *cell, bindings.clone())?;
                }
                WorldEvent::Removed { id, .. } => {
                    world.remove(*id)?;
                }
                WorldEvent::Moved { id, to, .. } => world.move_to(*id, *to)?,
                WorldEvent::Rebound { id, bindings } => {
                    world.set_bindings(*id, bindings.clone())?;
                }
            }
        }
        Ok(world)
    }

    fn unlink_users(&mut self, id: EntityId, bindings: &[GraphicBinding]) {
        for binding in bindings {
            if let Some(users) = self.users.get_mut(&binding.graphic) {
                users.remove(&id);
                if users.is_empty() {
                    self.users.remove(&binding.graphic);
                }
            }
        }
    }

    fn invalidate_slots(&mut self, cell: IVec3, bindings: &[GraphicBinding]) {
        let chunk = self.grid.chunk_index_of(cell.as_vec3());
        for binding in bindings {
            self.invalidated.insert((binding.graphic, chunk));
        }
    }

    fn exposure_at(&self, cell: IVec3) -> FaceMask {
        Face::ALL
            .into_iter()
            .filter(|face| !self.occupancy.contains_key(&(cell + face.offset())))
            .collect()
    }

    /// Recompute the mask of the block at `cell` and of its six neighbors.
    /// Blocks whose mask changes become dirty.
    fn refresh_exposure(&mut self, cell: IVec3) {
        let cells = std::iter::once(cell).chain(Face::ALL.into_iter().map(|f| cell + f.offset()));
        for c in cells {
            let Some(id) = self.occupancy.get(&c).copied() else {
                continue;
            };
            let mask = self.exposure_at(c);
            if let Some(block) = self.blocks.get_mut(&id) {
                if block.exposed != mask {
                    block.exposed = mask;
                    self.dirty.insert(id);
                }
            }
        }
    }
}

impl WorldView for World {
    fn chunk_index_of(&self, position: Vec3) -> ChunkIndex {
        self.grid.chunk_index_of(position)
    }

    fn users_of(&self, graphic: GraphicId) -> Vec<EntityId> {
        self.users
            .get(&graphic)
            .map(|users| users.iter().copied().collect())
            .unwrap_or_default()
    }

    fn entity(&self, id: EntityId) -> Option<&dyn RenderEntity> {
        self.blocks.get(&id).map(|b| b as &dyn RenderEntity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cubebatch_assets::{DecodedImage, MemoryDecoder};
    use cubebatch_common::FaceTiles;
    use cubebatch_render::{BehaviorKey, BindingRole, RecordingBackend, RenderConfig};
    use uuid::Uuid;

    fn grid() -> ChunkGrid {
        ChunkGrid::cubic(4, 16.0).unwrap()
    }

    fn stone(id: GraphicId) -> Vec<GraphicBinding> {
        vec![GraphicBinding::surface(id, FaceTiles::column(0, 1, 2))]
    }

    fn render() -> (RenderSubsystem<RecordingBackend>, GraphicId) {
        let mut decoder = MemoryDecoder::new();
        decoder.insert(
            "stone.png",
            DecodedImage::from_argb(64, 64, false, vec![255; 64 * 64 * 4]).unwrap(),
        );
        let config = RenderConfig {
            grid: grid(),
            ..RenderConfig::default()
        };
        let mut rs =
            RenderSubsystem::new(config, RecordingBackend::new(), Box::new(decoder)).unwrap();
        let id = rs
            .register_image_resource("stone.png", BehaviorKey::Texture)
            .unwrap();
        (rs, id)
    }

    fn stored_quads(rs: &RenderSubsystem<RecordingBackend>, g: GraphicId, chunk: usize) -> usize {
        let handle = rs.cache().handle(g, ChunkIndex(chunk)).unwrap();
        rs.backend().batch(handle).unwrap().len()
    }

    #[test]
    fn lone_block_is_fully_exposed() {
        let mut w = World::new(grid());
        let id = w.place(IVec3::ZERO, stone(GraphicId(0))).unwrap();
        assert_eq!(w.get(id).unwrap().exposed, FaceMask::ALL);
        assert_eq!(w.users_of(GraphicId(0)), vec![id]);
    }

    #[test]
    fn neighbors_hide_shared_faces() {
        let mut w = World::new(grid());
        let a = w.place(IVec3::ZERO, stone(GraphicId(0))).unwrap();
        let b = w.place(IVec3::X, stone(GraphicId(0))).unwrap();
        assert!(!w.get(a).unwrap().exposed.contains(Face::Right));
        assert!(!w.get(b).unwrap().exposed.contains(Face::Left));
        assert_eq!(w.exposed_face_count(), 10);
    }

    #[test]
    fn occupied_cell_is_rejected() {
        let mut w = World::new(grid());
        w.place(IVec3::ZERO, stone(GraphicId(0))).unwrap();
        assert_eq!(
            w.place(IVec3::ZERO, stone(GraphicId(0))),
            Err(WorldError::Occupied(IVec3::ZERO))
        );
    }

    #[test]
    fn remove_reexposes_and_invalidates() {
        let mut w = World::new(grid());
        let a = w.place(IVec3::ZERO, stone(GraphicId(0))).unwrap();
        let b = w.place(IVec3::Y, stone(GraphicId(0))).unwrap();
        w.drain_dirty();
        w.take_invalidations();

        w.remove(b).unwrap();
        assert_eq!(w.get(a).unwrap().exposed, FaceMask::ALL);
        assert_eq!(w.drain_dirty(), vec![a]);
        assert_eq!(w.take_invalidations(), vec![(GraphicId(0), ChunkIndex(0))]);
        assert_eq!(w.users_of(GraphicId(0)), vec![a]);
        assert_eq!(w.remove(b), Err(WorldError::UnknownEntity(b)));
    }

    #[test]
    fn rebinding_updates_reverse_index() {
        let mut w = World::new(grid());
        let a = w.place(IVec3::ZERO, stone(GraphicId(0))).unwrap();
        w.set_bindings(a, stone(GraphicId(1))).unwrap();
        assert!(w.users_of(GraphicId(0)).is_empty());
        assert_eq!(w.users_of(GraphicId(1)), vec![a]);
        assert!(w.take_invalidations().contains(&(GraphicId(0), ChunkIndex(0))));
    }

    #[test]
    fn slab_renders_only_exposed_faces() {
        let (mut rs, g) = render();
        let mut w = World::new(grid());
        let ids = w
            .fill(IVec3::ZERO, IVec3::new(2, 0, 2), &stone(g))
            .unwrap();
        assert_eq!(ids.len(), 9);
        assert_eq!(w.exposed_face_count(), 30);

        assert_eq!(w.submit_changes(&mut rs).unwrap(), 9);
        let stats = rs.run_frame(&w).unwrap();
        assert_eq!(stats.slots_recorded, 1);
        assert_eq!(stats.quads_emitted, 30);
        assert_eq!(stored_quads(&rs, g, 0), 30);

        // Removing the center opens four side faces and drops its top and bottom.
        w.remove(ids[4]).unwrap();
        w.submit_changes(&mut rs).unwrap();
        rs.run_frame(&w).unwrap();
        assert_eq!(stored_quads(&rs, g, 0), 32);
    }

    #[test]
    fn removing_last_block_empties_its_slot() {
        let (mut rs, g) = render();
        let mut w = World::new(grid());
        let id = w.place(IVec3::new(20, 0, 0), stone(g)).unwrap();
        w.submit_changes(&mut rs).unwrap();
        rs.run_frame(&w).unwrap();
        assert_eq!(stored_quads(&rs, g, 1), 6);

        // Nothing is left to enqueue; the invalidation alone clears the slot.
        w.remove(id).unwrap();
        assert_eq!(w.submit_changes(&mut rs).unwrap(), 0);
        rs.run_frame(&w).unwrap();
        assert_eq!(stored_quads(&rs, g, 1), 0);
    }

    #[test]
    fn moving_across_chunks_rebuilds_both() {
        let (mut rs, g) = render();
        let mut w = World::new(grid());
        let id = w.place(IVec3::ZERO, stone(g)).unwrap();
        w.submit_changes(&mut rs).unwrap();
        rs.run_frame(&w).unwrap();

        w.move_to(id, IVec3::new(0, 16, 0)).unwrap();
        w.submit_changes(&mut rs).unwrap();
        rs.run_frame(&w).unwrap();
        assert_eq!(stored_quads(&rs, g, 0), 0);
        assert_eq!(stored_quads(&rs, g, 16), 6);
    }

    #[test]
    fn placing_invalidates_every_bound_slot() {
        let mut w = World::new(grid());
        let bindings = vec![
            GraphicBinding::surface(GraphicId(0), FaceTiles::uniform(0)),
            GraphicBinding::new(GraphicId(1), BindingRole::Marker, FaceTiles::uniform(0)),
        ];
        let id = w.place(IVec3::new(20, 0, 0), bindings).unwrap();
        assert_eq!(
            w.take_invalidations(),
            vec![(GraphicId(0), ChunkIndex(1)), (GraphicId(1), ChunkIndex(1))]
        );

        w.move_to(id, IVec3::ZERO).unwrap();
        assert_eq!(w.take_invalidations().len(), 4);

        w.set_bindings(id, stone(GraphicId(2))).unwrap();
        assert!(w.take_invalidations().contains(&(GraphicId(2), ChunkIndex(0))));
    }

    #[test]
    fn swept_block_still_rebuilds_its_other_graphic() {
        let (mut rs, g) = render();
        let overlay = rs.register_procedural_resource(BehaviorKey::Overlay).unwrap();
        let mut w = World::new(grid());

        let first = EntityId(Uuid::from_u128(1));
        w.place_with_id(first, IVec3::ZERO, stone(g)).unwrap();
        w.submit_changes(&mut rs).unwrap();
        rs.run_frame(&w).unwrap();

        // `first` sorts ahead, becomes dirty through exposure, and sweeps
        // `second` into the seen set while rebuilding the stone slot.
        let second = EntityId(Uuid::from_u128(2));
        let mut bindings = stone(g);
        bindings.push(GraphicBinding::new(
            overlay,
            BindingRole::Marker,
            FaceTiles::uniform(0),
        ));
        w.place_with_id(second, IVec3::X, bindings).unwrap();
        assert_eq!(w.submit_changes(&mut rs).unwrap(), 2);
        let stats = rs.run_frame(&w).unwrap();

        assert_eq!(stats.queued_skipped_seen, 1);
        assert_eq!(stored_quads(&rs, g, 0), 10);
        assert_eq!(stored_quads(&rs, overlay, 0), 5);
    }

    #[test]
    fn failed_submit_keeps_pending_invalidations() {
        let (mut rs, g) = render();
        // Larger than the render grid, so far chunks have no slot.
        let mut w = World::new(ChunkGrid::cubic(8, 16.0).unwrap());
        w.place(IVec3::ZERO, stone(g)).unwrap();
        w.place(IVec3::new(0, 100, 0), stone(g)).unwrap();
        w.place(IVec3::new(0, 100, 16), stone(g)).unwrap();

        let err = w.submit_changes(&mut rs).unwrap_err();
        assert!(matches!(
            err,
            RenderError::MissingBatchSlot { chunk: ChunkIndex(384), .. }
        ));
        assert_eq!(
            w.take_invalidations(),
            vec![(g, ChunkIndex(384)), (g, ChunkIndex(392))]
        );
        assert_eq!(w.dirty().len(), 3);
    }

    #[test]
    fn replay_reconstructs_state() {
        let mut w = World::new(grid());
        let a = w.place(IVec3::ZERO, stone(GraphicId(0))).unwrap();
        let b = w.place(IVec3::X, stone(GraphicId(0))).unwrap();
        w.move_to(b, IVec3::new(5, 0, 0)).unwrap();
        w.set_bindings(a, stone(GraphicId(2))).unwrap();
        let c = w.place(IVec3::Z, stone(GraphicId(0))).unwrap();
        w.remove(c).unwrap();

        let replayed = World::replay(grid(), w.events()).unwrap();
        assert_eq!(replayed.blocks(), w.blocks());
        assert_eq!(replayed.users_of(GraphicId(2)), vec![a]);
    }
}
