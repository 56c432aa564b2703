//! Capabilities the render core consumes from the world collaborator.

use cubebatch_common::{ChunkIndex, EntityId, FaceMask, FaceTiles};
use glam::Vec3;

use crate::backend::QuadSink;
use crate::graphic::GraphicId;
use crate::mesher::{self, AtlasLayout};

/// What a binding contributes to an entity's look.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingRole {
    Surface,
    Overlay,
    Marker,
}

/// An entity's use of one graphic, with one atlas tile per face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicBinding {
    pub graphic: GraphicId,
    pub role: BindingRole,
    pub tiles: FaceTiles,
}

impl GraphicBinding {
    pub fn new(graphic: GraphicId, role: BindingRole, tiles: FaceTiles) -> Self {
        Self {
            graphic,
            role,
            tiles,
        }
    }

    pub fn surface(graphic: GraphicId, tiles: FaceTiles) -> Self {
        Self::new(graphic, BindingRole::Surface, tiles)
    }
}

/// A drawable cube entity.
pub trait RenderEntity {
    /// Cube origin in world units.
    fn position(&self) -> Vec3;

    fn exposed_faces(&self) -> FaceMask;

    fn bindings(&self) -> &[GraphicBinding];

    /// Emit this entity's geometry for `binding`. Returns the quad count.
    fn draw(
        &self,
        binding: &GraphicBinding,
        atlas: Option<&AtlasLayout>,
        sink: &mut dyn QuadSink,
    ) -> usize {
        mesher::emit_box(
            sink,
            atlas,
            self.position(),
            self.exposed_faces(),
            &binding.tiles,
        )
    }
}

/// Read-only view of the world for one frame.
pub trait WorldView {
    /// Deterministic chunk of a position, always in `[0, chunk_count)`.
    fn chunk_index_of(&self, position: Vec3) -> ChunkIndex;

    /// Every entity currently bound to `graphic`, queued or not.
    fn users_of(&self, graphic: GraphicId) -> Vec<EntityId>;

    fn entity(&self, id: EntityId) -> Option<&dyn RenderEntity>;
}
