//! Cube face mesher.
//!
//! Emits one quad per exposed face of a unit cube. Texture coordinates come
//! from a square atlas split into `tiles_per_row` cells per side; each cell's
//! UV rectangle is pulled in by one texel so nearest sampling never reads the
//! neighboring tile.

use cubebatch_common::{Face, FaceMask, FaceTiles};
use glam::{Vec2, Vec3};

use crate::backend::{Quad, QuadSink};

/// Tile layout of a square texture atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    atlas_width: u32,
    tile_size: u32,
    tiles_per_row: u32,
}

impl AtlasLayout {
    /// `None` when the atlas is narrower than a single tile.
    pub fn new(atlas_width: u32, tile_size: u32) -> Option<Self> {
        if tile_size == 0 || atlas_width < tile_size {
            return None;
        }
        Some(Self {
            atlas_width,
            tile_size,
            tiles_per_row: atlas_width / tile_size,
        })
    }

    pub fn atlas_width(&self) -> u32 {
        self.atlas_width
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn tiles_per_row(&self) -> u32 {
        self.tiles_per_row
    }

    /// Inset applied to every side of a tile's UV rectangle (one texel).
    pub fn epsilon(&self) -> f32 {
        1.0 / self.atlas_width as f32
    }

    /// `(column, row)` of a tile; row 0 is the top row of the image.
    pub fn tile_cell(&self, tile: u32) -> (u32, u32) {
        (tile % self.tiles_per_row, tile / self.tiles_per_row)
    }

    pub fn tile_uv(&self, tile: u32) -> UvRect {
        let (col, row) = self.tile_cell(tile);
        let unit = 1.0 / self.tiles_per_row as f32;
        let eps = self.epsilon();
        UvRect {
            u_min: col as f32 * unit + eps,
            u_max: (col + 1) as f32 * unit - eps,
            v_min: 1.0 - (row + 1) as f32 * unit + eps,
            v_max: 1.0 - row as f32 * unit - eps,
        }
    }
}

/// Texture-space rectangle, `v` growing upward (row 0 of uploads is the bottom).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvRect {
    pub u_min: f32,
    pub u_max: f32,
    pub v_min: f32,
    pub v_max: f32,
}

impl UvRect {
    pub const FULL: UvRect = UvRect {
        u_min: 0.0,
        u_max: 1.0,
        v_min: 0.0,
        v_max: 1.0,
    };

    /// Corners in quad order: bottom-left, bottom-right, top-right, top-left.
    pub fn corners(&self) -> [Vec2; 4] {
        [
            Vec2::new(self.u_min, self.v_min),
            Vec2::new(self.u_max, self.v_min),
            Vec2::new(self.u_max, self.v_max),
            Vec2::new(self.u_min, self.v_max),
        ]
    }
}

/// Corners of one face of the unit cube at `origin`, counter-clockwise seen
/// from outside, starting at the face's bottom-left.
pub fn face_corners(origin: Vec3, face: Face) -> [Vec3; 4] {
    let (x1, y1, z1) = (origin.x, origin.y, origin.z);
    let (x2, y2, z2) = (x1 + 1.0, y1 + 1.0, z1 + 1.0);
    let v = Vec3::new;
    match face {
        Face::Top => [v(x1, y2, z2), v(x2, y2, z2), v(x2, y2, z1), v(x1, y2, z1)],
        Face::Front => [v(x1, y1, z2), v(x2, y1, z2), v(x2, y2, z2), v(x1, y2, z2)],
        Face::Left => [v(x1, y1, z1), v(x1, y1, z2), v(x1, y2, z2), v(x1, y2, z1)],
        Face::Right => [v(x2, y1, z2), v(x2, y1, z1), v(x2, y2, z1), v(x2, y2, z2)],
        Face::Back => [v(x2, y1, z1), v(x1, y1, z1), v(x1, y2, z1), v(x2, y2, z1)],
        Face::Bottom => [v(x1, y1, z1), v(x2, y1, z1), v(x2, y1, z2), v(x1, y1, z2)],
    }
}

/// Build the quad for one face.
pub fn face_quad(origin: Vec3, face: Face, uv: UvRect) -> Quad {
    Quad {
        corners: face_corners(origin, face),
        uvs: uv.corners(),
        normal: face.normal(),
    }
}

/// Emit the exposed faces of the cube at `origin` into `sink`.
///
/// Without an atlas every face samples the whole texture. Returns the number
/// of quads emitted, always `mask.count()`.
pub fn emit_box(
    sink: &mut dyn QuadSink,
    atlas: Option<&AtlasLayout>,
    origin: Vec3,
    mask: FaceMask,
    tiles: &FaceTiles,
) -> usize {
    let mut emitted = 0;
    for face in mask.faces() {
        let uv = match atlas {
            Some(atlas) => atlas.tile_uv(tiles.get(face)),
            None => UvRect::FULL,
        };
        sink.push_quad(face_quad(origin, face, uv));
        emitted += 1;
    }
    emitted
}
