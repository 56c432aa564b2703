use glam::{IVec3, UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::types::ChunkIndex;

/// Errors from chunk grid construction.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("chunk grid needs at least one chunk per axis, got {0}x{1}x{2}")]
    EmptyAxis(u32, u32, u32),
    #[error("chunk size must be positive, got {0}")]
    NonPositiveChunkSize(f32),
}

/// Fixed-size chunk partitioning of the world volume.
///
/// The world is `chunks_x * chunks_y * chunks_z` cubic chunks of edge
/// `chunk_size` world units, anchored at the origin. Positions outside the
/// volume clamp to the nearest border chunk, so every position maps to a
/// valid index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkGrid {
    pub chunks_x: u32,
    pub chunks_y: u32,
    pub chunks_z: u32,
    pub chunk_size: f32,
}

impl Default for ChunkGrid {
    fn default() -> Self {
        Self {
            chunks_x: 8,
            chunks_y: 8,
            chunks_z: 8,
            chunk_size: 16.0,
        }
    }
}

impl ChunkGrid {
    /// Create a validated grid.
    pub fn new(chunks: UVec3, chunk_size: f32) -> Result<Self, GridError> {
        let grid = Self {
            chunks_x: chunks.x,
            chunks_y: chunks.y,
            chunks_z: chunks.z,
            chunk_size,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Cube grid with `n` chunks per axis.
    pub fn cubic(n: u32, chunk_size: f32) -> Result<Self, GridError> {
        Self::new(UVec3::splat(n), chunk_size)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if self.chunks_x == 0 || self.chunks_y == 0 || self.chunks_z == 0 {
            return Err(GridError::EmptyAxis(
                self.chunks_x,
                self.chunks_y,
                self.chunks_z,
            ));
        }
        if self.chunk_size.is_nan() || self.chunk_size <= 0.0 {
            return Err(GridError::NonPositiveChunkSize(self.chunk_size));
        }
        Ok(())
    }

    /// Total number of chunks in the world.
    pub fn chunk_count(&self) -> usize {
        self.chunks_x as usize * self.chunks_y as usize * self.chunks_z as usize
    }

    /// Convert a world position to the (clamped) chunk coordinate.
    pub fn chunk_coord_of(&self, pos: Vec3) -> UVec3 {
        let cell = (pos / self.chunk_size).floor();
        let max = IVec3::new(
            self.chunks_x as i32 - 1,
            self.chunks_y as i32 - 1,
            self.chunks_z as i32 - 1,
        );
        cell.as_ivec3().clamp(IVec3::ZERO, max).as_uvec3()
    }

    /// Linear chunk index: x varies fastest, then z, then y.
    pub fn index_of_coord(&self, coord: UVec3) -> ChunkIndex {
        let x = coord.x as usize;
        let y = coord.y as usize;
        let z = coord.z as usize;
        let cx = self.chunks_x as usize;
        let cz = self.chunks_z as usize;
        ChunkIndex(x + z * cx + y * cx * cz)
    }

    /// Deterministic quantization of a world position to a chunk index.
    pub fn chunk_index_of(&self, pos: Vec3) -> ChunkIndex {
        self.index_of_coord(self.chunk_coord_of(pos))
    }
}
