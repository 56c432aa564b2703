//! Shared types for the cubebatch workspace.
//!
//! # Invariants
//! - `ChunkGrid::chunk_index_of` always yields an index in `[0, chunk_count)`.
//! - Face bit order is fixed: top, front, left, right, back, bottom.

mod faces;
mod grid;
mod types;

pub use faces::{Face, FaceMask, FaceTiles};
pub use grid::{ChunkGrid, GridError};
pub use types::{ChunkIndex, EntityId};

pub fn crate_info() -> &'static str {
    "cubebatch-common v0.1.0"
}
