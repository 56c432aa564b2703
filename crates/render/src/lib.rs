//! Render core: chunk-partitioned batch cache, frame loop and cube face mesher.
//!
//! Every registered graphic owns one compiled batch per world chunk. Each
//! frame only the batches touched by queued entities are re-recorded; all
//! other batches replay their previous content.
//!
//! # Invariants
//! - A graphic's texture handle and batch handles are assigned once and never
//!   reassigned.
//! - Every registered graphic owns exactly `grid.chunk_count()` batch slots.
//! - An entity joins the seen set at most once per frame; a slot is recorded
//!   at most once per frame.
//! - Image graphics replay before procedural graphics, each group in
//!   registration order, each graphic's slots in chunk-index order.
//!
//! The core is backend-agnostic: anything implementing [`RenderBackend`]
//! can host it. [`RecordingBackend`] keeps batches in memory.

mod backend;
mod behavior;
mod cache;
mod config;
mod error;
mod frame;
mod graphic;
pub mod mesher;
mod recording;
mod registry;
mod subsystem;
mod world;

pub use backend::{
    BackendError, BatchHandle, DrawState, Quad, QuadSink, RenderBackend, TextureFilter, TextureId,
    TextureUpload, TextureWrap,
};
pub use behavior::{BehaviorKey, GraphicFunction};
pub use cache::{BatchCache, SlotState};
pub use config::{ConfigError, RenderConfig};
pub use error::{LoadCause, RenderError};
pub use frame::{FramePhase, FrameState, FrameStats};
pub use graphic::{Graphic, GraphicId, GraphicKind, GraphicSource};
pub use mesher::{AtlasLayout, UvRect};
pub use recording::{BackendCall, RecordingBackend, StoredTexture};
pub use registry::GraphicRegistry;
pub use subsystem::RenderSubsystem;
pub use world::{BindingRole, GraphicBinding, RenderEntity, WorldView};

pub fn crate_info() -> &'static str {
    "cubebatch-render v0.1.0"
}
