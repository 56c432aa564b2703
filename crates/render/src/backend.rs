//! The seam between the render core and a concrete graphics API.
//!
//! A backend owns textures and compiled batches. The core only ever sees
//! opaque [`TextureId`] and [`BatchHandle`] values.

use glam::{Vec2, Vec3};

/// Backend handle of an uploaded texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Backend handle of a compiled batch (display list, command buffer,
/// retained vertex buffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchHandle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrap {
    ClampToEdge,
    Repeat,
}

/// A 2D texture ready for upload: RGBA texels with row 0 at the bottom.
#[derive(Debug, Clone, Copy)]
pub struct TextureUpload<'a> {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub rgba: &'a [u8],
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
}

/// Fixed-function state set by graphic behavior hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawState {
    pub texturing: bool,
    pub depth_write: bool,
    pub blending: bool,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            texturing: false,
            depth_write: true,
            blending: true,
        }
    }
}

/// One textured quad. Corners are counter-clockwise seen from outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub corners: [Vec3; 4],
    pub uvs: [Vec2; 4],
    pub normal: Vec3,
}

/// Errors raised by a backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("unknown batch {0:?}")]
    UnknownBatch(BatchHandle),
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),
    #[error("batch {0:?} is already being recorded")]
    BatchAlreadyOpen(BatchHandle),
    #[error("no batch is being recorded")]
    NoOpenBatch,
    #[error("texture {width}x{height} exceeds the backend limit of {limit}")]
    TextureTooLarge { width: u32, height: u32, limit: u32 },
    #[error("texture data is {actual} bytes, expected {expected}")]
    TextureSize { expected: usize, actual: usize },
    #[error("texture has a zero-sized side")]
    EmptyTexture,
}

/// Destination of mesher output while a batch is being recorded.
pub trait QuadSink {
    fn push_quad(&mut self, quad: Quad);
}

/// Operations the render core needs from a graphics API.
///
/// Recording follows list-compile semantics: content pushed between
/// `begin_batch` and `end_batch` replaces the previous content of the batch
/// only when `end_batch` succeeds. `abort_batch` drops it.
pub trait RenderBackend: QuadSink {
    fn upload_texture(&mut self, upload: &TextureUpload<'_>) -> Result<TextureId, BackendError>;

    /// Allocate `count` empty batches with stable handles.
    fn allocate_batches(&mut self, count: usize) -> Result<Vec<BatchHandle>, BackendError>;

    fn begin_batch(&mut self, handle: BatchHandle) -> Result<(), BackendError>;

    fn end_batch(&mut self) -> Result<(), BackendError>;

    fn abort_batch(&mut self);

    /// Replay a batch's recorded content.
    fn call_batch(&mut self, handle: BatchHandle) -> Result<(), BackendError>;

    /// Clear color and depth.
    fn clear(&mut self, color: [f32; 4]);

    fn bind_texture(&mut self, texture: Option<TextureId>) -> Result<(), BackendError>;

    fn set_draw_state(&mut self, state: DrawState);
}
