//! wgpu render backend for the cubebatch render core.
//!
//! Batches are retained vertex buffers; replay calls issued by the core are
//! queued and encoded into a single render pass per frame.
//!
//! # Invariants
//! - A batch's vertex buffer is replaced only when its recording ends.
//! - Untextured draws sample a 1x1 white texture, never a stale binding.
//! - Faces are culled by counter-clockwise front-face winding.

mod gpu;
mod shaders;

pub use gpu::{FrameReport, WgpuBackend, WgpuBackendError};
pub use shaders::BATCH_SHADER;

pub fn crate_info() -> &'static str {
    "cubebatch-render-wgpu v0.1.0"
}
