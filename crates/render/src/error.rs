use cubebatch_assets::{AssetError, PixelError};
use cubebatch_common::ChunkIndex;

use crate::backend::{BackendError, BatchHandle};
use crate::config::ConfigError;
use crate::graphic::GraphicId;

/// Why a graphic resource could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadCause {
    #[error(transparent)]
    Decode(#[from] AssetError),
    #[error(transparent)]
    Pixels(#[from] PixelError),
    #[error(transparent)]
    Upload(#[from] BackendError),
}

/// Errors surfaced by the render subsystem.
///
/// `ResourceLoad` is recoverable: the lookup yields no graphic and the caller
/// decides what to do. Every other variant is an invariant violation that
/// aborts the frame in progress.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to load graphic {resource}: {source}")]
    ResourceLoad {
        resource: String,
        #[source]
        source: LoadCause,
    },
    #[error("no batch slot for {graphic} in {chunk}")]
    MissingBatchSlot { graphic: GraphicId, chunk: ChunkIndex },
    #[error("cannot record {graphic} in {chunk}: {open_graphic} in {open_chunk} is still open")]
    RecordingAlreadyOpen {
        graphic: GraphicId,
        chunk: ChunkIndex,
        open_graphic: GraphicId,
        open_chunk: ChunkIndex,
    },
    #[error("end of recording requested with no open batch slot")]
    NoOpenRecording,
    #[error("{hook} hook of {graphic} failed: {source}")]
    HookFailed {
        graphic: GraphicId,
        hook: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("backend rejected batch {handle:?}: {source}")]
    Batch {
        handle: BatchHandle,
        #[source]
        source: BackendError,
    },
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl RenderError {
    /// True for the recoverable load failure reported at the registry boundary.
    pub fn is_resource_load(&self) -> bool {
        matches!(self, RenderError::ResourceLoad { .. })
    }

    /// True for registry/cache desynchronization and failed hooks.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            RenderError::MissingBatchSlot { .. }
                | RenderError::RecordingAlreadyOpen { .. }
                | RenderError::NoOpenRecording
                | RenderError::HookFailed { .. }
                | RenderError::Batch { .. }
        )
    }
}
