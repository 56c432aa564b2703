use crate::backend::{
    BackendError, BatchHandle, DrawState, Quad, QuadSink, RenderBackend, TextureFilter,
    TextureId, TextureUpload, TextureWrap,
};

/// A replay-side call observed by the [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Clear([f32; 4]),
    BindTexture(Option<TextureId>),
    SetDrawState(DrawState),
    CallBatch(BatchHandle),
}

/// A texture held in CPU memory.
#[derive(Debug, Clone)]
pub struct StoredTexture {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
    pub rgba: Vec<u8>,
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
}

/// CPU backend that keeps compiled batches as quad lists.
///
/// Useful for tests, headless tools and logging: every replay-side call is
/// appended to a log that can be inspected or drained after a frame.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    textures: Vec<StoredTexture>,
    batches: Vec<Vec<Quad>>,
    open: Option<(BatchHandle, Vec<Quad>)>,
    calls: Vec<BackendCall>,
    compiles: usize,
    max_texture_size: Option<u32>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject textures larger than `limit` on either side.
    pub fn with_max_texture_size(limit: u32) -> Self {
        Self {
            max_texture_size: Some(limit),
            ..Self::default()
        }
    }

    /// Replay-side calls since the last [`take_calls`](Self::take_calls).
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Current content of a batch.
    pub fn batch(&self, handle: BatchHandle) -> Option<&[Quad]> {
        self.batches.get(handle.0 as usize).map(Vec::as_slice)
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Number of successfully committed recordings.
    pub fn compile_count(&self) -> usize {
        self.compiles
    }

    pub fn texture(&self, id: TextureId) -> Option<&StoredTexture> {
        self.textures.get(id.0 as usize)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn is_recording(&self) -> bool {
        self.open.is_some()
    }

    /// Quads that the logged `CallBatch` calls put on screen.
    pub fn replayed_quads(&self) -> usize {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::CallBatch(h) => self.batch(*h).map(<[Quad]>::len),
                _ => None,
            })
            .sum()
    }

    /// Human-readable summary of the backend state.
    pub fn summary(&self) -> String {
        let stored: usize = self.batches.iter().map(Vec::len).sum();
        let non_empty = self.batches.iter().filter(|b| !b.is_empty()).count();
        format!(
            "textures={} batches={} non_empty={} stored_quads={} compiles={} calls={} replayed_quads={}",
            self.textures.len(),
            self.batches.len(),
            non_empty,
            stored,
            self.compiles,
            self.calls.len(),
            self.replayed_quads()
        )
    }
}

impl QuadSink for RecordingBackend {
    fn push_quad(&mut self, quad: Quad) {
        match &mut self.open {
            Some((_, pending)) => pending.push(quad),
            None => tracing::warn!("quad pushed outside of a batch recording, dropped"),
        }
    }
}

impl RenderBackend for RecordingBackend {
    fn upload_texture(&mut self, upload: &TextureUpload<'_>) -> Result<TextureId, BackendError> {
        if let Some(limit) = self.max_texture_size {
            if upload.width > limit || upload.height > limit {
                return Err(BackendError::TextureTooLarge {
                    width: upload.width,
                    height: upload.height,
                    limit,
                });
            }
        }
        let expected = upload.width as usize * upload.height as usize * 4;
        if upload.rgba.len() != expected {
            return Err(BackendError::TextureSize {
                expected,
                actual: upload.rgba.len(),
            });
        }

        let id = TextureId(self.textures.len() as u32);
        self.textures.push(StoredTexture {
            width: upload.width,
            height: upload.height,
            has_alpha: upload.has_alpha,
            rgba: upload.rgba.to_vec(),
            filter: upload.filter,
            wrap: upload.wrap,
        });
        Ok(id)
    }

    fn allocate_batches(&mut self, count: usize) -> Result<Vec<BatchHandle>, BackendError> {
        let first = self.batches.len() as u32;
        self.batches.resize_with(self.batches.len() + count, Vec::new);
        Ok((0..count as u32).map(|i| BatchHandle(first + i)).collect())
    }

    fn begin_batch(&mut self, handle: BatchHandle) -> Result<(), BackendError> {
        if let Some((open, _)) = self.open {
            return Err(BackendError::BatchAlreadyOpen(open));
        }
        if handle.0 as usize >= self.batches.len() {
            return Err(BackendError::UnknownBatch(handle));
        }
        self.open = Some((handle, Vec::new()));
        Ok(())
    }

    fn end_batch(&mut self) -> Result<(), BackendError> {
        let (handle, quads) = self.open.take().ok_or(BackendError::NoOpenBatch)?;
        self.batches[handle.0 as usize] = quads;
        self.compiles += 1;
        Ok(())
    }

    fn abort_batch(&mut self) {
        self.open = None;
    }

    fn call_batch(&mut self, handle: BatchHandle) -> Result<(), BackendError> {
        if handle.0 as usize >= self.batches.len() {
            return Err(BackendError::UnknownBatch(handle));
        }
        self.calls.push(BackendCall::CallBatch(handle));
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.calls.push(BackendCall::Clear(color));
    }

    fn bind_texture(&mut self, texture: Option<TextureId>) -> Result<(), BackendError> {
        if let Some(id) = texture {
            if id.0 as usize >= self.textures.len() {
                return Err(BackendError::UnknownTexture(id));
            }
        }
        self.calls.push(BackendCall::BindTexture(texture));
        Ok(())
    }

    fn set_draw_state(&mut self, state: DrawState) {
        self.calls.push(BackendCall::SetDrawState(state));
    }
}
