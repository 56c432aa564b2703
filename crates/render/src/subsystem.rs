use std::path::Path;

use cubebatch_assets::{FileDecoder, ImageDecoder};
use cubebatch_common::{ChunkIndex, EntityId};

use crate::backend::RenderBackend;
use crate::behavior::BehaviorKey;
use crate::cache::BatchCache;
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::frame::{FramePhase, FrameState, FrameStats};
use crate::graphic::{Graphic, GraphicId, GraphicKind};
use crate::registry::GraphicRegistry;
use crate::world::WorldView;

/// The render core: registry, batch cache and per-frame state, owned by the
/// host for the process lifetime.
///
/// All calls must come from one thread. A frame runs to completion inside
/// [`run_frame`](Self::run_frame).
pub struct RenderSubsystem<B: RenderBackend> {
    config: RenderConfig,
    backend: B,
    decoder: Box<dyn ImageDecoder>,
    registry: GraphicRegistry,
    cache: BatchCache,
    frame: FrameState,
    frames_rendered: u64,
}

impl<B: RenderBackend> RenderSubsystem<B> {
    pub fn new(
        config: RenderConfig,
        backend: B,
        decoder: Box<dyn ImageDecoder>,
    ) -> Result<Self, RenderError> {
        config.validate()?;
        let chunk_count = config.grid.chunk_count();
        tracing::info!(
            chunks = chunk_count,
            tile_size = config.tile_size,
            "render subsystem initialized"
        );
        Ok(Self {
            config,
            backend,
            decoder,
            registry: GraphicRegistry::new(),
            cache: BatchCache::new(chunk_count),
            frame: FrameState::default(),
            frames_rendered: 0,
        })
    }

    /// Subsystem reading images from files below `config.asset_root`.
    pub fn with_file_decoder(config: RenderConfig, backend: B) -> Result<Self, RenderError> {
        let decoder = FileDecoder::new(config.asset_root.clone());
        Self::new(config, backend, Box::new(decoder))
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    pub fn registry(&self) -> &GraphicRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &BatchCache {
        &self.cache
    }

    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    pub fn graphic(&self, id: GraphicId) -> Option<&Graphic> {
        self.registry.get(id)
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Register (or look up) the image graphic at `path`.
    pub fn register_image_resource(
        &mut self,
        path: impl AsRef<Path>,
        behavior: BehaviorKey,
    ) -> Result<GraphicId, RenderError> {
        let _span =
            tracing::info_span!("register_image", path = %path.as_ref().display()).entered();
        self.registry
            .get_image_resource(
                path.as_ref(),
                behavior,
                self.decoder.as_ref(),
                &mut self.backend,
                &mut self.cache,
            )
            .map(Graphic::id)
    }

    /// Register (or look up) the procedural graphic for `behavior`.
    pub fn register_procedural_resource(
        &mut self,
        behavior: BehaviorKey,
    ) -> Result<GraphicId, RenderError> {
        let _span = tracing::info_span!("register_procedural", behavior = behavior.name()).entered();
        self.registry
            .get_procedural_resource(behavior, &mut self.backend, &mut self.cache)
            .map(Graphic::id)
    }

    /// Submit an entity for this frame. Returns `false` if it was already queued.
    pub fn enqueue(&mut self, entity: EntityId) -> bool {
        self.frame.queue.insert(entity)
    }

    /// Force `(graphic, chunk)` to be re-recorded next frame even if no queued
    /// entity lands there.
    pub fn invalidate(&mut self, graphic: GraphicId, chunk: ChunkIndex) -> Result<(), RenderError> {
        if self.cache.handle(graphic, chunk).is_none() {
            return Err(RenderError::MissingBatchSlot { graphic, chunk });
        }
        self.frame.invalidated.insert((graphic, chunk));
        Ok(())
    }

    /// Run one frame: clear, record dirty batches, replay every batch, reset.
    ///
    /// On error the open recording is dropped, the seen set is cleared and the
    /// queue is kept for the next attempt.
    pub fn run_frame(&mut self, world: &dyn WorldView) -> Result<FrameStats, RenderError> {
        let _span = tracing::info_span!("run_frame", frame = self.frames_rendered).entered();
        let mut stats = FrameStats::default();

        self.frame.enter(FramePhase::Clearing);
        self.backend.clear(self.config.clear_color);

        self.frame.enter(FramePhase::Recording);
        if let Err(e) = self.record(world, &mut stats) {
            self.abort_frame(&e);
            return Err(e);
        }

        self.frame.enter(FramePhase::Replaying);
        if let Err(e) = self.replay(&mut stats) {
            self.abort_frame(&e);
            return Err(e);
        }

        self.cache.finish_frame();
        self.frame.reset();
        self.frames_rendered += 1;
        tracing::debug!(?stats, "frame complete");
        Ok(stats)
    }

    fn record(&mut self, world: &dyn WorldView, stats: &mut FrameStats) -> Result<(), RenderError> {
        let mut queued: Vec<EntityId> = self.frame.queue.iter().copied().collect();
        queued.sort_unstable();

        for id in queued {
            if self.frame.seen.contains(&id) {
                stats.queued_skipped_seen += 1;
                continue;
            }
            let Some(entity) = world.entity(id) else {
                tracing::warn!(entity = %id, "queued entity not found in world");
                stats.missing_entities += 1;
                continue;
            };
            let chunk = world.chunk_index_of(entity.position());
            for binding in entity.bindings() {
                self.record_slot(world, binding.graphic, chunk, stats)?;
            }
        }

        let forced: Vec<(GraphicId, ChunkIndex)> = self.frame.invalidated.iter().copied().collect();
        for (graphic, chunk) in forced {
            self.record_slot(world, graphic, chunk, stats)?;
        }
        Ok(())
    }

    /// Rebuild one slot from every entity in `chunk` that uses `graphic`.
    fn record_slot(
        &mut self,
        world: &dyn WorldView,
        graphic: GraphicId,
        chunk: ChunkIndex,
        stats: &mut FrameStats,
    ) -> Result<(), RenderError> {
        if self.cache.is_recorded_this_frame(graphic, chunk) {
            stats.slots_skipped += 1;
            return Ok(());
        }
        let atlas = self
            .registry
            .get(graphic)
            .and_then(|g| g.atlas(self.config.tile_size));

        self.cache.begin_recording(graphic, chunk, &mut self.backend)?;
        for user in world.users_of(graphic) {
            let Some(entity) = world.entity(user) else {
                stats.missing_entities += 1;
                continue;
            };
            if world.chunk_index_of(entity.position()) != chunk {
                continue;
            }
            if self.frame.seen.insert(user) {
                stats.entities_swept += 1;
                tracing::trace!(entity = %user, %graphic, %chunk, "entity swept");
            }
            for binding in entity.bindings().iter().filter(|b| b.graphic == graphic) {
                stats.quads_emitted += entity.draw(binding, atlas.as_ref(), &mut self.backend);
            }
        }
        self.cache.end_recording(&mut self.backend)?;
        stats.slots_recorded += 1;
        tracing::debug!(%graphic, %chunk, "slot recorded");
        Ok(())
    }

    /// Image graphics first, then procedural ones, each in registration order.
    fn replay(&mut self, stats: &mut FrameStats) -> Result<(), RenderError> {
        for kind in [GraphicKind::Image, GraphicKind::Procedural] {
            for graphic in self.registry.graphics_of(kind) {
                let id = graphic.id();
                let function = graphic.function();
                function
                    .begin(graphic, &mut self.backend)
                    .map_err(|source| RenderError::HookFailed {
                        graphic: id,
                        hook: "begin",
                        source,
                    })?;
                stats.batches_replayed += self.cache.replay_all(id, &mut self.backend)?;
                function
                    .end(graphic, &mut self.backend)
                    .map_err(|source| RenderError::HookFailed {
                        graphic: id,
                        hook: "end",
                        source,
                    })?;
            }
        }
        Ok(())
    }

    fn abort_frame(&mut self, error: &RenderError) {
        tracing::error!(phase = ?self.frame.phase(), %error, "frame aborted");
        self.cache.abort_recording(&mut self.backend);
        self.cache.finish_frame();
        self.frame.seen.clear();
        self.frame.enter(FramePhase::Clearing);
    }
}

impl<B: RenderBackend + std::fmt::Debug> std::fmt::Debug for RenderSubsystem<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderSubsystem")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .field("graphics", &self.registry.len())
            .field("frames_rendered", &self.frames_rendered)
            .finish_non_exhaustive()
    }
}
