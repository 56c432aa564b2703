use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cubebatch_assets::{ImageDecoder, argb_top_down_to_rgba_bottom_up};

use crate::backend::{RenderBackend, TextureFilter, TextureUpload, TextureWrap};
use crate::behavior::BehaviorKey;
use crate::cache::BatchCache;
use crate::error::{LoadCause, RenderError};
use crate::graphic::{Graphic, GraphicId, GraphicKind};

/// Deduplicating store of graphics.
///
/// Image graphics are keyed by path, procedural graphics by behavior key.
/// The first lookup of a key creates the graphic, uploads its texture and
/// allocates its batch slots; later lookups return the same graphic and
/// allocate nothing.
#[derive(Debug, Default)]
pub struct GraphicRegistry {
    graphics: Vec<Graphic>,
    by_path: HashMap<PathBuf, GraphicId>,
    by_behavior: HashMap<BehaviorKey, GraphicId>,
}

impl GraphicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.graphics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphics.is_empty()
    }

    pub fn get(&self, id: GraphicId) -> Option<&Graphic> {
        self.graphics.get(id.0 as usize)
    }

    pub fn find_image(&self, path: &Path) -> Option<&Graphic> {
        self.by_path.get(path).and_then(|id| self.get(*id))
    }

    pub fn find_procedural(&self, behavior: BehaviorKey) -> Option<&Graphic> {
        self.by_behavior.get(&behavior).and_then(|id| self.get(*id))
    }

    /// Graphics of one kind, in registration order.
    pub fn graphics_of(&self, kind: GraphicKind) -> impl Iterator<Item = &Graphic> {
        self.graphics.iter().filter(move |g| g.kind() == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Graphic> {
        self.graphics.iter()
    }

    fn next_id(&self) -> GraphicId {
        GraphicId(self.graphics.len() as u32)
    }

    fn push(&mut self, graphic: Graphic) -> &Graphic {
        let index = self.graphics.len();
        self.graphics.push(graphic);
        &self.graphics[index]
    }

    /// Look up or load the image graphic at `path`.
    ///
    /// A hit returns the existing graphic whatever `behavior` is passed. A
    /// failed load registers nothing, so a later call retries it.
    pub fn get_image_resource(
        &mut self,
        path: &Path,
        behavior: BehaviorKey,
        decoder: &dyn ImageDecoder,
        backend: &mut dyn RenderBackend,
        cache: &mut BatchCache,
    ) -> Result<&Graphic, RenderError> {
        if let Some(id) = self.by_path.get(path).copied() {
            tracing::trace!(path = %path.display(), %id, "image graphic cache hit");
            return Ok(&self.graphics[id.0 as usize]);
        }

        let id = self.next_id();
        let fail = |source: LoadCause| {
            tracing::error!(path = %path.display(), error = %source, "failed to load image graphic");
            RenderError::ResourceLoad {
                resource: path.display().to_string(),
                source,
            }
        };

        let image = decoder.decode(path).map_err(|e| fail(e.into()))?;
        let rgba = argb_top_down_to_rgba_bottom_up(image.argb(), image.width(), image.height())
            .map_err(|e| fail(e.into()))?;
        let texture = backend
            .upload_texture(&TextureUpload {
                width: image.width(),
                height: image.height(),
                has_alpha: image.has_alpha(),
                rgba: &rgba,
                filter: TextureFilter::Nearest,
                wrap: TextureWrap::ClampToEdge,
            })
            .map_err(|e| fail(e.into()))?;
        cache.allocate(id, backend).map_err(|e| fail(e.into()))?;

        tracing::info!(
            path = %path.display(),
            %id,
            width = image.width(),
            height = image.height(),
            behavior = behavior.name(),
            "registered image graphic"
        );
        self.by_path.insert(path.to_path_buf(), id);
        Ok(self.push(Graphic::image(
            id,
            path.to_path_buf(),
            texture,
            image.width(),
            image.height(),
            image.has_alpha(),
            behavior,
        )))
    }

    /// Look up or create the procedural graphic for `behavior`.
    pub fn get_procedural_resource(
        &mut self,
        behavior: BehaviorKey,
        backend: &mut dyn RenderBackend,
        cache: &mut BatchCache,
    ) -> Result<&Graphic, RenderError> {
        if let Some(id) = self.by_behavior.get(&behavior).copied() {
            return Ok(&self.graphics[id.0 as usize]);
        }

        let id = self.next_id();
        cache.allocate(id, backend).map_err(|source| {
            tracing::error!(behavior = behavior.name(), error = %source, "failed to allocate procedural graphic");
            RenderError::ResourceLoad {
                resource: format!("<{}>", behavior.name()),
                source: source.into(),
            }
        })?;

        tracing::info!(%id, behavior = behavior.name(), "registered procedural graphic");
        self.by_behavior.insert(behavior, id);
        Ok(self.push(Graphic::procedural(id, behavior)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingBackend;
    use cubebatch_assets::{DecodedImage, MemoryDecoder};

    fn decoder() -> MemoryDecoder {
        let mut d = MemoryDecoder::new();
        let argb: Vec<u8> = (0..64 * 64).flat_map(|i| [255, i as u8, 0, 0]).collect();
        d.insert("stone.png", DecodedImage::from_argb(64, 64, false, argb).unwrap());
        d.insert(
            "glass.png",
            DecodedImage::from_argb(32, 32, true, vec![128; 32 * 32 * 4]).unwrap(),
        );
        d
    }

    #[test]
    fn image_lookup_is_idempotent() {
        let decoder = decoder();
        let mut backend = RecordingBackend::new();
        let mut cache = BatchCache::new(8);
        let mut reg = GraphicRegistry::new();

        let a = reg
            .get_image_resource(
                Path::new("stone.png"),
                BehaviorKey::Texture,
                &decoder,
                &mut backend,
                &mut cache,
            )
            .unwrap()
            .id();
        let b = reg
            .get_image_resource(
                Path::new("stone.png"),
                BehaviorKey::Texture,
                &decoder,
                &mut backend,
                &mut cache,
            )
            .unwrap()
            .id();
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
        assert_eq!(backend.texture_count(), 1);
        assert_eq!(backend.batch_count(), 8);
        assert_eq!(cache.slot_count(a), 8);
    }

    #[test]
    fn distinct_paths_never_collide() {
        let decoder = decoder();
        let mut backend = RecordingBackend::new();
        let mut cache = BatchCache::new(2);
        let mut reg = GraphicRegistry::new();

        let stone = reg
            .get_image_resource(
                Path::new("stone.png"),
                BehaviorKey::Texture,
                &decoder,
                &mut backend,
                &mut cache,
            )
            .unwrap()
            .id();
        let glass = reg
            .get_image_resource(
                Path::new("glass.png"),
                BehaviorKey::Translucent,
                &decoder,
                &mut backend,
                &mut cache,
            )
            .unwrap()
            .id();
        assert_ne!(stone, glass);
        assert_ne!(
            reg.get(stone).unwrap().texture(),
            reg.get(glass).unwrap().texture()
        );
        assert!(reg.get(glass).unwrap().has_alpha());
    }

    #[test]
    fn upload_is_flipped_and_nearest_clamped() {
        let decoder = decoder();
        let mut backend = RecordingBackend::new();
        let mut cache = BatchCache::new(1);
        let mut reg = GraphicRegistry::new();
        let g = reg
            .get_image_resource(
                Path::new("stone.png"),
                BehaviorKey::Texture,
                &decoder,
                &mut backend,
                &mut cache,
            )
            .unwrap();
        let tex = backend.texture(g.texture().unwrap()).unwrap();
        assert_eq!(tex.filter, TextureFilter::Nearest);
        assert_eq!(tex.wrap, TextureWrap::ClampToEdge);
        // Source texel 0 (top-left, red = 0) lands in the last row.
        let last_row = (64 - 1) * 64 * 4;
        assert_eq!(&tex.rgba[last_row..last_row + 4], &[0, 0, 0, 255]);
        assert_eq!(&tex.rgba[0..4], &[(63 * 64 % 256) as u8, 0, 0, 255]);
    }

    #[test]
    fn missing_image_is_recoverable() {
        let decoder = decoder();
        let mut backend = RecordingBackend::new();
        let mut cache = BatchCache::new(4);
        let mut reg = GraphicRegistry::new();
        let err = reg
            .get_image_resource(
                Path::new("missing.png"),
                BehaviorKey::Texture,
                &decoder,
                &mut backend,
                &mut cache,
            )
            .unwrap_err();
        assert!(err.is_resource_load());
        assert!(reg.is_empty());
        assert_eq!(backend.batch_count(), 0);
    }

    #[test]
    fn upload_failure_is_resource_load() {
        let decoder = decoder();
        let mut backend = RecordingBackend::with_max_texture_size(32);
        let mut cache = BatchCache::new(4);
        let mut reg = GraphicRegistry::new();
        let err = reg
            .get_image_resource(
                Path::new("stone.png"),
                BehaviorKey::Texture,
                &decoder,
                &mut backend,
                &mut cache,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::ResourceLoad {
                source: LoadCause::Upload(_),
                ..
            }
        ));
        assert!(reg.find_image(Path::new("stone.png")).is_none());
    }

    #[test]
    fn procedural_lookup_is_idempotent_per_behavior() {
        let mut backend = RecordingBackend::new();
        let mut cache = BatchCache::new(3);
        let mut reg = GraphicRegistry::new();
        let a = reg
            .get_procedural_resource(BehaviorKey::Overlay, &mut backend, &mut cache)
            .unwrap()
            .id();
        let b = reg
            .get_procedural_resource(BehaviorKey::Overlay, &mut backend, &mut cache)
            .unwrap()
            .id();
        let c = reg
            .get_procedural_resource(BehaviorKey::Untextured, &mut backend, &mut cache)
            .unwrap()
            .id();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(backend.batch_count(), 6);
        assert_eq!(backend.texture_count(), 0);
        assert_eq!(reg.graphics_of(GraphicKind::Procedural).count(), 2);
    }
}
