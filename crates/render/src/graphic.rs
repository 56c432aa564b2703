use std::path::{Path, PathBuf};

use crate::backend::TextureId;
use crate::behavior::{BehaviorKey, GraphicFunction};
use crate::mesher::AtlasLayout;

/// Registry-assigned identifier of a graphic resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphicId(pub u32);

impl std::fmt::Display for GraphicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "graphic#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphicKind {
    Image,
    Procedural,
}

/// Where a graphic came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphicSource {
    Image(PathBuf),
    Procedural,
}

/// An immutable drawable: an atlas texture or a hook-driven procedural draw.
///
/// Constructed only by the registry; the texture handle never changes after
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Graphic {
    id: GraphicId,
    source: GraphicSource,
    texture: Option<TextureId>,
    width: u32,
    height: u32,
    has_alpha: bool,
    behavior: BehaviorKey,
}

impl Graphic {
    pub(crate) fn image(
        id: GraphicId,
        path: PathBuf,
        texture: TextureId,
        width: u32,
        height: u32,
        has_alpha: bool,
        behavior: BehaviorKey,
    ) -> Self {
        Self {
            id,
            source: GraphicSource::Image(path),
            texture: Some(texture),
            width,
            height,
            has_alpha,
            behavior,
        }
    }

    pub(crate) fn procedural(id: GraphicId, behavior: BehaviorKey) -> Self {
        Self {
            id,
            source: GraphicSource::Procedural,
            texture: None,
            width: 0,
            height: 0,
            has_alpha: false,
            behavior,
        }
    }

    pub fn id(&self) -> GraphicId {
        self.id
    }

    pub fn kind(&self) -> GraphicKind {
        match self.source {
            GraphicSource::Image(_) => GraphicKind::Image,
            GraphicSource::Procedural => GraphicKind::Procedural,
        }
    }

    pub fn source(&self) -> &GraphicSource {
        &self.source
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            GraphicSource::Image(path) => Some(path),
            GraphicSource::Procedural => None,
        }
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_alpha(&self) -> bool {
        self.has_alpha
    }

    pub fn behavior(&self) -> BehaviorKey {
        self.behavior
    }

    /// Begin/end hooks for this graphic.
    pub fn function(&self) -> &'static dyn GraphicFunction {
        self.behavior.function()
    }

    /// Tile layout of the atlas, if this graphic is an image at least one tile wide.
    pub fn atlas(&self, tile_size: u32) -> Option<AtlasLayout> {
        match self.kind() {
            GraphicKind::Image => AtlasLayout::new(self.width, tile_size),
            GraphicKind::Procedural => None,
        }
    }

    /// Human-readable name for logs and errors.
    pub fn name(&self) -> String {
        match &self.source {
            GraphicSource::Image(path) => path.display().to_string(),
            GraphicSource::Procedural => format!("<{}>", self.behavior.name()),
        }
    }
}
