//! Graphic functions: the begin/end hook pair run around each graphic's replay.

use serde::{Deserialize, Serialize};

use crate::backend::{BackendError, DrawState, RenderBackend};
use crate::graphic::Graphic;

/// Selects the behavior strategy of a graphic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKey {
    /// Opaque atlas texture.
    Texture,
    /// Atlas texture drawn without depth writes.
    Translucent,
    /// Solid, untextured geometry.
    Untextured,
    /// Untextured geometry drawn over the scene without depth writes.
    Overlay,
}

impl BehaviorKey {
    pub const ALL: [BehaviorKey; 4] = [
        BehaviorKey::Texture,
        BehaviorKey::Translucent,
        BehaviorKey::Untextured,
        BehaviorKey::Overlay,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BehaviorKey::Texture => "texture",
            BehaviorKey::Translucent => "translucent",
            BehaviorKey::Untextured => "untextured",
            BehaviorKey::Overlay => "overlay",
        }
    }

    pub fn function(self) -> &'static dyn GraphicFunction {
        match self {
            BehaviorKey::Texture => &TextureFunction,
            BehaviorKey::Translucent => &TranslucentFunction,
            BehaviorKey::Untextured => &UntexturedFunction,
            BehaviorKey::Overlay => &OverlayFunction,
        }
    }
}

/// Hook pair bracketing the replay of one graphic's batches.
pub trait GraphicFunction: Send + Sync {
    fn begin(&self, graphic: &Graphic, backend: &mut dyn RenderBackend)
    -> Result<(), BackendError>;

    fn end(&self, graphic: &Graphic, backend: &mut dyn RenderBackend) -> Result<(), BackendError>;
}

/// Restores the state every graphic function starts from.
fn restore_defaults(backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
    backend.bind_texture(None)?;
    backend.set_draw_state(DrawState::default());
    Ok(())
}

struct TextureFunction;

impl GraphicFunction for TextureFunction {
    fn begin(
        &self,
        graphic: &Graphic,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), BackendError> {
        backend.set_draw_state(DrawState {
            texturing: true,
            depth_write: true,
            blending: true,
        });
        backend.bind_texture(graphic.texture())
    }

    fn end(&self, _graphic: &Graphic, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        restore_defaults(backend)
    }
}

struct TranslucentFunction;

impl GraphicFunction for TranslucentFunction {
    fn begin(
        &self,
        graphic: &Graphic,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), BackendError> {
        backend.set_draw_state(DrawState {
            texturing: true,
            depth_write: false,
            blending: true,
        });
        backend.bind_texture(graphic.texture())
    }

    fn end(&self, _graphic: &Graphic, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        restore_defaults(backend)
    }
}

struct UntexturedFunction;

impl GraphicFunction for UntexturedFunction {
    fn begin(
        &self,
        _graphic: &Graphic,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), BackendError> {
        backend.bind_texture(None)?;
        backend.set_draw_state(DrawState {
            texturing: false,
            depth_write: true,
            blending: false,
        });
        Ok(())
    }

    fn end(&self, _graphic: &Graphic, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        restore_defaults(backend)
    }
}

struct OverlayFunction;

impl GraphicFunction for OverlayFunction {
    fn begin(
        &self,
        _graphic: &Graphic,
        backend: &mut dyn RenderBackend,
    ) -> Result<(), BackendError> {
        backend.bind_texture(None)?;
        backend.set_draw_state(DrawState {
            texturing: false,
            depth_write: false,
            blending: true,
        });
        Ok(())
    }

    fn end(&self, _graphic: &Graphic, backend: &mut dyn RenderBackend) -> Result<(), BackendError> {
        restore_defaults(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphic::GraphicId;
    use crate::recording::{BackendCall, RecordingBackend};

    #[test]
    fn names_are_unique() {
        let mut names: Vec<&str> = BehaviorKey::ALL.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), BehaviorKey::ALL.len());
    }

    #[test]
    fn overlay_disables_texturing_and_depth_writes() {
        let mut backend = RecordingBackend::new();
        let g = Graphic::procedural(GraphicId(0), BehaviorKey::Overlay);
        g.function().begin(&g, &mut backend).unwrap();
        assert_eq!(
            backend.calls(),
            &[
                BackendCall::BindTexture(None),
                BackendCall::SetDrawState(DrawState {
                    texturing: false,
                    depth_write: false,
                    blending: true,
                }),
            ]
        );
    }

    #[test]
    fn end_hook_restores_defaults() {
        let mut backend = RecordingBackend::new();
        let g = Graphic::procedural(GraphicId(0), BehaviorKey::Untextured);
        g.function().end(&g, &mut backend).unwrap();
        assert_eq!(
            backend.calls().last(),
            Some(&BackendCall::SetDrawState(DrawState::default()))
        );
    }

    #[test]
    fn texture_hook_fails_on_unknown_texture() {
        use crate::backend::TextureId;
        let mut backend = RecordingBackend::new();
        let g = Graphic::image(
            GraphicId(0),
            "x.png".into(),
            TextureId(99),
            32,
            32,
            false,
            BehaviorKey::Texture,
        );
        let err = g.function().begin(&g, &mut backend).unwrap_err();
        assert_eq!(err, BackendError::UnknownTexture(TextureId(99)));
    }

    #[test]
    fn behavior_key_serializes_snake_case() {
        let json = serde_json::to_string(&BehaviorKey::Translucent).unwrap();
        assert_eq!(json, "\"translucent\"");
    }
}
