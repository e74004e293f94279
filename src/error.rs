use thiserror::Error;

use crate::render::RenderMode;

/// Errors surfaced by the rendering core.
///
/// Per-triangle numerical problems (zero area, vertices behind the camera) are never reported
/// through this type, they are skipped and only show up in the frame statistics.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f32,
        reason: &'static str,
    },
    #[error("no backend registered for {0:?} render mode")]
    BackendUnavailable(RenderMode),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to load OBJ mesh: {0}")]
    ObjLoad(#[from] obj::ObjError),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("presentation failed: {0}")]
    Presentation(String),
}

impl RenderError {
    pub(crate) fn invalid(name: &'static str, value: f32, reason: &'static str) -> Self {
        return RenderError::InvalidParameter { name, value, reason };
    }
}
