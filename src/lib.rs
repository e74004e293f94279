//! Small software rasterizer: first person camera, clip-space culling and near-plane clipping,
//! edge function rasterization with perspective-correct interpolation, depth testing and
//! BRDF shading into an rgb8 frame buffer.

pub mod camera;
pub mod config;
pub mod error;
pub mod input;
pub mod math;
pub mod render;
pub mod scene;

pub use camera::{Camera, Handedness};
pub use config::RenderConfig;
pub use error::RenderError;
pub use render::{Capture, FrameBuffer, FrameStats, Present, RenderBackend, RenderMode, Renderer, SoftwareRasterizer};
