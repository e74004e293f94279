//! Software rendering pipeline: vertex transform, frustum culling and near clipping,
//! rasterization, shading and presentation of the finished frame.

mod buffer;
mod clip;
mod raster;
mod shader;
mod transform;

pub use buffer::{FrameBuffer, CLEARED_DEPTH};
pub use clip::{clip_near, is_inside_frustum, FrustumCulling};
pub use raster::{
    clip_to_raster, edge_weight, rasterize_triangle, signed_area, BoundingBox, Fragment, TriangleOutcome,
};
pub use shader::{blend, shade_fragment, ShadingContext};
pub use transform::{transform_vertices, TransformedVertex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::camera::{Camera, Handedness};
use crate::error::RenderError;
use crate::math::Mat4;
use crate::scene::{Primitive, Scene};

/// Which backend draws the frame. Each mode comes with its own depth sign convention for the
/// camera.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Software,
    Hardware,
}

impl RenderMode {
    pub fn handedness(self) -> Handedness {
        return match self {
            RenderMode::Software => Handedness::Right,
            RenderMode::Hardware => Handedness::Left,
        };
    }

    pub fn toggled(self) -> Self {
        return match self {
            RenderMode::Software => RenderMode::Hardware,
            RenderMode::Hardware => RenderMode::Software,
        };
    }
}

/// Counters collected while drawing one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub triangles: u64,       // Submitted, after topology assembly.
    pub invalid_indices: u64, // Referencing a vertex outside the vertex buffer.
    pub frustum_culled: u64,
    pub near_clipped: u64, // Cut or dropped by the near plane.
    pub degenerate: u64,
    pub face_culled: u64,
    pub rasterized: u64,
    pub fragments_tested: u64,
    pub fragments_written: u64,
}

impl FrameStats {
    pub fn record(&mut self, outcome: TriangleOutcome) {
        match outcome {
            TriangleOutcome::Degenerate => self.degenerate += 1,
            TriangleOutcome::Culled => self.face_culled += 1,
            TriangleOutcome::Rasterized { tested, written } => {
                self.rasterized += 1;
                self.fragments_tested += tested;
                self.fragments_written += written;
            }
        }
    }
}

/// Receives every finished frame, once per frame, before the depth buffer gets reset.
pub trait Present {
    fn present(&mut self, frame: &FrameBuffer) -> Result<(), RenderError>;
}

/// Presenter keeping a copy of the last presented frame, color and depth included.
#[derive(Debug, Default)]
pub struct Capture {
    last: Option<FrameBuffer>,
    frames: u64,
}

impl Capture {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn last_frame(&self) -> Option<&FrameBuffer> {
        return self.last.as_ref();
    }

    pub fn frames(&self) -> u64 {
        return self.frames;
    }
}

impl Present for Capture {
    fn present(&mut self, frame: &FrameBuffer) -> Result<(), RenderError> {
        match &mut self.last {
            Some(last) => last.clone_from(frame),
            None => self.last = Some(frame.clone()),
        }
        self.frames += 1;
        return Ok(());
    }
}

/// Something that can draw a whole scene and hand the result to a presenter.
pub trait RenderBackend {
    fn name(&self) -> &str;

    fn render_frame(
        &mut self,
        camera: &Camera,
        scene: &Scene,
        presenter: &mut dyn Present,
    ) -> Result<FrameStats, RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterizerSettings {
    pub frustum_culling: FrustumCulling,
    pub near_clipping: bool,
    pub gamma: f32, // Output encoding of the frame buffer, 1 is linear.
}

impl Default for RasterizerSettings {
    fn default() -> Self {
        return Self {
            frustum_culling: FrustumCulling::AnyVertexInside,
            near_clipping: true,
            gamma: 1.0,
        };
    }
}

/// Per-frame scratch data, kept between frames only to reuse the allocations.
#[derive(Debug, Default)]
struct Scratch {
    transformed: Vec<TransformedVertex>,
    clipped: Vec<[TransformedVertex; 3]>,
}

/// Single-threaded rasterizer owning the frame buffer it draws into.
#[derive(Debug)]
pub struct SoftwareRasterizer {
    frame: FrameBuffer,
    settings: RasterizerSettings,
    scratch: Scratch,
}

impl SoftwareRasterizer {
    pub fn new(width: u32, height: u32, settings: RasterizerSettings) -> Result<Self, RenderError> {
        let mut frame = FrameBuffer::new(width, height)?;
        frame.set_gamma(settings.gamma)?;
        return Ok(Self {
            frame,
            settings,
            scratch: Scratch::default(),
        });
    }

    pub fn frame(&self) -> &FrameBuffer {
        return &self.frame;
    }

    pub fn settings(&self) -> &RasterizerSettings {
        return &self.settings;
    }

    /// Replaces the settings. An invalid gamma leaves the current settings in place.
    pub fn set_settings(&mut self, settings: RasterizerSettings) -> Result<(), RenderError> {
        self.frame.set_gamma(settings.gamma)?;
        self.settings = settings;
        return Ok(());
    }

    /// Clears the color buffer and draws every primitive of the scene in submission order.
    /// Depth is left as the primitives wrote it.
    pub fn draw_scene(&mut self, camera: &Camera, scene: &Scene) -> FrameStats {
        let mut stats = FrameStats::default();
        self.frame.clear_color(scene.clear_color);

        let view_projection = camera.view_projection();
        let context = ShadingContext {
            camera_position: camera.position(),
            lighting: &scene.lighting,
        };
        for primitive in &scene.primitives {
            draw_primitive(
                primitive,
                &view_projection,
                &context,
                &self.settings,
                &mut self.frame,
                &mut self.scratch,
                &mut stats,
            );
        }
        return stats;
    }
}

impl RenderBackend for SoftwareRasterizer {
    fn name(&self) -> &str {
        return "software";
    }

    fn render_frame(
        &mut self,
        camera: &Camera,
        scene: &Scene,
        presenter: &mut dyn Present,
    ) -> Result<FrameStats, RenderError> {
        let stats = self.draw_scene(camera, scene);
        let presented = presenter.present(&self.frame);
        // Next frame starts from a cleared depth buffer even if presentation failed.
        self.frame.reset_depth();
        presented?;

        debug!(
            triangles = stats.triangles,
            invalid_indices = stats.invalid_indices,
            frustum_culled = stats.frustum_culled,
            near_clipped = stats.near_clipped,
            degenerate = stats.degenerate,
            face_culled = stats.face_culled,
            rasterized = stats.rasterized,
            fragments_tested = stats.fragments_tested,
            fragments_written = stats.fragments_written,
            "frame rendered"
        );
        return Ok(stats);
    }
}

/// Pushes one primitive through the pipeline: transform, assemble, cull, clip, rasterize.
fn draw_primitive(
    primitive: &Primitive,
    view_projection: &Mat4,
    context: &ShadingContext,
    settings: &RasterizerSettings,
    frame: &mut FrameBuffer,
    scratch: &mut Scratch,
    stats: &mut FrameStats,
) {
    let Scratch { transformed, clipped } = scratch;
    let mesh = &primitive.mesh;
    transform_vertices(&mesh.vertices, &primitive.world, view_projection, transformed);

    for [i0, i1, i2] in mesh.triangles() {
        stats.triangles += 1;
        let (Some(v0), Some(v1), Some(v2)) = (transformed.get(i0), transformed.get(i1), transformed.get(i2)) else {
            debug!(i0, i1, i2, vertices = transformed.len(), "triangle references a missing vertex");
            stats.invalid_indices += 1;
            continue;
        };
        let triangle = [*v0, *v1, *v2];

        if !settings.frustum_culling.accepts(&triangle) {
            trace!(i0, i1, i2, "triangle outside of the frustum");
            stats.frustum_culled += 1;
            continue;
        }

        clipped.clear();
        if settings.near_clipping {
            if clip_near(&triangle, clipped) {
                stats.near_clipped += 1;
            }
        } else {
            clipped.push(triangle);
        }

        for piece in clipped.iter() {
            let shade = |fragment: &Fragment, existing| {
                let color = shade_fragment(fragment, &primitive.material, context);
                return blend(color, existing, primitive);
            };
            let outcome = rasterize_triangle(piece, primitive.cull_mode, primitive.write_depth, frame, shade);
            if outcome == TriangleOutcome::Degenerate {
                trace!(i0, i1, i2, "degenerate triangle skipped");
            }
            stats.record(outcome);
        }
    }
}

/// Front end choosing between the built-in software rasterizer and an optional externally
/// supplied hardware backend.
pub struct Renderer {
    mode: RenderMode,
    software: SoftwareRasterizer,
    hardware: Option<Box<dyn RenderBackend>>,
}

impl Renderer {
    pub fn new(software: SoftwareRasterizer) -> Self {
        return Self {
            mode: RenderMode::Software,
            software,
            hardware: None,
        };
    }

    pub fn with_hardware(mut self, backend: Box<dyn RenderBackend>) -> Self {
        self.hardware = Some(backend);
        return self;
    }

    pub fn mode(&self) -> RenderMode {
        return self.mode;
    }

    pub fn software(&self) -> &SoftwareRasterizer {
        return &self.software;
    }

    /// Flips the render mode and the camera depth convention together.
    ///
    /// Fails with `BackendUnavailable` if the target mode has no backend, in which case neither
    /// the renderer nor the camera is touched.
    pub fn switch_render_mode(&mut self, camera: &mut Camera) -> Result<RenderMode, RenderError> {
        let target = self.mode.toggled();
        if target == RenderMode::Hardware && self.hardware.is_none() {
            warn!(mode = ?target, "no backend registered, staying in {:?} mode", self.mode);
            return Err(RenderError::BackendUnavailable(target));
        }
        camera.switch_render_mode(target.handedness());
        self.mode = target;
        info!(mode = ?target, backend = self.backend_name(), "switched render mode");
        return Ok(target);
    }

    /// Switches only if `mode` differs from the current one.
    pub fn set_render_mode(&mut self, mode: RenderMode, camera: &mut Camera) -> Result<(), RenderError> {
        if mode != self.mode {
            self.switch_render_mode(camera)?;
        }
        return Ok(());
    }

    fn backend_name(&self) -> &str {
        return match (self.mode, &self.hardware) {
            (RenderMode::Hardware, Some(backend)) => backend.name(),
            _ => self.software.name(),
        };
    }

    pub fn render(
        &mut self,
        camera: &Camera,
        scene: &Scene,
        presenter: &mut dyn Present,
    ) -> Result<FrameStats, RenderError> {
        return match self.mode {
            RenderMode::Software => self.software.render_frame(camera, scene, presenter),
            RenderMode::Hardware => match &mut self.hardware {
                Some(backend) => backend.render_frame(camera, scene, presenter),
                None => Err(RenderError::BackendUnavailable(RenderMode::Hardware)),
            },
        };
    }
}
